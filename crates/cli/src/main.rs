use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_kernel::settings::Settings;

/// FOLIO book catalogue service
#[derive(Debug, Parser)]
#[command(name = "folio", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create every index declared by the registered modules
    SyncIndexes,
    /// Load configuration, print the resolved values, and exit
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load FOLIO settings")?;
    folio_telemetry::init(&settings.telemetry)?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => runtime.block_on(folio_app::serve(settings)),
        Command::SyncIndexes => {
            let applied = runtime.block_on(folio_app::sync_indexes(&settings))?;
            tracing::info!(indexes = applied, "index sync complete");
            println!("{applied} indexes in sync");
            Ok(())
        }
        Command::CheckConfig => {
            let registry = folio_app::registry()?;
            let modules: Vec<&str> = registry.modules().iter().map(|m| m.name()).collect();
            let summary = serde_json::json!({
                "environment": format!("{:?}", settings.environment).to_lowercase(),
                "server": {
                    "host": settings.server.host,
                    "port": settings.server.port,
                    "request_timeout_ms": settings.server.request_timeout_ms,
                },
                "database": {
                    "backend": format!("{:?}", settings.database.backend).to_lowercase(),
                    "name": settings.database.name,
                },
                "modules": modules,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}
