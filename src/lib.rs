//! FOLIO application library.
//!
//! Wires the book and review modules into the kernel and exposes the
//! lifecycle entry points used by the `folio-app` and `folio` binaries.

pub mod modules;

use std::sync::Arc;

use anyhow::Context;
use folio_db::DocumentStore;
use folio_kernel::{settings::Settings, InitCtx, ModuleRegistry};

pub use modules::register_all;

/// Registry with every application module registered
pub fn registry() -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    register_all(&mut registry).context("failed to register modules")?;
    Ok(registry)
}

/// Run the full lifecycle: connect, init, sync indexes, start, serve until
/// Ctrl-C, then stop modules in reverse order.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let registry = registry()?;
    let store = settings.database.connect().await?;
    let ctx = InitCtx {
        settings: &settings,
        store: &store,
    };

    registry.init_all(&ctx).await?;
    let applied = registry.sync_indexes(&store).await?;
    tracing::info!(indexes = applied, "indexes in sync");
    registry.start_all(&ctx).await?;

    let served = folio_http::start_server(&registry, &settings, &store).await;

    registry.stop_all().await?;
    served
}

/// Apply every declared index to the configured store
pub async fn sync_indexes(settings: &Settings) -> anyhow::Result<usize> {
    let registry = registry()?;
    let store = settings.database.connect().await?;
    registry.sync_indexes(&store).await
}

/// Router over `store` with all modules mounted and their indexes applied.
/// Nothing is bound to a socket.
pub async fn app(settings: &Settings, store: Arc<dyn DocumentStore>) -> anyhow::Result<axum::Router> {
    let registry = registry()?;
    let ctx = InitCtx {
        settings,
        store: &store,
    };
    registry.init_all(&ctx).await?;
    registry.sync_indexes(&store).await?;
    Ok(folio_http::build_router(&registry, settings, &store))
}
