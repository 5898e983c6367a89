use anyhow::Context;
use std::sync::Arc;

use folio_db::{DocumentStore, IndexSpec};

use crate::module::{InitCtx, Module};

/// Module registry for managing module lifecycle in registration order
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Register a module. Names must be unique.
    pub fn register(&mut self, module: Arc<dyn Module>) -> anyhow::Result<()> {
        if self.get_module(module.name()).is_some() {
            anyhow::bail!("module '{}' is already registered", module.name());
        }
        self.modules.push(module);
        Ok(())
    }

    /// Get all registered modules
    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    /// Get a module by name
    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.iter().find(|module| module.name() == name)
    }

    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!("initializing {} modules", self.modules.len());

        for module in &self.modules {
            tracing::info!(module = module.name(), "initializing module");

            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in &self.modules {
            tracing::info!(module = module.name(), "starting module");

            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop modules in reverse registration order
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        for module in self.modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping module");

            module
                .stop()
                .await
                .with_context(|| format!("failed to stop module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect index declarations from all modules, tagged with the owning module
    pub fn collect_indexes(&self) -> Vec<(String, IndexSpec)> {
        let mut indexes: Vec<(String, IndexSpec)> = self
            .modules
            .iter()
            .flat_map(|module| {
                module
                    .indexes()
                    .into_iter()
                    .map(move |index| (module.name().to_string(), index))
            })
            .collect();

        // Sort by module name then index name for deterministic ordering
        indexes.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.collection.cmp(&b.1.collection))
                .then_with(|| a.1.name().cmp(&b.1.name()))
        });

        indexes
    }

    /// Create every declared index on the store. Returns how many were applied.
    pub async fn sync_indexes(&self, store: &Arc<dyn DocumentStore>) -> anyhow::Result<usize> {
        let indexes = self.collect_indexes();

        for (module, index) in &indexes {
            tracing::info!(
                module = %module,
                collection = %index.collection,
                index = %index.name(),
                unique = index.unique,
                "ensuring index"
            );

            store.ensure_index(index).await.with_context(|| {
                format!(
                    "failed to create index '{}' on '{}' for module '{}'",
                    index.name(),
                    index.collection,
                    module
                )
            })?;
        }

        Ok(indexes.len())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use folio_db::{bson::doc, MemoryStore, StoreError};
    use std::sync::Mutex;

    struct TestModule {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
    }

    impl TestModule {
        fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                journal: Arc::clone(journal),
            })
        }

        fn record(&self, phase: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{phase}:{}", self.name));
        }
    }

    #[async_trait::async_trait]
    impl Module for TestModule {
        fn name(&self) -> &'static str {
            self.name
        }

        fn indexes(&self) -> Vec<IndexSpec> {
            vec![IndexSpec::unique(self.name, "name")]
        }

        async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.record("init");
            Ok(())
        }

        async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
            self.record("start");
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.record("stop");
            Ok(())
        }
    }

    #[test]
    fn test_module_registry_creation() {
        let registry = ModuleRegistry::new();
        assert!(registry.modules().is_empty());
        assert!(registry.collect_indexes().is_empty());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let journal = Arc::default();
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule::new("books", &journal)).unwrap();

        assert!(registry.register(TestModule::new("books", &journal)).is_err());
        assert!(registry.get_module("books").is_some());
        assert!(registry.get_module("authors").is_none());
    }

    #[test]
    fn test_index_collection_is_sorted() {
        let journal = Arc::default();
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule::new("reviews", &journal)).unwrap();
        registry.register(TestModule::new("books", &journal)).unwrap();

        let owners: Vec<String> = registry
            .collect_indexes()
            .into_iter()
            .map(|(module, _)| module)
            .collect();
        assert_eq!(owners, ["books", "reviews"]);
    }

    #[tokio::test]
    async fn test_module_lifecycle() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule::new("books", &journal)).unwrap();
        registry.register(TestModule::new("reviews", &journal)).unwrap();

        let settings = Settings::default();
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let ctx = InitCtx {
            settings: &settings,
            store: &store,
        };

        registry.init_all(&ctx).await.unwrap();
        registry.start_all(&ctx).await.unwrap();
        registry.stop_all().await.unwrap();

        assert_eq!(
            *journal.lock().unwrap(),
            [
                "init:books",
                "init:reviews",
                "start:books",
                "start:reviews",
                "stop:reviews",
                "stop:books",
            ]
        );
    }

    #[tokio::test]
    async fn test_sync_indexes_applies_unique_constraints() {
        let journal = Arc::default();
        let mut registry = ModuleRegistry::new();
        registry.register(TestModule::new("books", &journal)).unwrap();

        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        assert_eq!(registry.sync_indexes(&store).await.unwrap(), 1);

        store.insert_one("books", doc! { "name": "Dune" }).await.unwrap();
        let clash = store.insert_one("books", doc! { "name": "Dune" }).await;
        assert!(matches!(clash, Err(StoreError::DuplicateKey { .. })));
    }
}
