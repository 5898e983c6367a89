pub mod books;
pub mod reviews;

use folio_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry) -> anyhow::Result<()> {
    registry.register(books::create_module())?;
    registry.register(reviews::create_module())?;
    Ok(())
}
