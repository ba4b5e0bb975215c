pub mod audit;
pub mod principal;

use xunimpay_kernel::ModuleRegistry;

/// Register all bootstrap modules with the registry
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register_core(principal::create_module());
    registry.register_custom(audit::create_module());
}
