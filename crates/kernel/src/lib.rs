pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, MigrationStep, Module};
pub use registry::{AppliedMigration, ModuleRegistry, StepOutcome};
