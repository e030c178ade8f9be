//! Child agent creation pipeline and its collaborators.

pub mod factory;
pub mod registration;
pub mod templates;

pub use factory::{sequence_of, AgentFactory};
pub use registration::{Registrar, StubRegistrar};
pub use templates::{FsTemplateStore, InstanceHandle, TemplateHandle, TemplateStore};
