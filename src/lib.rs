pub mod chain;
pub mod core;
pub mod factory;
pub mod signals;
pub mod treasury;
