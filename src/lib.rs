pub mod config;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod outputs;
pub mod services;

// Re-export specific items if needed for convenient access
pub use error::{Error, Result};
pub use kernel::reactor::Reactor;
