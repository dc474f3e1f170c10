//! Application module
//!
//! Wiring of the agent: building services from arguments, spawning the
//! long-running loops and waiting for them to finish.

pub mod builder;
pub mod core;
pub mod services;
pub mod tasks;

pub use builder::ApplicationBuilder;
pub use core::Application;
pub use services::ApplicationServices;
