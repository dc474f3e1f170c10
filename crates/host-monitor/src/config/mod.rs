pub mod agent;
pub mod cli;

pub use agent::*;
pub use cli::*;
