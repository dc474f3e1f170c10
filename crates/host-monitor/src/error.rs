use core::error::Error;

use derive_more::Display;
use error_stack::Report;

pub type AgentResult<T> = Result<T, Report<AgentError>>;

/// Errors raised while setting the agent up.
#[derive(Debug, Display)]
pub enum AgentError {
    #[display("Invalid configuration: {message}")]
    Config { message: String },
}

impl Error for AgentError {}
