use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Script failed to compile: {0}")]
    ScriptCompile(String),

    #[error("Script failed while running: {0}")]
    ScriptRuntime(String),

    #[error("Could not read attachment: {0}")]
    AttachmentRead(String),

    #[error("Audio output could not be initialized: {0}")]
    AudioInit(String),

    #[error("Gave up after {0} rounds of tool calls")]
    LoopLimitExceeded(usize),

    #[error("Backend did not answer within {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Short machine-readable name of the error kind, used in tool results
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::ToolNotFound(_) => "tool_not_found",
            AgentError::InvalidParameters(_) => "invalid_parameters",
            AgentError::ExecutionError(_) => "tool_execution_error",
            AgentError::Provider(_) => "provider_error",
            AgentError::ScriptCompile(_) => "script_compile_error",
            AgentError::ScriptRuntime(_) => "script_runtime_error",
            AgentError::AttachmentRead(_) => "attachment_read_error",
            AgentError::AudioInit(_) => "audio_init_error",
            AgentError::LoopLimitExceeded(_) => "loop_limit_exceeded",
            AgentError::Timeout(_) => "timeout",
            AgentError::Internal(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Provider(err.to_string())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
