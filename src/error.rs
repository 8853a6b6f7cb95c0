//! Error types for the agents crate

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, AgentsError>;

/// Main error type for agents, tools, handoffs and their collaborators
#[derive(Debug, Error)]
pub enum AgentsError {
    /// Error from the OpenAI API
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    /// A secret or connection string was not present in the environment
    #[error("Missing credential: {name} is not set")]
    MissingCredential { name: String },

    /// A collaborator (mail provider, database, MCP server) failed or answered non-2xx
    #[error("{service} failed: {message}")]
    ExternalService {
        service: String,
        message: String,
        status_code: Option<u16>,
    },

    /// A value did not conform to a declared structured schema
    #[error("Schema validation failed for {schema}: {message}")]
    SchemaValidation { schema: String, message: String },

    /// The model produced tool arguments the tool could not decode
    #[error("Malformed arguments for tool '{tool}': {message}")]
    MalformedToolArguments { tool: String, message: String },

    /// Two tools (or handoffs) on one agent share a name
    #[error("Agent '{agent}' declares '{tool}' more than once")]
    DuplicateTool { agent: String, tool: String },

    /// The agent declaration itself is unusable
    #[error("Invalid agent configuration: {message}")]
    InvalidAgent { message: String },

    /// Maximum turns exceeded
    #[error("Maximum turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },

    /// Tool execution error
    #[error("Tool execution error: {message}")]
    ToolExecutionError { message: String },

    /// Handoff error, including callback failures
    #[error("Handoff error: {message}")]
    HandoffError { message: String },

    /// Model behavior error
    #[error("Model behavior error: {message}")]
    ModelBehaviorError { message: String },

    /// MCP server lifecycle or protocol error
    #[error("MCP server '{server}': {message}")]
    Mcp { server: String, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl AgentsError {
    pub(crate) fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        AgentsError::ExternalService {
            service: service.into(),
            message: message.into(),
            status_code: None,
        }
    }

    pub(crate) fn schema(schema: impl Into<String>, message: impl Into<String>) -> Self {
        AgentsError::SchemaValidation {
            schema: schema.into(),
            message: message.into(),
        }
    }

    /// Provider status code carried by an external service failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AgentsError::ExternalService { status_code, .. } => *status_code,
            _ => None,
        }
    }
}
