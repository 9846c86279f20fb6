//! Error types for the logging pipeline

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// IO error raised by an appender or a configuration reader
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error raised by a configuration reader
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown severity name
    #[error("invalid level {0}")]
    InvalidLevel(String),

    /// Plugin name not present in the registry
    #[error("plugin {0} not found")]
    PluginNotFound(String),

    /// Appender reference that no configured appender satisfies
    #[error("appender {0} not found")]
    AppenderNotFound(String),

    /// Logger wrapper bound to a name no configured logger carries
    #[error("logger {0} not found")]
    LoggerNotFound(String),

    /// Second call into the one-shot refresh
    #[error("log refresh already done")]
    AlreadyRefreshed,

    /// Configuration or injection error
    #[error("{0}")]
    Config(String),

    /// Hierarchical error produced while unwinding refresh
    #[error("{msg} << {source}")]
    Wrapped {
        msg: String,
        #[source]
        source: Box<LogError>,
    },
}

impl LogError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        LogError::Config(msg.into())
    }

    /// Wrap this error with an outer message, keeping the chain readable
    /// as `"<outer> << <inner>"`.
    pub fn wrap(self, msg: impl Into<String>) -> Self {
        LogError::Wrapped {
            msg: msg.into(),
            source: Box::new(self),
        }
    }
}
