/// Errors returned by `framesql` plan construction and compilation.
///
/// Every variant except `Execution` is raised synchronously while building
/// or rewriting a plan, before any SQL is rendered. `Execution` belongs to
/// the caller's execution layer; the core only passes it through.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Mutually exclusive or unrecognized caller options, unknown column
    /// names, or values of an incompatible type.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A propagation fill was requested on a plan without an established,
    /// deterministic row order.
    #[error("{message}")]
    UnsortedPlan { message: String },

    /// No translation exists for the operation on the active dialect.
    #[error("operation not supported on {dialect}: {operation}")]
    Unsupported {
        dialect: &'static str,
        operation: String,
    },

    /// Error raised by the execution layer when running rendered SQL.
    /// The core never constructs, swallows, or reinterprets this.
    #[error(transparent)]
    Execution(Box<dyn std::error::Error + Send + Sync>),
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, FrameError>;

impl FrameError {
    /// Create a configuration error with a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsorted-plan error. The message always names the required
    /// remedy so callers know to sort before filling.
    pub fn unsorted_plan() -> Self {
        Self::UnsortedPlan {
            message: "dataframe must be sorted before a propagation fill; \
                      call sort_values or with_order first"
                .into(),
        }
    }

    /// Create an unsupported-operation error for the given dialect.
    pub fn unsupported(dialect: &'static str, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            dialect,
            operation: operation.into(),
        }
    }
}
