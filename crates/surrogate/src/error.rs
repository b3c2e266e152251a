use thiserror::Error;

/// Errors reported by a [`Surrogate`](crate::Surrogate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurrogateError {
    /// The model could not be loaded or does not fit the configuration.
    #[error("load error: {0}")]
    Load(String),

    /// The runtime failed while evaluating the model.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// The configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid input: expected {expected} values, got {actual}")]
    InvalidInput { expected: usize, actual: usize },
}

impl SurrogateError {
    /// Whether the simulation using the surrogate can no longer continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SurrogateError::Runtime(_))
    }
}

pub type Result<T> = std::result::Result<T, SurrogateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_runtime_errors_are_fatal() {
        assert!(SurrogateError::Runtime("run failed".into()).is_fatal());
        assert!(!SurrogateError::Load("missing".into()).is_fatal());
        assert!(!SurrogateError::Config("bad json".into()).is_fatal());
        assert!(
            !SurrogateError::InvalidInput {
                expected: 3,
                actual: 2
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_display() {
        let err = SurrogateError::InvalidInput {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "invalid input: expected 3 values, got 2");
        assert_eq!(
            SurrogateError::Load("no such file".into()).to_string(),
            "load error: no such file"
        );
    }
}
