use std::fmt;

/// Semantic configuration errors found by [`crate::validate_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingRequiredField { field: String },
    InvalidValue { field: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredField { field } => {
                write!(f, "missing required field: {field}")
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{field}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
