use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Invalid input for {field} ({value}): {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Spatial index has not been built yet")]
    EmptyIndex,

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MapError {
    pub fn invalid_input(field: &str, value: impl ToString, reason: &str) -> Self {
        MapError::InvalidInput {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            MapError::InvalidInput { .. } => ErrorCategory::Input,
            MapError::EmptyIndex | MapError::CsvError(_) | MapError::SerializationError(_) => {
                ErrorCategory::Data
            }
            MapError::ConfigValidationError { .. }
            | MapError::InvalidConfigValueError { .. }
            | MapError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MapError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 尚未建立索引是正常的暫態
            MapError::EmptyIndex => ErrorSeverity::Low,
            MapError::InvalidInput { .. } => ErrorSeverity::Medium,
            MapError::CsvError(_)
            | MapError::SerializationError(_)
            | MapError::ConfigValidationError { .. }
            | MapError::InvalidConfigValueError { .. }
            | MapError::MissingConfigError { .. } => ErrorSeverity::High,
            MapError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MapError::InvalidInput { .. } => {
                "Filter out records with non-finite or non-positive prices before evaluating them"
            }
            MapError::EmptyIndex => "Load a record set and build the index before querying",
            MapError::CsvError(_) => "Check that the CSV file has a header row and consistent columns",
            MapError::IoError(_) => "Check that the file exists and is readable",
            MapError::SerializationError(_) => "Check the output destination and try again",
            MapError::ConfigValidationError { .. }
            | MapError::InvalidConfigValueError { .. }
            | MapError::MissingConfigError { .. } => {
                "Fix the configuration file or command line arguments and retry"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MapError::InvalidInput { field, reason, .. } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
            MapError::EmptyIndex => "No transaction data is loaded yet".to_string(),
            MapError::CsvError(e) => format!("Could not read transaction data: {}", e),
            MapError::IoError(e) => format!("File access failed: {}", e),
            MapError::SerializationError(e) => format!("Could not write output: {}", e),
            MapError::ConfigValidationError { field, message } => {
                format!("Configuration problem in '{}': {}", field, message)
            }
            MapError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration value '{}' is invalid: {}", field, reason)
            }
            MapError::MissingConfigError { field } => {
                format!("Configuration value '{}' is required", field)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
