//! Parsing error types for ranking and topology pages

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParsingError {
    #[error("Required field '{field}' not found in HTML")]
    RequiredFieldMissing {
        field: String,
        context: Option<String>,
    },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid value for '{field}': {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("Unknown character class id {class_id}")]
    UnknownClass { class_id: i64 },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

impl ParsingError {
    pub fn required_field_missing(field: &str, context: Option<&str>) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: context.map(str::to_string),
        }
    }

    pub fn invalid_selector(selector: &str, reason: &str) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_value(field: &str, value: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Row-level errors drop the row; the rest mean the parser itself is broken.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self,
            Self::RequiredFieldMissing { .. } | Self::InvalidValue { .. } | Self::UnknownClass { .. }
        )
    }
}

impl From<regex::Error> for ParsingError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
