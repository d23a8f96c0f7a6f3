use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("resource has no ID")]
    MissingId,

    #[error("invalid value for \"{attribute}\": {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    #[error("unknown lifecycle status: {0}")]
    UnknownStatus(String),

    #[error("invalid import ID \"{id}\": expected format \"{expected}\"")]
    ImportFormat { id: String, expected: String },
}

impl CoreError {
    pub fn invalid(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttribute {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }
}
