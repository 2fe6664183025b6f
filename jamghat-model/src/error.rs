use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug)]
pub enum ModelError {
    InvalidPartyCode(String),
    InvalidChatMessage(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidPartyCode(code) => {
                write!(f, "invalid party code: {code}")
            }
            ModelError::InvalidChatMessage(msg) => {
                write!(f, "invalid chat message: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
