use std::{error::Error, fmt::Display};

/// Why the dashboard could not run.
#[derive(Debug)]
pub enum GuiError {
    /// Drawing to or reading from the terminal failed.
    IOError(std::io::Error),
}

impl Display for GuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuiError::IOError(error) => write!(f, "terminal error: {}", error),
        }
    }
}

impl Error for GuiError {}

impl From<std::io::Error> for GuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}
