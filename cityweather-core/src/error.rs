use thiserror::Error;

/// Message shown to the user for every failed lookup, whatever the cause.
pub const LOOKUP_FAILED_MESSAGE: &str =
    "Sorry, we couldn't find weather data for that city. Please try again.";

/// Failure of a single weather lookup.
///
/// The variants keep the underlying cause for logging; the UI only ever shows
/// [`LookupError::user_message`].
#[derive(Debug, Error)]
pub enum LookupError {
    /// The upstream answered, but with a non-success status code.
    #[error("upstream reported status {code}: {message}")]
    Upstream { code: String, message: String },

    #[error("request to weather service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse weather response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Payload parsed but lacks a field the display needs.
    #[error("weather response is missing {0}")]
    Incomplete(&'static str),
}

impl LookupError {
    pub fn user_message(&self) -> &'static str {
        LOOKUP_FAILED_MESSAGE
    }
}

/// Errors from the durable key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}
