//! Speech improvement feedback from an OpenRouter-hosted chat model.

mod client;

pub use client::{FeedbackClient, FeedbackClientBuilder, DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("api key must not be empty")]
    MissingApiKey,
    #[error("feedback service returned {0}: {1}")]
    Api(u16, String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub type Result<T> = std::result::Result<T, FeedbackError>;
