#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("OAuth2 {operation} failed (status {status:?}): {detail}")]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("API request failed with status {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
