use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnifeedError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AniList API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown AniList user: {0}")]
    UnknownIdentity(String),

    #[error("Destination not reachable: {0}")]
    BadDestination(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AnifeedError>;
