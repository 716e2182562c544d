use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnkimdError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("AnkiConnect action '{action}' failed: {message}")]
    Anki { action: String, message: String },

    #[error("Frontmatter is missing the 'deck' key")]
    MissingDeck,

    #[error("Malformed frontmatter: {0}")]
    BadFrontmatter(String),

    #[error("AnkimdError: {0}")]
    Custom(String),
}

impl From<std::io::Error> for AnkimdError {
    fn from(error: std::io::Error) -> Self {
        AnkimdError::Io(Box::new(error))
    }
}

impl From<reqwest::Error> for AnkimdError {
    fn from(error: reqwest::Error) -> Self {
        AnkimdError::Reqwest(Box::new(error))
    }
}
