use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid endpoint url: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Error sending request: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-2xx status. `body` is the raw reply.
    #[error("Request was rejected with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Unable to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response is missing `{0}`")]
    MissingField(&'static str),

    #[error("No {0} configured")]
    MissingCredential(&'static str),

    #[error("Unable to read session config: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
