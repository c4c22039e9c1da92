use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockServerError {
    #[error("mock server answered {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
}

pub type MockServerResult<T> = Result<T, MockServerError>;
