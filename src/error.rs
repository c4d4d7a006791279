use std::io;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub type ServerResult<T> = std::result::Result<T, ServerError>;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Io(err) if err.kind() == io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            ServerError::Io(_) | ServerError::Multipart(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Plain-text response carrying the status' reason phrase, e.g. `"Conflict\n"`.
pub fn respond_with_status(status: StatusCode) -> Response {
    let text = status.canonical_reason().unwrap_or("Unknown");
    (status, format!("{}\n", text)).into_response()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("\t=> {}", self);
        } else {
            tracing::debug!("\t=> {}", self);
        }
        respond_with_status(status)
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(StatusCode),

    #[error("upload of {file} failed after {completed} file(s): {source}")]
    Upload {
        file: String,
        completed: usize,
        #[source]
        source: Box<ClientError>,
    },
}
