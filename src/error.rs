use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("{0}")]
  BadRequest(String),
  #[error("{0}")]
  NotFound(String),
  #[error("extraction failed: {0}")]
  Extraction(String),
  #[error("failed to run extractor: {0}")]
  Io(#[from] std::io::Error),
  #[error("failed to parse extractor output: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Extraction(_) | Error::Io(_) | Error::Json(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      warn!("request failed: {}", self);
    }

    (status, Json(json!({ "detail": self.to_string() }))).into_response()
  }
}
