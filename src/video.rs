use std::sync::Arc;

use axum::{
  extract::{rejection::QueryRejection, Query, State},
  response::IntoResponse,
  Json,
};
use http_types::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{extractor::Extractor, Error, Result};

#[derive(Clone)]
pub struct AppState {
  pub extractor: Arc<dyn Extractor>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct VideoInfo {
  pub title: String,
  pub duration: String,
  pub resolutions: Vec<String>,
  pub video_url: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DownloadLink {
  pub message: String,
  pub file_url: String,
}

#[derive(Deserialize)]
pub struct InfoQuery {
  url: Option<String>,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
  url: Option<String>,
  resolution: Option<String>,
}

pub async fn get_video_info(
  State(state): State<AppState>,
  query: Result<Query<InfoQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
  let Query(query) = query.map_err(bad_query)?;
  let url = validate_url(query.url.as_deref())?;
  let extraction = state.extractor.extract(url).await?;

  let info = VideoInfo {
    title: extraction
      .title
      .clone()
      .unwrap_or_else(|| "Unknown Title".to_string()),
    duration: extraction.duration_secs(),
    resolutions: extraction.resolutions(),
    video_url: query.url.clone().unwrap_or_default(),
  };

  Ok(Json(info))
}

pub async fn download_video(
  State(state): State<AppState>,
  query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
  let Query(query) = query.map_err(bad_query)?;
  let url = validate_url(query.url.as_deref())?;
  let resolution = query
    .resolution
    .as_deref()
    .map(str::trim)
    .filter(|r| !r.is_empty());

  let extraction = state.extractor.extract(url).await?;
  let format = extraction.select_format(resolution).ok_or_else(|| {
    Error::NotFound("Video not found or resolution unavailable".to_string())
  })?;
  debug!("selected format {} for {}", format.format_id, url);

  // select_format only yields formats carrying a url
  let file_url = format.url.clone().unwrap_or_default();

  Ok(Json(DownloadLink {
    message: "Download started.".to_string(),
    file_url,
  }))
}

fn bad_query(rejection: QueryRejection) -> Error {
  Error::BadRequest(rejection.body_text())
}

fn validate_url(url: Option<&str>) -> Result<&str> {
  let url = url
    .map(str::trim)
    .filter(|u| !u.is_empty())
    .ok_or_else(|| Error::BadRequest("missing query parameter: url".into()))?;

  let parsed: Url = url
    .parse()
    .map_err(|e| Error::BadRequest(format!("invalid url {url:?}: {e}")))?;

  match parsed.scheme() {
    "http" | "https" if parsed.host_str().is_some() => Ok(url),
    _ => Err(Error::BadRequest(format!("unsupported url: {url}"))),
  }
}
