mod ytdlp;

use async_trait::async_trait;
use serde::Deserialize;

use crate::Result;

pub use ytdlp::Ytdlp;

/// Video metadata as reported by the extraction tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Extraction {
  pub title: Option<String>,
  pub duration: Option<f64>,
  #[serde(default)]
  pub formats: Vec<Format>,
}

/// One downloadable rendition. yt-dlp lists these worst to best.
#[derive(Debug, Clone, Deserialize)]
pub struct Format {
  #[serde(default)]
  pub format_id: String,
  pub format_note: Option<String>,
  pub url: Option<String>,
  pub vcodec: Option<String>,
  pub acodec: Option<String>,
}

impl Format {
  fn has_video(&self) -> bool {
    self.vcodec.as_deref().is_some_and(|c| c != "none")
  }

  fn has_audio(&self) -> bool {
    self.acodec.as_deref().is_some_and(|c| c != "none")
  }
}

impl Extraction {
  /// Resolution labels in tool order, without blanks or repeats.
  pub fn resolutions(&self) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for note in self.formats.iter().filter_map(|f| f.format_note.as_deref()) {
      let note = note.trim();
      if !note.is_empty() && !labels.iter().any(|l| l == note) {
        labels.push(note.to_string());
      }
    }
    labels
  }

  pub fn duration_secs(&self) -> String {
    match self.duration {
      Some(d) if d.fract() == 0.0 => format!("{}", d as i64),
      Some(d) => d.to_string(),
      None => "0".to_string(),
    }
  }

  /// Picks the format to hand out as a download link.
  ///
  /// With a resolution label, the best format carrying that label wins.
  /// Without one, the best muxed (audio + video) format wins, falling back
  /// to the best format of any kind.
  pub fn select_format(&self, resolution: Option<&str>) -> Option<&Format> {
    let mut candidates = self.formats.iter().filter(|f| f.url.is_some());

    match resolution {
      Some(res) => candidates.rev().find(|f| {
        f.format_note
          .as_deref()
          .is_some_and(|note| note.trim().eq_ignore_ascii_case(res))
      }),
      None => self
        .formats
        .iter()
        .rev()
        .find(|f| f.url.is_some() && f.has_video() && f.has_audio())
        .or_else(|| candidates.next_back()),
    }
  }
}

#[async_trait]
pub trait Extractor: Send + Sync {
  async fn extract(&self, url: &str) -> Result<Extraction>;
}
