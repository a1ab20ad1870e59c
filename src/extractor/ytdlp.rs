use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{redact_proxy, ytdlp_proxy, YTDLP_MUTEX, YTDLP_PATH};
use crate::{Error, Result};

use super::{Extraction, Extractor};

// stderr fragments yt-dlp prints when the video itself can't be found
const NOT_FOUND_MARKERS: &[&str] = &[
  "Video unavailable",
  "Unsupported URL",
  "not available",
  "Private video",
  "does not exist",
  "HTTP Error 404",
];

// run yt-dlp command line to get video metadata and format urls.
// requires yt-dlp executable to be in PATH (or YTDLP_PATH).
pub struct Ytdlp {
  binary: String,
}

impl Ytdlp {
  pub fn new() -> Self {
    Self {
      binary: YTDLP_PATH.clone(),
    }
  }

  fn command(&self, url: &str, proxy: Option<&str>) -> Command {
    let mut cmd = Command::new(&self.binary);
    cmd
      // dump the info dict as json without downloading anything
      .arg("-j")
      .arg("--no-warnings")
      .arg("--no-playlist");

    if let Some(proxy) = proxy {
      debug!("using proxy: {}", redact_proxy(proxy));
      cmd.arg("--proxy").arg(proxy);
    }

    // `--` keeps urls starting with a dash from being read as options
    cmd.arg("--").arg(url);
    cmd.kill_on_drop(true);
    cmd
  }
}

#[async_trait]
impl Extractor for Ytdlp {
  async fn extract(&self, url: &str) -> Result<Extraction> {
    info!("extracting video info: {}", url);

    let guard = YTDLP_MUTEX
      .acquire()
      .await
      .map_err(|e| Error::Extraction(e.to_string()))?;
    let output = self.command(url, ytdlp_proxy()).output().await?;
    drop(guard);

    detect_error(&output.stderr)?;
    if !output.status.success() {
      warn!("yt-dlp exited with {} for {}", output.status, url);
      return Err(Error::Extraction(format!(
        "yt-dlp exited with {}",
        output.status
      )));
    }

    parse_output(&output.stdout)
  }
}

fn parse_output(stdout: &[u8]) -> Result<Extraction> {
  // with --no-playlist there is a single json object, but be lenient about
  // trailing lines
  let line = stdout
    .split(|b| *b == b'\n')
    .find(|line| !line.iter().all(u8::is_ascii_whitespace))
    .ok_or_else(|| Error::Extraction("yt-dlp produced no output".into()))?;

  Ok(serde_json::from_slice(line)?)
}

fn detect_error(stderr: &[u8]) -> Result<()> {
  let s = String::from_utf8_lossy(stderr);
  let Some(line) = s.lines().find(|line| line.contains("ERROR:")) else {
    return Ok(());
  };

  let message = line.trim().to_string();
  if NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
    Err(Error::NotFound(message))
  } else {
    Err(Error::Extraction(message))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE_OUTPUT: &str = r#"{
    "id": "dQw4w9WgXcQ",
    "title": "Rick Astley - Never Gonna Give You Up",
    "duration": 212,
    "formats": [
      {"format_id": "sb0", "format_note": "storyboard", "url": "https://i.ytimg.com/sb/0", "vcodec": "none", "acodec": "none"},
      {"format_id": "140", "format_note": "medium", "url": "https://rr1.googlevideo.com/140", "vcodec": "none", "acodec": "mp4a.40.2"},
      {"format_id": "18", "format_note": "360p", "url": "https://rr1.googlevideo.com/18", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2"},
      {"format_id": "137", "format_note": "1080p", "url": "https://rr1.googlevideo.com/137", "vcodec": "avc1.640028", "acodec": "none", "fps": 25}
    ],
    "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
  }"#;

  #[test]
  fn test_parse_output() {
    let output = format!("{}\n", SAMPLE_OUTPUT.replace('\n', ""));
    let extraction = parse_output(output.as_bytes()).unwrap();

    assert_eq!(
      extraction.title.as_deref(),
      Some("Rick Astley - Never Gonna Give You Up")
    );
    assert_eq!(extraction.duration_secs(), "212");
    assert_eq!(
      extraction.resolutions(),
      vec!["storyboard", "medium", "360p", "1080p"]
    );
    assert_eq!(
      extraction.select_format(None).unwrap().format_id,
      "18".to_string()
    );
  }

  #[test]
  fn test_parse_output_missing_fields() {
    let extraction = parse_output(br#"{"id": "abc"}"#).unwrap();
    assert!(extraction.title.is_none());
    assert!(extraction.formats.is_empty());
    assert_eq!(extraction.duration_secs(), "0");
  }

  #[test]
  fn test_parse_output_empty() {
    assert!(matches!(parse_output(b"\n\n"), Err(Error::Extraction(_))));
    assert!(matches!(parse_output(b"not json"), Err(Error::Json(_))));
  }

  #[test]
  fn test_detect_error() {
    assert!(detect_error(b"").is_ok());
    assert!(detect_error(b"WARNING: falling back to generic").is_ok());

    let err = detect_error(
      b"WARNING: foo\nERROR: [youtube] abc: Video unavailable\n",
    )
    .unwrap_err();
    assert!(
      matches!(err, Error::NotFound(ref m) if m == "ERROR: [youtube] abc: Video unavailable")
    );

    let err = detect_error(b"ERROR: Unsupported URL: https://x.test/")
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err =
      detect_error(b"ERROR: [youtube] abc: Sign in to confirm you're not a bot")
        .unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
  }

  fn args(cmd: &Command) -> Vec<String> {
    cmd
      .as_std()
      .get_args()
      .map(|a| a.to_string_lossy().into_owned())
      .collect()
  }

  #[test]
  fn test_command_line() {
    let ytdlp = Ytdlp {
      binary: "/opt/bin/yt-dlp".to_string(),
    };

    let cmd = ytdlp.command("-https://x.test/v", None);
    assert_eq!(cmd.as_std().get_program(), "/opt/bin/yt-dlp");
    assert_eq!(
      args(&cmd),
      ["-j", "--no-warnings", "--no-playlist", "--", "-https://x.test/v"]
    );

    let cmd = ytdlp.command(
      "https://x.test/v",
      Some("http://user:pw@proxy.local:3128"),
    );
    assert_eq!(
      args(&cmd),
      [
        "-j",
        "--no-warnings",
        "--no-playlist",
        "--proxy",
        "http://user:pw@proxy.local:3128",
        "--",
        "https://x.test/v",
      ]
    );
  }

  #[tokio::test]
  async fn test_missing_binary() {
    let ytdlp = Ytdlp {
      binary: "/nonexistent/yt-dlp-binary".to_string(),
    };
    let err = ytdlp.extract("https://example.com/v").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
  }
}
