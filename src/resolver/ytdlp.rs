use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::{
  channel::ChannelRef,
  config::ResolverConfig,
  episode::{upload_date, Candidate},
  ytdlp::YtdlpRunner,
  Error, Result,
};

use super::{seconds, Resolver};

// prefer m4a/aac, most podcast players handle it
pub(super) const AUDIO_FORMAT: &str = "bestaudio[ext=m4a]/bestaudio/best";

// run yt-dlp on the channel listing and take full metadata, including the
// direct (signed, expiring) audio url, for the newest videos.
pub struct Ytdlp {
  runner: YtdlpRunner,
  playlist_end: usize,
}

impl Ytdlp {
  pub fn new(config: &ResolverConfig) -> Self {
    Self {
      runner: YtdlpRunner::new(config),
      playlist_end: config.playlist_end,
    }
  }
}

/// The parts of yt-dlp's `-j` output we care about.
#[derive(Debug, Deserialize)]
pub(super) struct VideoInfo {
  id: Option<String>,
  title: Option<String>,
  description: Option<String>,
  upload_date: Option<String>,
  duration: Option<f64>,
  url: Option<String>,
  webpage_url: Option<String>,
  channel: Option<String>,
  uploader: Option<String>,
}

impl From<VideoInfo> for Candidate {
  fn from(info: VideoInfo) -> Self {
    Candidate {
      id: info.id,
      title: info.title,
      description: info.description,
      published_at: info.upload_date.as_deref().and_then(upload_date::parse),
      duration_seconds: seconds(info.duration),
      play_url: info.url,
      page_url: info.webpage_url,
      channel_title: info.channel.or(info.uploader),
    }
  }
}

/// yt-dlp prints one json object per video, possibly mixed with noise.
/// Lines that are not a video with both an id and a url are skipped.
pub(super) fn parse_json_lines(stdout: &str) -> Vec<VideoInfo> {
  stdout
    .lines()
    .map(str::trim)
    .filter(|line| line.starts_with('{'))
    .filter_map(|line| serde_json::from_str::<VideoInfo>(line).ok())
    .filter(|info| info.id.is_some() && info.url.is_some())
    .collect()
}

#[async_trait]
impl Resolver for Ytdlp {
  fn name(&self) -> &'static str {
    "ytdlp"
  }

  async fn resolve(&self, channel: &ChannelRef) -> Result<Vec<Candidate>> {
    let playlist_end = self.playlist_end.to_string();
    let url = channel.listing_url();
    let output = self
      .runner
      .run([
        "--skip-download",
        "--playlist-end",
        playlist_end.as_str(),
        "-f",
        AUDIO_FORMAT,
        "-j",
        url.as_str(),
      ])
      .await?;

    let videos = parse_json_lines(&output.stdout);

    if !output.success() {
      warn!(
        "yt-dlp exited with {:?}: {}",
        output.status,
        output.stderr_tail(500)
      );
      if videos.is_empty() {
        return Err(Error::ResolverUnavailable(format!(
          "yt-dlp exited with {:?}",
          output.status
        )));
      }
    }

    Ok(videos.into_iter().map(Candidate::from).collect())
  }
}
