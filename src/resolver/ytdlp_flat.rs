use async_trait::async_trait;
use tracing::warn;

use crate::{
  channel::ChannelRef,
  config::ResolverConfig,
  episode::{upload_date, Candidate},
  ytdlp::YtdlpRunner,
  Error, Result,
};

use super::{seconds, watch_url, Resolver};

// list the channel without fetching video pages. cheap, but there is no
// direct audio url and usually no upload date.
pub struct YtdlpFlat {
  runner: YtdlpRunner,
  playlist_end: usize,
  config: ResolverConfig,
}

impl YtdlpFlat {
  pub fn new(config: &ResolverConfig) -> Self {
    Self::with_runner(config, YtdlpRunner::new(config))
  }

  pub(super) fn with_runner(config: &ResolverConfig, runner: YtdlpRunner) -> Self {
    Self {
      runner,
      playlist_end: config.playlist_end,
      config: config.clone(),
    }
  }
}

#[derive(Debug, serde::Deserialize)]
struct Channel {
  channel: Option<String>,
  uploader: Option<String>,
  #[serde(default)]
  entries: Vec<Option<Entry>>,
}

#[derive(Debug, serde::Deserialize)]
struct Entry {
  id: Option<String>,
  title: Option<String>,
  url: Option<String>,
  description: Option<String>,
  duration: Option<f64>,
  upload_date: Option<String>,
  #[serde(rename = "_type")]
  kind: Option<String>,
}

impl Channel {
  fn into_candidates(self, config: &ResolverConfig) -> Vec<Candidate> {
    let channel_title = self.channel.or(self.uploader);

    self
      .entries
      .into_iter()
      .flatten()
      // nested playlists show up when pointed at a channel's home page
      .filter(|e| e.kind.as_deref() != Some("playlist"))
      .map(|e| {
        let page_url = e
          .id
          .as_deref()
          .map(watch_url)
          .or_else(|| e.url.clone());
        let play_url = match (&e.id, &page_url) {
          (Some(id), Some(page)) => Some(config.fallback_play_url(id, page)),
          _ => None,
        };

        Candidate {
          id: e.id,
          title: e.title,
          description: e.description,
          published_at: e.upload_date.as_deref().and_then(upload_date::parse),
          duration_seconds: seconds(e.duration),
          play_url,
          page_url,
          channel_title: channel_title.clone(),
        }
      })
      .collect()
  }
}

impl YtdlpFlat {
  pub(super) async fn list(&self, channel: &ChannelRef) -> Result<Vec<Candidate>> {
    let playlist_end = self.playlist_end.to_string();
    let url = channel.listing_url();
    let output = self
      .runner
      .run([
        // don't fetch video pages
        "--flat-playlist",
        // emit the output as a single json object instead of jsonl
        "--dump-single-json",
        "--playlist-end",
        playlist_end.as_str(),
        url.as_str(),
      ])
      .await?;

    if !output.success() {
      warn!(
        "yt-dlp exited with {:?}: {}",
        output.status,
        output.stderr_tail(500)
      );
    }

    if output.stdout.trim().is_empty() {
      return Err(Error::ResolverUnavailable(format!(
        "yt-dlp produced no listing for {channel}"
      )));
    }

    let listing: Channel = serde_json::from_str(output.stdout.trim())
      .map_err(|e| Error::ResolverUnavailable(format!("bad yt-dlp listing: {e}")))?;
    Ok(listing.into_candidates(&self.config))
  }
}

#[async_trait]
impl Resolver for YtdlpFlat {
  fn name(&self) -> &'static str {
    "ytdlp-flat"
  }

  async fn resolve(&self, channel: &ChannelRef) -> Result<Vec<Candidate>> {
    self.list(channel).await
  }
}
