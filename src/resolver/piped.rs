use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::{
  channel::ChannelRef, config::ResolverConfig, episode::Candidate,
  piped::PipedInstance, Error, Result,
};

use super::{seconds, watch_url, Resolver};

const USER_AGENT: &str = "Mozilla/5.0";

// relay lookup through a Piped instance. no yt-dlp needed.
pub struct Piped {
  piped: PipedInstance,
  client: reqwest::Client,
  resolve_streams: bool,
  playlist_end: usize,
  concurrency: usize,
  config: ResolverConfig,
}

impl Piped {
  pub fn new(config: &ResolverConfig) -> Self {
    Self {
      piped: PipedInstance::new(&config.piped_instance),
      client: reqwest::Client::new(),
      resolve_streams: config.resolve_streams,
      playlist_end: config.playlist_end,
      concurrency: config.concurrency.max(1),
      config: config.clone(),
    }
  }

  async fn get_channel(&self, channel: &str) -> Result<PipedChannel> {
    let url = self.piped.channel_url(channel);
    let channel = self
      .client
      .get(&url)
      .header("User-Agent", USER_AGENT)
      .send()
      .await?
      .error_for_status()?
      .json::<PipedChannel>()
      .await?;
    Ok(channel)
  }

  async fn stream_url(&self, video_id: &str) -> Result<String> {
    use serde_query::{DeserializeQuery, Query};

    #[derive(DeserializeQuery)]
    struct PipedStreamResp {
      #[query(".audioStreams.[0].url")]
      url: String,
    }

    let resp: PipedStreamResp = self
      .client
      .get(self.piped.stream_url(video_id))
      .header("User-Agent", USER_AGENT)
      .send()
      .await?
      .error_for_status()?
      .json::<Query<PipedStreamResp>>()
      .await?
      .into();

    Ok(resp.url)
  }

  async fn with_play_url(&self, mut candidate: Candidate) -> Candidate {
    let (Some(id), Some(page)) = (&candidate.id, &candidate.page_url) else {
      return candidate;
    };

    let fallback = self.config.fallback_play_url(id, page);
    let play_url = if self.resolve_streams {
      match self.stream_url(id).await {
        Ok(url) => url,
        Err(e) => {
          debug!("no piped stream for {id}, using {fallback}: {e}");
          fallback
        }
      }
    } else {
      fallback
    };

    candidate.play_url = Some(play_url);
    candidate
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedChannel {
  name: Option<String>,
  #[serde(default)]
  related_streams: Vec<PipedStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipedStream {
  url: String,
  title: Option<String>,
  short_description: Option<String>,
  // epoch millis, negative when not yet released
  uploaded: Option<i64>,
  duration: Option<f64>,
  uploader_name: Option<String>,
  #[serde(default)]
  is_short: bool,
}

impl PipedStream {
  fn video_id(&self) -> Option<&str> {
    self
      .url
      .strip_prefix("/watch?v=")
      .map(|id| id.split('&').next().unwrap_or(id))
      .filter(|id| !id.is_empty())
  }

  fn published_at(&self) -> Option<NaiveDate> {
    let millis = self.uploaded.filter(|ms| *ms > 0)?;
    Utc
      .timestamp_millis_opt(millis)
      .single()
      .map(|dt| dt.date_naive())
  }

  fn released(&self) -> bool {
    self.uploaded.map_or(true, |ms| ms >= 0)
  }
}

impl PipedChannel {
  fn into_candidates(self, limit: usize) -> Vec<Candidate> {
    let channel_title = self.name;

    self
      .related_streams
      .into_iter()
      .filter(|s| !s.is_short && s.released())
      .take(limit)
      .map(|s| {
        let id = s.video_id().map(str::to_string);
        Candidate {
          page_url: id.as_deref().map(watch_url),
          published_at: s.published_at(),
          duration_seconds: seconds(s.duration),
          title: s.title,
          description: s.short_description,
          channel_title: s.uploader_name.or_else(|| channel_title.clone()),
          play_url: None,
          id,
        }
      })
      .collect()
  }
}

#[async_trait]
impl Resolver for Piped {
  fn name(&self) -> &'static str {
    "piped"
  }

  async fn resolve(&self, channel: &ChannelRef) -> Result<Vec<Candidate>> {
    if channel.is_live_tab() {
      return Err(Error::ResolverUnavailable(
        "piped only lists regular uploads".into(),
      ));
    }

    let name = channel
      .channel_name()
      .ok_or_else(|| Error::InvalidChannelReference(channel.to_string()))?;
    let listed = self
      .get_channel(&name)
      .await?
      .into_candidates(self.playlist_end);

    let candidates: Vec<Candidate> = futures::stream::iter(listed)
      .map(|candidate| self.with_play_url(candidate))
      .buffered(self.concurrency)
      .collect()
      .await;

    Ok(candidates)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const CHANNEL: &str = r#"{
    "id": "UC1yNl2E66ZzKApQdRuTQ4tw",
    "name": "Sabine Hossenfelder",
    "description": "science",
    "relatedStreams": [
      {"url": "/watch?v=up", "title": "Premiere", "uploaded": -1, "duration": -1, "isShort": false},
      {"url": "/watch?v=v2", "title": "New", "shortDescription": "two", "uploaded": 1709337600000, "duration": 600, "uploaderName": "Sabine", "isShort": false},
      {"url": "/watch?v=s1", "title": "Short", "uploaded": 1709251200000, "duration": 30, "isShort": true},
      {"url": "/watch?v=v1", "title": "Old", "uploaded": 1709164800000, "duration": 1200, "isShort": false}
    ]
  }"#;

  #[test]
  fn test_channel_to_candidates() {
    let channel: PipedChannel = serde_json::from_str(CHANNEL).unwrap();
    let candidates = channel.into_candidates(10);

    let ids: Vec<_> = candidates.iter().map(|c| c.id.as_deref()).collect();
    assert_eq!(ids, [Some("v2"), Some("v1")]);

    let new = &candidates[0];
    assert_eq!(new.published_at, NaiveDate::from_ymd_opt(2024, 3, 2));
    assert_eq!(new.duration_seconds, Some(600));
    assert_eq!(new.channel_title.as_deref(), Some("Sabine"));
    assert_eq!(new.description.as_deref(), Some("two"));
    assert_eq!(
      new.page_url.as_deref(),
      Some("https://www.youtube.com/watch?v=v2")
    );
    assert_eq!(
      candidates[1].channel_title.as_deref(),
      Some("Sabine Hossenfelder")
    );
  }

  #[test]
  fn test_limit() {
    let channel: PipedChannel = serde_json::from_str(CHANNEL).unwrap();
    assert_eq!(channel.into_candidates(1).len(), 1);
  }

  #[tokio::test]
  async fn test_live_tab_is_unsupported() {
    let piped = Piped::new(&ResolverConfig::default());
    let channel = ChannelRef::new("https://www.youtube.com/@chan/streams");
    assert!(matches!(
      piped.resolve(&channel).await,
      Err(Error::ResolverUnavailable(_))
    ));
  }
}
