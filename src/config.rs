use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{feed::FeedFormat, reconcile::MergePolicy, Error, Result};

pub const DEFAULT_PIPED_INSTANCE: &str = "pipedapi.kavin.rocks";

/// Everything a run needs to know, passed explicitly into the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub channels_file: PathBuf,
  pub history_file: PathBuf,
  pub output_dir: PathBuf,
  /// Episodes kept per channel.
  pub max_episodes: usize,
  pub merge_policy: MergePolicy,
  pub format: FeedFormat,
  pub resolver: ResolverConfig,
  pub feed: FeedConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      channels_file: PathBuf::from("channels.txt"),
      history_file: PathBuf::from("history.json"),
      output_dir: PathBuf::from("feeds"),
      max_episodes: 10,
      merge_policy: MergePolicy::default(),
      format: FeedFormat::default(),
      resolver: ResolverConfig::default(),
      feed: FeedConfig::default(),
    }
  }
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
  clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverStrategy {
  /// Full metadata straight from yt-dlp.
  #[default]
  Ytdlp,
  /// yt-dlp playlist index only, no stream urls.
  YtdlpFlat,
  /// Index listing, then one yt-dlp lookup per video.
  YtdlpProbe,
  /// Ask a Piped instance.
  Piped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
  pub strategy: ResolverStrategy,
  pub ytdlp_path: PathBuf,
  /// How many of the newest videos to ask for.
  pub playlist_end: usize,
  pub timeout_secs: u64,
  /// Concurrent yt-dlp processes.
  pub concurrency: usize,
  pub force_ipv4: bool,
  pub no_check_certificate: bool,
  pub proxy: Option<String>,
  /// Base url of an audio proxy serving `/audio/{id}`, used when a
  /// resolver has no direct stream url.
  pub audio_proxy_url: Option<String>,
  pub piped_instance: String,
  pub resolve_streams: bool,
}

impl Default for ResolverConfig {
  fn default() -> Self {
    Self {
      strategy: ResolverStrategy::default(),
      ytdlp_path: PathBuf::from("yt-dlp"),
      playlist_end: 10,
      timeout_secs: 300,
      concurrency: 1,
      force_ipv4: true,
      no_check_certificate: true,
      proxy: None,
      audio_proxy_url: None,
      piped_instance: DEFAULT_PIPED_INSTANCE.to_string(),
      resolve_streams: true,
    }
  }
}

impl ResolverConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }

  /// Where a player can fetch the audio of `video_id` when no direct
  /// stream url is known.
  pub fn fallback_play_url(&self, video_id: &str, page_url: &str) -> String {
    match &self.audio_proxy_url {
      Some(base) => format!("{}/audio/{video_id}", base.trim_end_matches('/')),
      None => page_url.to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
  pub language: String,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      language: String::from("en"),
    }
  }
}

impl Config {
  pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
      Error::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    Self::from_toml(&content)
  }

  pub fn from_toml(content: &str) -> Result<Self> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.max_episodes == 0 {
      return Err(Error::Config("max_episodes must be at least 1".into()));
    }
    if self.resolver.timeout_secs == 0 {
      return Err(Error::Config("resolver.timeout_secs must be at least 1".into()));
    }
    if self.resolver.concurrency == 0 {
      return Err(Error::Config("resolver.concurrency must be at least 1".into()));
    }
    if self.resolver.playlist_end == 0 {
      return Err(Error::Config("resolver.playlist_end must be at least 1".into()));
    }
    Ok(())
  }
}
