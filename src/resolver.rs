mod piped;
mod ytdlp;
mod ytdlp_flat;
mod ytdlp_probe;

use std::time::Duration;

use async_trait::async_trait;

pub use self::piped::Piped;
pub use self::ytdlp::Ytdlp;
pub use self::ytdlp_flat::YtdlpFlat;
pub use self::ytdlp_probe::YtdlpProbe;

use crate::{
  channel::ChannelRef,
  config::{ResolverConfig, ResolverStrategy},
  episode::Candidate,
  Error, Result,
};

/// Turns a channel reference into candidate episodes, newest first.
///
/// Returning no candidates is fine and means nothing is discoverable right
/// now. Partial results are fine too.
#[async_trait]
pub trait Resolver: Send + Sync {
  fn name(&self) -> &'static str;
  async fn resolve(&self, channel: &ChannelRef) -> Result<Vec<Candidate>>;
}

#[derive(Debug)]
pub enum Resolution {
  Success(Vec<Candidate>),
  Empty,
  Failed(Error),
}

pub async fn resolve_with_timeout(
  resolver: &dyn Resolver,
  channel: &ChannelRef,
  timeout: Duration,
) -> Resolution {
  match tokio::time::timeout(timeout, resolver.resolve(channel)).await {
    Err(_elapsed) => Resolution::Failed(Error::ResolverTimeout(timeout)),
    Ok(Err(e)) => Resolution::Failed(e),
    Ok(Ok(candidates)) if candidates.is_empty() => Resolution::Empty,
    Ok(Ok(candidates)) => Resolution::Success(candidates),
  }
}

pub fn from_config(config: &ResolverConfig) -> Box<dyn Resolver> {
  match config.strategy {
    ResolverStrategy::Ytdlp => Box::new(Ytdlp::new(config)),
    ResolverStrategy::YtdlpFlat => Box::new(YtdlpFlat::new(config)),
    ResolverStrategy::YtdlpProbe => Box::new(YtdlpProbe::new(config)),
    ResolverStrategy::Piped => Box::new(Piped::new(config)),
  }
}

// yt-dlp and piped report durations as floats, or negative for live
// streams
fn seconds(duration: Option<f64>) -> Option<u64> {
  duration
    .filter(|secs| *secs >= 0.0 && secs.is_finite())
    .map(|secs| secs.round() as u64)
}

fn watch_url(video_id: &str) -> String {
  format!("https://www.youtube.com/watch?v={video_id}")
}
