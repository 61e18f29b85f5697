use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::{
  channel::ChannelRef, config::ResolverConfig, episode::Candidate,
  ytdlp::YtdlpRunner, Result,
};

use super::{
  watch_url,
  ytdlp::{parse_json_lines, AUDIO_FORMAT},
  Resolver, YtdlpFlat,
};

// list the channel cheaply, then ask yt-dlp about each video on its own.
// a video that fails to resolve keeps what the listing knew about it.
pub struct YtdlpProbe {
  flat: YtdlpFlat,
  runner: YtdlpRunner,
  concurrency: usize,
}

impl YtdlpProbe {
  pub fn new(config: &ResolverConfig) -> Self {
    let runner = YtdlpRunner::new(config);
    Self {
      flat: YtdlpFlat::with_runner(config, runner.clone()),
      runner,
      concurrency: config.concurrency.max(1),
    }
  }

  async fn lookup(&self, video_id: &str) -> Result<Option<Candidate>> {
    let url = watch_url(video_id);
    let output = self
      .runner
      .run(["--skip-download", "-f", AUDIO_FORMAT, "-j", url.as_str()])
      .await?;

    let info = parse_json_lines(&output.stdout).into_iter().next();
    if info.is_none() {
      debug!("no metadata for {video_id}: {}", output.stderr_tail(300));
    }
    Ok(info.map(Candidate::from))
  }

  async fn probe(&self, listed: Candidate) -> Candidate {
    let Some(video_id) = listed.id.clone() else {
      return listed;
    };

    match self.lookup(&video_id).await {
      Ok(Some(full)) => fill_missing(full, listed),
      Ok(None) => listed,
      Err(e) => {
        warn!("probing {video_id} failed, keeping listing entry: {e}");
        listed
      }
    }
  }
}

fn fill_missing(full: Candidate, listed: Candidate) -> Candidate {
  Candidate {
    id: full.id.or(listed.id),
    title: full.title.or(listed.title),
    description: full.description.or(listed.description),
    published_at: full.published_at.or(listed.published_at),
    duration_seconds: full.duration_seconds.or(listed.duration_seconds),
    play_url: full.play_url.or(listed.play_url),
    page_url: full.page_url.or(listed.page_url),
    channel_title: full.channel_title.or(listed.channel_title),
  }
}

#[async_trait]
impl Resolver for YtdlpProbe {
  fn name(&self) -> &'static str {
    "ytdlp-probe"
  }

  async fn resolve(&self, channel: &ChannelRef) -> Result<Vec<Candidate>> {
    let listed = self.flat.list(channel).await?;

    // buffered keeps the listing's newest-first order
    let candidates: Vec<Candidate> = futures::stream::iter(listed)
      .map(|candidate| self.probe(candidate))
      .buffered(self.concurrency)
      .collect()
      .await;

    Ok(candidates)
  }
}
