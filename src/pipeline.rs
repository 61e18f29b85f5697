use std::{fs, path::Path};

use tracing::{error, info, info_span, warn, Instrument};

use crate::{
  channel::{ChannelKey, ChannelRef},
  config::Config,
  feed::{artifact_path, write_artifact, ChannelFeed, FeedEmitter},
  history::{HistoryFile, HistoryStore},
  reconcile::reconcile,
  resolver::{self, resolve_with_timeout, Resolution, Resolver},
  Error, Result,
};

/// One batch run over every configured channel.
pub struct Pipeline {
  config: Config,
  resolver: Box<dyn Resolver>,
  emitter: Box<dyn FeedEmitter>,
  history: HistoryFile,
}

#[derive(Debug, Default)]
pub struct RunReport {
  pub channels: usize,
  pub updated: Vec<ChannelKey>,
  pub unchanged: usize,
  pub unresolved: usize,
  pub skipped: usize,
  pub history_saved: bool,
  pub failures: Vec<Error>,
}

impl RunReport {
  /// Whether everything that had to be written was written.
  pub fn success(&self) -> bool {
    self.failures.is_empty()
  }
}

impl Pipeline {
  pub fn new(config: Config) -> Self {
    let resolver = resolver::from_config(&config.resolver);
    Self::with_resolver(config, resolver)
  }

  pub fn with_resolver(config: Config, resolver: Box<dyn Resolver>) -> Self {
    let emitter = config.format.emitter(&config.feed.language);
    let history = HistoryFile::new(&config.history_file);
    Self {
      config,
      resolver,
      emitter,
      history,
    }
  }

  pub async fn run(&self) -> Result<RunReport> {
    let channels = read_channel_list(&self.config.channels_file)?;
    fs::create_dir_all(&self.config.output_dir).map_err(|e| {
      Error::Config(format!(
        "cannot create output directory {}: {e}",
        self.config.output_dir.display()
      ))
    })?;

    let mut store = self.history.load();
    if store.is_empty() {
      info!("starting with an empty history");
    } else {
      info!("history has {} channels", store.len());
    }
    let mut report = RunReport {
      channels: channels.len(),
      ..Default::default()
    };

    info!(
      "processing {} channels with the {} resolver",
      channels.len(),
      self.resolver.name()
    );

    for channel in &channels {
      let key = match channel.key() {
        Ok(key) => key,
        Err(e) => {
          warn!("skipping channel entry: {e}");
          report.skipped += 1;
          continue;
        }
      };

      let span = info_span!("channel", %key);
      self
        .process(&mut store, channel, &key, &mut report)
        .instrument(span)
        .await;
    }

    if report.updated.is_empty() {
      info!("no changes, history left as is");
      return Ok(report);
    }

    match self.history.save(&store) {
      Ok(()) => {
        info!("history saved to {}", self.history.path().display());
        report.history_saved = true;
      }
      Err(e) => {
        error!("failed to save history: {e}");
        report.failures.push(e);
      }
    }

    Ok(report)
  }

  async fn process(
    &self,
    store: &mut HistoryStore,
    channel: &ChannelRef,
    key: &ChannelKey,
    report: &mut RunReport,
  ) {
    info!("resolving {channel}");
    let timeout = self.config.resolver.timeout();

    let candidates =
      match resolve_with_timeout(self.resolver.as_ref(), channel, timeout).await {
        Resolution::Success(candidates) => candidates,
        Resolution::Empty => {
          info!("nothing discoverable right now");
          report.unresolved += 1;
          return;
        }
        Resolution::Failed(e) => {
          warn!("resolver {} failed: {e}", self.resolver.name());
          report.unresolved += 1;
          return;
        }
      };

    let existing = store.get(key).cloned().unwrap_or_default();
    let previous_top = existing.latest().map(|e| e.id.clone());
    let (updated, changed) = reconcile(
      existing,
      candidates,
      self.config.max_episodes,
      self.config.merge_policy,
    );

    let Some(latest) = updated.latest() else {
      warn!("no usable candidates");
      report.unresolved += 1;
      return;
    };

    if previous_top.as_deref() != Some(latest.id.as_str()) {
      info!("new episode: {}", latest.title);
    } else if changed {
      info!("known episode, refreshed: {}", latest.title);
    } else {
      info!("unchanged");
    }

    let artifact = artifact_path(&self.config.output_dir, self.emitter.as_ref(), key);
    let emit = changed || !artifact.exists();

    if changed {
      *store.get_or_create(key) = updated;
      report.updated.push(key.clone());
    } else {
      report.unchanged += 1;
    }

    if emit {
      self.emit(store, key, report);
    }
  }

  fn emit(&self, store: &HistoryStore, key: &ChannelKey, report: &mut RunReport) {
    let Some(record) = store.get(key) else {
      return;
    };

    let feed = ChannelFeed {
      key,
      title: record.channel_title().unwrap_or(key.as_str()),
      episodes: &record.episodes,
    };

    match write_artifact(&self.config.output_dir, self.emitter.as_ref(), &feed) {
      Ok(path) => info!("feed written to {}", path.display()),
      Err(e) => {
        error!("failed to write feed: {e}");
        report.failures.push(e);
      }
    }
  }
}

/// Channel references from a list file: one per line, blank lines and
/// `#` comments ignored.
pub fn parse_channel_list(content: &str) -> Vec<ChannelRef> {
  content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with('#'))
    .map(ChannelRef::new)
    .collect()
}

pub fn read_channel_list(path: &Path) -> Result<Vec<ChannelRef>> {
  let content = fs::read_to_string(path).map_err(|e| {
    Error::Config(format!("cannot read channel list {}: {e}", path.display()))
  })?;
  Ok(parse_channel_list(&content))
}
