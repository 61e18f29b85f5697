use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod channel;
mod config;
mod episode;
mod error;
mod feed;
mod history;
mod pipeline;
mod piped;
mod podcast;
mod reconcile;
mod resolver;
mod ytdlp;

pub use error::{Error, Result};

use crate::{
  config::{Config, ResolverStrategy},
  feed::FeedFormat,
  pipeline::Pipeline,
  reconcile::MergePolicy,
};

pub const GENERATOR_STR: &str =
  concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Turn video channels into podcast feeds.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// TOML configuration file, built-in defaults when omitted
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Channel list, one URL or id per line
  #[arg(long)]
  channels: Option<PathBuf>,

  /// History file
  #[arg(long)]
  history: Option<PathBuf>,

  /// Directory feeds are written to
  #[arg(short, long)]
  output_dir: Option<PathBuf>,

  /// Episodes kept per channel
  #[arg(short = 'n', long)]
  max_episodes: Option<usize>,

  #[arg(long, value_enum)]
  resolver: Option<ResolverStrategy>,

  #[arg(long, value_enum)]
  merge_policy: Option<MergePolicy>,

  #[arg(long, value_enum)]
  format: Option<FeedFormat>,

  /// Proxy handed to yt-dlp
  #[arg(long, env = "YTDLP_PROXY")]
  proxy: Option<String>,

  /// Seconds before a channel's resolver call is abandoned
  #[arg(long)]
  timeout: Option<u64>,

  #[arg(long, default_value = "info")]
  log_level: String,
}

impl Args {
  fn into_config(self) -> Result<Config> {
    let mut config = match &self.config {
      Some(path) => Config::load(path)?,
      None => Config::default(),
    };

    if let Some(channels) = self.channels {
      config.channels_file = channels;
    }
    if let Some(history) = self.history {
      config.history_file = history;
    }
    if let Some(output_dir) = self.output_dir {
      config.output_dir = output_dir;
    }
    if let Some(max_episodes) = self.max_episodes {
      config.max_episodes = max_episodes;
    }
    if let Some(strategy) = self.resolver {
      config.resolver.strategy = strategy;
    }
    if let Some(policy) = self.merge_policy {
      config.merge_policy = policy;
    }
    if let Some(format) = self.format {
      config.format = format;
    }
    if self.proxy.is_some() {
      config.resolver.proxy = self.proxy;
    }
    if let Some(timeout) = self.timeout {
      config.resolver.timeout_secs = timeout;
    }

    config.validate()?;
    Ok(config)
  }
}

fn init_tracing(level: &str) {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("yt_podcast_feed={level}").into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
  let args = Args::parse();
  init_tracing(&args.log_level);

  let config = match args.into_config() {
    Ok(config) => config,
    Err(e) => {
      error!("{e}");
      return ExitCode::FAILURE;
    }
  };

  match Pipeline::new(config).run().await {
    Ok(report) => {
      info!(
        "done: {} channels, {} updated, {} unchanged, {} unresolved, {} skipped",
        report.channels,
        report.updated.len(),
        report.unchanged,
        report.unresolved,
        report.skipped
      );

      if report.success() {
        ExitCode::SUCCESS
      } else {
        error!("{} write failures", report.failures.len());
        ExitCode::FAILURE
      }
    }
    Err(e) => {
      error!("{e}");
      ExitCode::FAILURE
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_flags_override_defaults() {
    let args = Args::parse_from([
      "yt-podcast-feed",
      "--channels",
      "list.txt",
      "-n",
      "3",
      "--resolver",
      "ytdlp-flat",
      "--format",
      "m3u",
      "--merge-policy",
      "replace",
    ]);
    let config = args.into_config().unwrap();

    assert_eq!(config.channels_file, PathBuf::from("list.txt"));
    assert_eq!(config.max_episodes, 3);
    assert_eq!(config.resolver.strategy, ResolverStrategy::YtdlpFlat);
    assert_eq!(config.format, FeedFormat::M3u);
    assert_eq!(config.merge_policy, MergePolicy::Replace);
    assert_eq!(config.history_file, PathBuf::from("history.json"));
  }

  #[test]
  fn test_zero_episodes_is_rejected() {
    let args = Args::parse_from(["yt-podcast-feed", "-n", "0"]);
    assert!(matches!(args.into_config(), Err(Error::Config(_))));
  }
}
