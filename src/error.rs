use std::{path::PathBuf, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("invalid channel reference: {0:?}")]
  InvalidChannelReference(String),
  #[error("resolver unavailable: {0}")]
  ResolverUnavailable(String),
  #[error("resolver timed out after {0:?}")]
  ResolverTimeout(Duration),
  #[error("history corrupt: {0}")]
  HistoryCorrupt(String),
  #[error("failed to write {}: {source}", path.display())]
  Persistence {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("configuration error: {0}")]
  Config(String),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Toml(#[from] toml::de::Error),
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error(transparent)]
  Rss(#[from] rss::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Error::Persistence {
      path: path.into(),
      source,
    }
  }
}
