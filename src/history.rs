use std::{
  collections::BTreeMap,
  fs,
  io::{ErrorKind, Write},
  path::{Path, PathBuf},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{channel::ChannelKey, episode::Episode, Error, Result};

/// The episodes tracked for one channel, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelRecord {
  pub episodes: Vec<Episode>,
}

impl ChannelRecord {
  pub fn latest(&self) -> Option<&Episode> {
    self.episodes.first()
  }

  pub fn channel_title(&self) -> Option<&str> {
    self
      .episodes
      .iter()
      .map(|e| e.channel_title.as_str())
      .find(|title| !title.is_empty())
  }

  // keeps the first (newest) entry per id, returns how many were dropped
  fn dedup(&mut self) -> usize {
    let before = self.episodes.len();
    let episodes = std::mem::take(&mut self.episodes);
    self.episodes = episodes
      .into_iter()
      .unique_by(|e| e.id.clone())
      .collect();
    before - self.episodes.len()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryStore {
  channels: BTreeMap<ChannelKey, ChannelRecord>,
}

impl HistoryStore {
  pub fn get(&self, key: &ChannelKey) -> Option<&ChannelRecord> {
    self.channels.get(key)
  }

  pub fn get_or_create(&mut self, key: &ChannelKey) -> &mut ChannelRecord {
    self.channels.entry(key.clone()).or_default()
  }

  pub fn len(&self) -> usize {
    self.channels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.channels.is_empty()
  }

  /// Parses a history document. Records that fail to parse are dropped
  /// individually so one bad entry does not cost the whole history.
  pub fn from_json(json: &str) -> Result<Self> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
      .map_err(|e| Error::HistoryCorrupt(e.to_string()))?;

    let mut channels = BTreeMap::new();
    for (key, value) in raw {
      match serde_json::from_value::<ChannelRecord>(value) {
        Ok(mut record) => {
          let dropped = record.dedup();
          if dropped > 0 {
            warn!("{key}: dropped {dropped} duplicate episodes");
          }
          channels.insert(ChannelKey::from(key.as_str()), record);
        }
        Err(e) => {
          let err = Error::HistoryCorrupt(format!("{key}: {e}"));
          warn!("dropping channel history: {err}");
        }
      }
    }

    Ok(Self { channels })
  }

  pub fn to_json(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }
}

/// Location of the persisted [`HistoryStore`].
#[derive(Debug, Clone)]
pub struct HistoryFile {
  path: PathBuf,
}

impl HistoryFile {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Reads the store from disk. A missing or unreadable file yields an
  /// empty store, losing history only means episodes get re-detected.
  pub fn load(&self) -> HistoryStore {
    let json = match fs::read_to_string(&self.path) {
      Ok(json) => json,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!("no history at {}, starting fresh", self.path.display());
        return HistoryStore::default();
      }
      Err(e) => {
        warn!("failed to read history {}: {e}", self.path.display());
        return HistoryStore::default();
      }
    };

    HistoryStore::from_json(&json).unwrap_or_else(|e| {
      warn!("ignoring history {}: {e}", self.path.display());
      HistoryStore::default()
    })
  }

  /// Writes the store next to the target first and renames it into place,
  /// a crash never leaves a half-written history behind.
  pub fn save(&self, store: &HistoryStore) -> Result<()> {
    let mut json = store.to_json()?;
    json.push('\n');
    write_atomic(&self.path, json.as_bytes())
  }
}

pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
  let persist_err = |e| Error::persistence(path, e);

  let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
  temp_name.push(".tmp");
  let temp_path = path.with_file_name(temp_name);

  let mut file = fs::File::create(&temp_path).map_err(persist_err)?;
  file
    .write_all(contents)
    .and_then(|_| file.sync_all())
    .map_err(persist_err)?;
  drop(file);

  fs::rename(&temp_path, path).map_err(|e| {
    fs::remove_file(&temp_path).ok();
    persist_err(e)
  })
}
