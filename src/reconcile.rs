use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  episode::{Candidate, Episode},
  history::ChannelRecord,
};

/// How a fresh batch with a new head episode is folded into history.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
  clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
  /// Put the whole batch on top, keep older history below it.
  #[default]
  Merge,
  /// Only prepend the newest candidate.
  HeadOnly,
  /// Trust the latest listing, history becomes the batch.
  Replace,
}

/// Merges freshly resolved candidates into a channel's history.
///
/// Returns the updated record and whether it differs from `existing`.
/// An empty batch (or one where no candidate has an id) never touches
/// history.
pub fn reconcile(
  existing: ChannelRecord,
  candidates: Vec<Candidate>,
  max_episodes: usize,
  policy: MergePolicy,
) -> (ChannelRecord, bool) {
  let mut batch = valid_episodes(candidates);
  if batch.is_empty() {
    return (existing, false);
  }

  let mut episodes = existing.episodes;
  let repeat = episodes.first().map(|top| &top.id) == Some(&batch[0].id);

  let changed = match policy {
    MergePolicy::Replace => replace(&mut episodes, batch, max_episodes),
    // same head as last time, only the mutable fields may have moved
    _ if repeat => episodes[0].refresh_from(&batch[0]),
    MergePolicy::Merge => {
      merge(&mut episodes, batch);
      true
    }
    MergePolicy::HeadOnly => {
      prepend(&mut episodes, batch.swap_remove(0));
      true
    }
  };

  let truncated = episodes.len() > max_episodes;
  episodes.truncate(max_episodes);

  (ChannelRecord { episodes }, changed || truncated)
}

fn valid_episodes(candidates: Vec<Candidate>) -> Vec<Episode> {
  candidates
    .into_iter()
    .filter_map(|candidate| {
      let title = candidate.title.clone();
      let episode = candidate.into_episode();
      if episode.is_none() {
        debug!(?title, "skipping candidate without id");
      }
      episode
    })
    .unique_by(|episode| episode.id.clone())
    .collect()
}

// takes the stored entry for `fresh.id` out of `stored`, refreshed, or
// `fresh` itself when there is none
fn take_refreshed(stored: &mut Vec<Episode>, fresh: Episode) -> Episode {
  match stored.iter().position(|e| e.id == fresh.id) {
    Some(i) => {
      let mut episode = stored.remove(i);
      episode.refresh_from(&fresh);
      episode
    }
    None => fresh,
  }
}

// known ids are refreshed where they sit, unknown ones go on top in batch
// order. a listing missing some known entries must not reorder history.
fn merge(episodes: &mut Vec<Episode>, batch: Vec<Episode>) {
  let mut unseen = Vec::new();
  for fresh in batch {
    match episodes.iter_mut().find(|e| e.id == fresh.id) {
      Some(stored) => {
        stored.refresh_from(&fresh);
      }
      None => unseen.push(fresh),
    }
  }
  unseen.append(episodes);
  *episodes = unseen;
}

fn prepend(episodes: &mut Vec<Episode>, head: Episode) {
  let episode = take_refreshed(episodes, head);
  episodes.insert(0, episode);
}

fn replace(
  episodes: &mut Vec<Episode>,
  batch: Vec<Episode>,
  max_episodes: usize,
) -> bool {
  let before = episodes.clone();
  let mut stored = std::mem::take(episodes);
  for fresh in batch.into_iter().take(max_episodes) {
    let episode = take_refreshed(&mut stored, fresh);
    episodes.push(episode);
  }
  *episodes != before
}
