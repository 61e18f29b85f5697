use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// appended to the key of a channel's live/streams tab so it is tracked
// separately from the regular uploads
pub const LIVE_SUFFIX: &str = "_Live";

const LIVE_SEGMENTS: &[&str] = &["streams", "live"];
const UPLOADS_SEGMENTS: &[&str] = &["videos"];
const OTHER_TABS: &[&str] = &["shorts", "featured", "playlists"];
const DECORATIONS: &[&str] = &["channel_", "user_"];
const PLAYLIST_SEGMENT: &str = "playlist";

static UNSAFE_CHARS: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// Filesystem-safe, stable identifier of a channel feed.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelKey(String);

impl ChannelKey {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ChannelKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ChannelKey {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

/// A channel entry as written in the channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
  raw: String,
}

impl ChannelRef {
  pub fn new(raw: impl Into<String>) -> Self {
    Self {
      raw: raw.into().trim().to_string(),
    }
  }

  pub fn key(&self) -> Result<ChannelKey> {
    normalize(&self.raw)
  }

  /// The reference as something yt-dlp or a browser can open.
  pub fn url(&self) -> String {
    let raw = self.raw.trim_end_matches('/');
    if raw.contains("://") {
      return raw.to_string();
    }

    if raw.starts_with('@') {
      format!("https://www.youtube.com/{raw}")
    } else if is_channel_id(raw) {
      format!("https://www.youtube.com/channel/{raw}")
    } else {
      raw.to_string()
    }
  }

  /// Like [`ChannelRef::url`], but a bare YouTube channel page is pointed
  /// at its uploads tab so listings contain videos rather than tabs.
  pub fn listing_url(&self) -> String {
    let url = self.url();
    let Ok(parsed) = Url::parse(&url) else {
      return url;
    };

    let youtube = parsed
      .host_str()
      .is_some_and(|host| host == "youtube.com" || host.ends_with(".youtube.com"));
    let last = parsed
      .path_segments()
      .and_then(|mut segments| segments.next_back().map(str::to_string))
      .unwrap_or_default();
    let is_tab = [LIVE_SEGMENTS, UPLOADS_SEGMENTS, OTHER_TABS]
      .iter()
      .any(|tabs| tabs.contains(&last.as_str()));

    if youtube && !last.is_empty() && !is_tab && parsed.query().is_none() {
      format!("{url}/videos")
    } else {
      url
    }
  }

  pub fn is_live_tab(&self) -> bool {
    path_segments(&self.raw)
      .ok()
      .and_then(|segments| strip_tab(&segments).map(|(_, live)| live))
      .unwrap_or(false)
  }

  /// The bare channel identifier: a `UC...` id, a handle, or a name.
  /// Playlists have none.
  pub fn channel_name(&self) -> Option<String> {
    if playlist_id(&self.raw).is_some() {
      return None;
    }
    let segments = path_segments(&self.raw).ok()?;
    let (base, _) = strip_tab(&segments)?;
    Some(base.to_string())
  }
}

impl fmt::Display for ChannelRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

pub fn is_channel_id(s: &str) -> bool {
  s.len() == 24 && s.starts_with("UC")
}

/// Derives the [`ChannelKey`] for a channel URL or bare identifier.
///
/// `https://host/@chan`, `https://host/@chan/videos` and
/// `https://host/@chan/videos/` all map to `chan`, while
/// `https://host/@chan/streams` maps to `chan_Live`.
///
/// Playlist urls are keyed by their `list=` id. The shorts, featured and
/// playlists tabs are rejected since they carry no uploads of their own.
pub fn normalize(reference: &str) -> Result<ChannelKey> {
  let invalid = || Error::InvalidChannelReference(reference.to_string());

  if let Some(list) = playlist_id(reference) {
    return safe_key(&list).map(ChannelKey).ok_or_else(invalid);
  }

  let segments = path_segments(reference)?;
  let (base, live) = strip_tab(&segments).ok_or_else(invalid)?;
  if base == PLAYLIST_SEGMENT {
    return Err(invalid());
  }

  let mut base = base.trim_start_matches('@').to_string();
  for decoration in DECORATIONS {
    base = base.replace(decoration, "");
  }
  let base = safe_key(&base).ok_or_else(invalid)?;

  let key = if live {
    format!("{base}{LIVE_SUFFIX}")
  } else {
    base
  };

  Ok(ChannelKey(key))
}

fn safe_key(s: &str) -> Option<String> {
  let key = UNSAFE_CHARS.replace_all(s, "_");
  (!key.trim_matches('_').is_empty()).then(|| key.into_owned())
}

fn playlist_id(reference: &str) -> Option<String> {
  let url = Url::parse(reference.trim()).ok()?;
  url
    .query_pairs()
    .find(|(name, _)| name == "list")
    .map(|(_, id)| id.into_owned())
    .filter(|id| !id.is_empty())
}

fn path_segments(reference: &str) -> Result<Vec<String>> {
  let reference = reference.trim();
  let invalid = || Error::InvalidChannelReference(reference.to_string());

  let path = if reference.contains("://") {
    let url = Url::parse(reference).map_err(|_| invalid())?;
    url.path().to_string()
  } else {
    reference.to_string()
  };

  Ok(
    path
      .split('/')
      .filter(|seg| !seg.is_empty())
      .map(str::to_string)
      .collect(),
  )
}

// drops a trailing tab segment (videos, streams, ...) and returns the base
// segment and whether it was the live tab
fn strip_tab(segments: &[String]) -> Option<(&str, bool)> {
  let (last, rest) = segments.split_last()?;

  if LIVE_SEGMENTS.contains(&last.as_str()) {
    rest.last().map(|base| (base.as_str(), true))
  } else if UPLOADS_SEGMENTS.contains(&last.as_str()) {
    rest.last().map(|base| (base.as_str(), false))
  } else if OTHER_TABS.contains(&last.as_str()) {
    None
  } else {
    Some((last.as_str(), false))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(s: &str) -> String {
    normalize(s).unwrap().to_string()
  }

  #[test]
  fn test_equivalent_urls_share_a_key() {
    assert_eq!(key("https://host/@chan/videos"), "chan");
    assert_eq!(key("https://host/@chan/videos/"), "chan");
    assert_eq!(key("https://host/@chan"), "chan");
    assert_eq!(key("https://host/@chan/"), "chan");
    assert_eq!(key("  @chan  "), "chan");
  }

  #[test]
  fn test_live_tab_gets_its_own_key() {
    assert_eq!(key("https://host/@chan/streams"), "chan_Live");
    assert_eq!(key("https://host/@chan/streams/"), "chan_Live");
    assert_eq!(key("https://www.youtube.com/@chan/live"), "chan_Live");
    assert_ne!(key("https://host/@chan/streams"), key("https://host/@chan"));
  }

  #[test]
  fn test_channel_id_urls() {
    assert_eq!(
      key("https://www.youtube.com/channel/UC1yNl2E66ZzKApQdRuTQ4tw/videos"),
      "UC1yNl2E66ZzKApQdRuTQ4tw"
    );
    assert_eq!(key("UC1yNl2E66ZzKApQdRuTQ4tw"), "UC1yNl2E66ZzKApQdRuTQ4tw");
    assert_eq!(key("https://host/c/user_someone?foo=bar"), "someone");
  }

  #[test]
  fn test_unsafe_characters_are_replaced() {
    assert_eq!(key("my chan"), "my_chan");
    assert_eq!(key("https://host/@a:b"), "a_b");
  }

  #[test]
  fn test_playlists_are_keyed_by_list_id() {
    assert_eq!(key("https://www.youtube.com/playlist?list=PL1"), "PL1");
    assert_ne!(
      key("https://www.youtube.com/playlist?list=PL1"),
      key("https://www.youtube.com/playlist?list=PL2")
    );
    assert_eq!(
      ChannelRef::new("https://www.youtube.com/playlist?list=PL1").channel_name(),
      None
    );
  }

  #[test]
  fn test_malformed_references_are_rejected() {
    for bad in [
      "",
      "   ",
      "https://host",
      "https://host/",
      "/",
      "@",
      "videos",
      "https://www.youtube.com/playlist",
      "https://www.youtube.com/@x/shorts",
      "https://www.youtube.com/@y/featured",
      "@x/playlists",
    ] {
      assert!(
        matches!(normalize(bad), Err(Error::InvalidChannelReference(_))),
        "{bad:?} should be rejected"
      );
    }
  }

  #[test]
  fn test_channel_ref_url() {
    assert_eq!(
      ChannelRef::new("@chan").url(),
      "https://www.youtube.com/@chan"
    );
    assert_eq!(
      ChannelRef::new("UC1yNl2E66ZzKApQdRuTQ4tw").url(),
      "https://www.youtube.com/channel/UC1yNl2E66ZzKApQdRuTQ4tw"
    );
    assert_eq!(
      ChannelRef::new("https://www.youtube.com/@chan/streams/").url(),
      "https://www.youtube.com/@chan/streams"
    );
  }

  #[test]
  fn test_listing_url() {
    assert_eq!(
      ChannelRef::new("@chan").listing_url(),
      "https://www.youtube.com/@chan/videos"
    );
    assert_eq!(
      ChannelRef::new("https://www.youtube.com/@chan/streams").listing_url(),
      "https://www.youtube.com/@chan/streams"
    );
    assert_eq!(
      ChannelRef::new("https://www.youtube.com/playlist?list=PL1").listing_url(),
      "https://www.youtube.com/playlist?list=PL1"
    );
    assert_eq!(
      ChannelRef::new("https://vimeo.com/someone").listing_url(),
      "https://vimeo.com/someone"
    );
  }

  #[test]
  fn test_channel_name() {
    let r = ChannelRef::new("https://www.youtube.com/@chan/videos");
    assert_eq!(r.channel_name().as_deref(), Some("@chan"));

    let r = ChannelRef::new("https://www.youtube.com/channel/UCx/streams");
    assert_eq!(r.channel_name().as_deref(), Some("UCx"));
  }
}
