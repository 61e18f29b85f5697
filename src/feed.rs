use std::{
  fs,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
  channel::ChannelKey, episode::Episode, history::write_atomic,
  podcast::Podcast, Error, Result,
};

/// What gets handed to an emitter for one channel.
#[derive(Debug, Clone, Copy)]
pub struct ChannelFeed<'a> {
  pub key: &'a ChannelKey,
  pub title: &'a str,
  pub episodes: &'a [Episode],
}

/// Serializes a channel's episode list into a file a player can consume.
/// Rendering must be deterministic for the same input.
pub trait FeedEmitter {
  fn extension(&self) -> &'static str;
  fn render(&self, feed: &ChannelFeed<'_>) -> Result<Vec<u8>>;
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
  clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FeedFormat {
  /// Podcast RSS with iTunes tags.
  #[default]
  Rss,
  /// Extended M3U playlist.
  M3u,
}

impl FeedFormat {
  pub fn emitter(self, language: &str) -> Box<dyn FeedEmitter> {
    match self {
      FeedFormat::Rss => Box::new(RssEmitter::new(language)),
      FeedFormat::M3u => Box::new(M3uEmitter),
    }
  }
}

pub struct RssEmitter {
  language: String,
}

impl RssEmitter {
  pub fn new(language: impl Into<String>) -> Self {
    Self {
      language: language.into(),
    }
  }
}

impl FeedEmitter for RssEmitter {
  fn extension(&self) -> &'static str {
    "xml"
  }

  fn render(&self, feed: &ChannelFeed<'_>) -> Result<Vec<u8>> {
    let podcast = Podcast::new(feed.title, &self.language, feed.episodes);
    let channel: rss::Channel = podcast.into();

    let mut output = Vec::new();
    channel.pretty_write_to(&mut output, b' ', 2)?;
    output.push(b'\n');
    Ok(output)
  }
}

pub struct M3uEmitter;

impl FeedEmitter for M3uEmitter {
  fn extension(&self) -> &'static str {
    "m3u"
  }

  fn render(&self, feed: &ChannelFeed<'_>) -> Result<Vec<u8>> {
    let mut output = String::from("#EXTM3U\n");
    output.push_str(&format!("#PLAYLIST:{}\n", one_line(feed.title)));

    for episode in feed.episodes.iter().filter(|e| !e.play_url.is_empty()) {
      let duration = episode
        .duration_seconds
        .map(|secs| secs as i64)
        .unwrap_or(-1);
      output.push_str(&format!(
        "#EXTINF:{duration},{}\n{}\n",
        one_line(&episode.title),
        episode.play_url
      ));
    }

    Ok(output.into_bytes())
  }
}

fn one_line(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn artifact_path(
  output_dir: &Path,
  emitter: &dyn FeedEmitter,
  key: &ChannelKey,
) -> PathBuf {
  output_dir.join(format!("{key}.{}", emitter.extension()))
}

/// Renders `feed` and writes it to `{output_dir}/{key}.{ext}`, creating the
/// directory when needed.
pub fn write_artifact(
  output_dir: &Path,
  emitter: &dyn FeedEmitter,
  feed: &ChannelFeed<'_>,
) -> Result<PathBuf> {
  fs::create_dir_all(output_dir)
    .map_err(|e| Error::persistence(output_dir, e))?;

  let path = artifact_path(output_dir, emitter, feed.key);
  let contents = emitter.render(feed)?;
  write_atomic(&path, &contents)?;
  Ok(path)
}

#[cfg(test)]
mod tests {
  use tempfile::TempDir;

  use super::*;
  use crate::episode::tests::episode;

  fn episodes() -> Vec<Episode> {
    let mut new = episode("v2", "https://cdn.example/v2");
    new.title = "New".into();
    new.duration_seconds = Some(90);
    let mut old = episode("v1", "https://cdn.example/v1");
    old.title = "Old".into();
    vec![new, old]
  }

  #[test]
  fn test_rss_lists_newest_first() {
    let key = ChannelKey::from("chan");
    let episodes = episodes();
    let feed = ChannelFeed {
      key: &key,
      title: "Chan",
      episodes: &episodes,
    };

    let xml = String::from_utf8(RssEmitter::new("en").render(&feed).unwrap())
      .unwrap();
    let new = xml.find("<title>New</title>").unwrap();
    let old = xml.find("<title>Old</title>").unwrap();
    assert!(new < old);
    assert!(xml.contains("<guid isPermaLink=\"false\">v2</guid>"));
    assert!(xml.contains("<itunes:duration>01:30</itunes:duration>"));

    let parsed = rss::Channel::read_from(xml.as_bytes()).unwrap();
    assert_eq!(parsed.title, "Chan (Audio)");
    assert_eq!(parsed.items.len(), 2);
  }

  #[test]
  fn test_rss_is_deterministic() {
    let key = ChannelKey::from("chan");
    let episodes = episodes();
    let feed = ChannelFeed {
      key: &key,
      title: "Chan",
      episodes: &episodes,
    };

    let emitter = RssEmitter::new("en");
    assert_eq!(emitter.render(&feed).unwrap(), emitter.render(&feed).unwrap());
  }

  #[test]
  fn test_m3u() {
    let key = ChannelKey::from("chan");
    let mut episodes = episodes();
    episodes.push(Episode {
      id: "v0".into(),
      title: "no url".into(),
      ..Default::default()
    });
    let feed = ChannelFeed {
      key: &key,
      title: "Chan\nTV",
      episodes: &episodes,
    };

    let out = String::from_utf8(M3uEmitter.render(&feed).unwrap()).unwrap();
    assert_eq!(
      out,
      "#EXTM3U\n\
       #PLAYLIST:Chan TV\n\
       #EXTINF:90,New\n\
       https://cdn.example/v2\n\
       #EXTINF:-1,Old\n\
       https://cdn.example/v1\n"
    );
  }

  #[test]
  fn test_write_artifact_creates_directory() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("feeds");
    let key = ChannelKey::from("chan_Live");
    let episodes = episodes();
    let feed = ChannelFeed {
      key: &key,
      title: "Chan",
      episodes: &episodes,
    };

    let emitter = FeedFormat::M3u.emitter("en");
    let path = write_artifact(&out, emitter.as_ref(), &feed).unwrap();
    assert_eq!(path, out.join("chan_Live.m3u"));
    assert!(fs::read_to_string(path).unwrap().starts_with("#EXTM3U"));
  }
}
