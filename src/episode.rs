use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One discovered unit of content, as kept in history.
///
/// Field names on disk follow the history files written by earlier
/// versions of the tool (`upload_date`, `stream_url`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
  pub id: String,
  #[serde(default, deserialize_with = "de::string_or_null")]
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(rename = "upload_date", default, with = "upload_date")]
  pub published_at: Option<NaiveDate>,
  #[serde(rename = "duration", default, deserialize_with = "de::seconds")]
  pub duration_seconds: Option<u64>,
  #[serde(rename = "stream_url", default, deserialize_with = "de::string_or_null")]
  pub play_url: String,
  #[serde(rename = "webpage_url", default, deserialize_with = "de::string_or_null")]
  pub page_url: String,
  #[serde(default, deserialize_with = "de::string_or_null")]
  pub channel_title: String,
}

/// An episode as reported by a resolver. Nothing is guaranteed, not even
/// the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
  pub id: Option<String>,
  pub title: Option<String>,
  pub description: Option<String>,
  pub published_at: Option<NaiveDate>,
  pub duration_seconds: Option<u64>,
  pub play_url: Option<String>,
  pub page_url: Option<String>,
  pub channel_title: Option<String>,
}

impl Candidate {
  /// Converts into an [`Episode`], or `None` when there is no usable id.
  pub fn into_episode(self) -> Option<Episode> {
    let id = self.id.filter(|id| !id.trim().is_empty())?;
    Some(Episode {
      id,
      title: self.title.unwrap_or_default(),
      description: self.description,
      published_at: self.published_at,
      duration_seconds: self.duration_seconds,
      play_url: self.play_url.unwrap_or_default(),
      page_url: self.page_url.unwrap_or_default(),
      channel_title: self.channel_title.unwrap_or_default(),
    })
  }
}

impl Episode {
  /// Copies the fields a resolver may re-derive between runs onto `self`.
  /// Empty values never overwrite stored ones. Returns whether anything
  /// changed.
  pub fn refresh_from(&mut self, fresh: &Episode) -> bool {
    let mut changed = false;

    changed |= refresh_string(&mut self.play_url, &fresh.play_url);
    changed |= refresh_string(&mut self.title, &fresh.title);
    changed |= refresh_string(&mut self.channel_title, &fresh.channel_title);
    changed |= refresh_option(&mut self.description, &fresh.description);
    changed |= refresh_option(&mut self.published_at, &fresh.published_at);
    changed |=
      refresh_option(&mut self.duration_seconds, &fresh.duration_seconds);

    // the canonical page url is stable, only fill it in when missing
    if self.page_url.is_empty() && !fresh.page_url.is_empty() {
      self.page_url = fresh.page_url.clone();
      changed = true;
    }

    changed
  }
}

fn refresh_string(stored: &mut String, fresh: &str) -> bool {
  if fresh.is_empty() || stored == fresh {
    return false;
  }
  *stored = fresh.to_string();
  true
}

fn refresh_option<T: Clone + PartialEq>(
  stored: &mut Option<T>,
  fresh: &Option<T>,
) -> bool {
  match fresh {
    Some(value) if stored.as_ref() != Some(value) => {
      *stored = Some(value.clone());
      true
    }
    _ => false,
  }
}

// yyyymmdd, the format yt-dlp reports upload dates in
pub(crate) mod upload_date {
  use chrono::NaiveDate;
  use serde::{Deserialize, Deserializer, Serializer};

  const FORMAT: &str = "%Y%m%d";

  pub fn parse(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), FORMAT).ok()
  }

  pub fn serialize<S: Serializer>(
    date: &Option<NaiveDate>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match date {
      Some(date) => serializer.serialize_str(&date.format(FORMAT).to_string()),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<NaiveDate>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse))
  }
}

mod de {
  use serde::{Deserialize, Deserializer};

  pub fn string_or_null<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
  }

  // yt-dlp reports durations as either integers or floats
  pub fn seconds<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<u64>, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|secs| *secs >= 0.0).map(|secs| secs.round() as u64))
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub fn episode(id: &str, play_url: &str) -> Episode {
    Episode {
      id: id.into(),
      title: format!("title {id}"),
      play_url: play_url.into(),
      page_url: format!("https://www.youtube.com/watch?v={id}"),
      channel_title: "Chan".into(),
      ..Default::default()
    }
  }

  pub fn candidate(id: &str, play_url: &str) -> Candidate {
    Candidate {
      id: Some(id.into()),
      title: Some(format!("title {id}")),
      play_url: Some(play_url.into()),
      page_url: Some(format!("https://www.youtube.com/watch?v={id}")),
      channel_title: Some("Chan".into()),
      ..Default::default()
    }
  }

  #[test]
  fn test_candidate_without_id_is_rejected() {
    assert_eq!(Candidate::default().into_episode(), None);

    let blank = Candidate {
      id: Some("  ".into()),
      title: Some("x".into()),
      ..Default::default()
    };
    assert_eq!(blank.into_episode(), None);
  }

  #[test]
  fn test_refresh_keeps_stored_values_over_empty_ones() {
    let mut stored = episode("a", "old");
    stored.description = Some("desc".into());

    let fresh = Episode {
      id: "a".into(),
      play_url: "new".into(),
      ..Default::default()
    };

    assert!(stored.refresh_from(&fresh));
    assert_eq!(stored.play_url, "new");
    assert_eq!(stored.title, "title a");
    assert_eq!(stored.description.as_deref(), Some("desc"));
    assert!(!stored.refresh_from(&fresh));
  }

  #[test]
  fn test_reads_legacy_history_entry() {
    let json = r#"{
      "id": "dQw4w9WgXcQ",
      "title": "Episode",
      "description": null,
      "upload_date": "20240131",
      "duration": 212.6,
      "stream_url": "https://rr1.example/videoplayback?x=1",
      "webpage_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
      "channel_title": null,
      "thumbnail": "ignored"
    }"#;

    let episode: Episode = serde_json::from_str(json).unwrap();
    assert_eq!(episode.id, "dQw4w9WgXcQ");
    assert_eq!(episode.published_at, NaiveDate::from_ymd_opt(2024, 1, 31));
    assert_eq!(episode.duration_seconds, Some(213));
    assert_eq!(episode.channel_title, "");

    let written = serde_json::to_value(&episode).unwrap();
    assert_eq!(written["upload_date"], "20240131");
    assert_eq!(written["stream_url"], "https://rr1.example/videoplayback?x=1");
  }
}
