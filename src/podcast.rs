use chrono::{NaiveDate, TimeZone, Utc};
use rss::extension::itunes::{
  ITunesChannelExtensionBuilder, ITunesItemExtensionBuilder,
};

use crate::{episode::Episode, GENERATOR_STR};

const AUDIO_MIME_TYPE: &str = "audio/mp4";

#[derive(Debug, Default)]
pub struct Podcast<'a> {
  pub title: String,
  pub description: String,
  pub last_build_date: Option<String>,
  pub language: String,
  pub author: String,
  pub channel_url: String,
  pub episodes: &'a [Episode],
}

impl<'a> Podcast<'a> {
  pub fn new(channel_title: &str, language: &str, episodes: &'a [Episode]) -> Self {
    let channel_url = episodes
      .first()
      .map(|e| e.page_url.clone())
      .unwrap_or_default();

    // newest known publish date instead of the clock, so the same history
    // always renders the same bytes
    let last_build_date = episodes
      .iter()
      .filter_map(|e| e.published_at)
      .max()
      .and_then(rfc2822);

    Self {
      title: format!("{channel_title} (Audio)"),
      description: format!("Podcast generated automatically from: {channel_title}"),
      last_build_date,
      language: language.to_string(),
      author: channel_title.to_string(),
      channel_url,
      episodes,
    }
  }
}

impl From<Podcast<'_>> for rss::Channel {
  fn from(podcast: Podcast<'_>) -> Self {
    let itunes_ext = ITunesChannelExtensionBuilder::default()
      .author((!podcast.author.is_empty()).then_some(podcast.author))
      .build();

    let mut channel = rss::ChannelBuilder::default()
      .title(podcast.title)
      .description(podcast.description)
      .link(podcast.channel_url)
      .last_build_date(podcast.last_build_date)
      .language((!podcast.language.is_empty()).then_some(podcast.language))
      .itunes_ext(Some(itunes_ext))
      .generator(Some(GENERATOR_STR.to_owned()))
      .build();

    for episode in podcast.episodes {
      channel.items.push(episode.into());
    }

    channel
  }
}

impl From<&Episode> for rss::Item {
  fn from(episode: &Episode) -> Self {
    let description = episode.description.as_deref().unwrap_or_default();
    let description_html = match (description, episode.page_url.as_str()) {
      ("", "") => None,
      (text, "") => Some(format!("<p>{text}</p>\n")),
      (text, link) => Some(format!(
        "<p>{text}</p>\n<p><a href=\"{link}\">{link}</a></p>\n"
      )),
    };

    let enclosure = (!episode.play_url.is_empty()).then(|| {
      rss::EnclosureBuilder::default()
        .url(episode.play_url.clone())
        .length("0".to_owned())
        .mime_type(AUDIO_MIME_TYPE.to_owned())
        .build()
    });

    let itunes = ITunesItemExtensionBuilder::default()
      .summary(episode.description.clone())
      .author(
        (!episode.channel_title.is_empty())
          .then(|| episode.channel_title.clone()),
      )
      .duration(episode.duration_seconds.map(seconds_to_duration))
      .build();

    rss::Item {
      title: Some(episode.title.clone()),
      link: (!episode.page_url.is_empty()).then(|| episode.page_url.clone()),
      pub_date: episode.published_at.and_then(rfc2822),
      guid: Some(rss::Guid {
        value: episode.id.clone(),
        permalink: false,
      }),
      description: description_html,
      itunes_ext: Some(itunes),
      enclosure,
      ..Default::default()
    }
  }
}

fn rfc2822(date: NaiveDate) -> Option<String> {
  let midnight = date.and_hms_opt(0, 0, 0)?;
  Some(Utc.from_utc_datetime(&midnight).to_rfc2822())
}

pub(crate) fn seconds_to_duration(secs: u64) -> String {
  let hours = secs / 3600;
  let minutes = (secs % 3600) / 60;
  let seconds = secs % 60;

  if hours > 0 {
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
  } else {
    format!("{:02}:{:02}", minutes, seconds)
  }
}
