use crate::{channel::is_channel_id, config::DEFAULT_PIPED_INSTANCE};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipedInstance {
  base_url: String,
}

impl PipedInstance {
  pub fn new(domain: &str) -> Self {
    let domain = domain.trim_end_matches('/');
    let base_url = if domain.contains("://") {
      domain.to_string()
    } else {
      format!("https://{domain}")
    };
    Self { base_url }
  }

  /// Channel endpoint for a `UC...` id, an `@handle` or a custom name.
  pub fn channel_url(&self, channel: &str) -> String {
    if is_channel_id(channel) {
      format!("{}/channel/{}", self.base_url, channel)
    } else if let Some(handle) = channel.strip_prefix('@') {
      format!("{}/@/{}", self.base_url, handle)
    } else {
      format!("{}/c/{}", self.base_url, channel)
    }
  }

  pub fn stream_url(&self, video_id: &str) -> String {
    format!("{}/streams/{}", self.base_url, video_id)
  }
}

impl Default for PipedInstance {
  fn default() -> Self {
    Self::new(DEFAULT_PIPED_INSTANCE)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_urls() {
    let piped = PipedInstance::default();
    assert_eq!(
      piped.channel_url("UC1yNl2E66ZzKApQdRuTQ4tw"),
      "https://pipedapi.kavin.rocks/channel/UC1yNl2E66ZzKApQdRuTQ4tw"
    );
    assert_eq!(
      piped.channel_url("@chan"),
      "https://pipedapi.kavin.rocks/@/chan"
    );
    assert_eq!(
      piped.stream_url("abc"),
      "https://pipedapi.kavin.rocks/streams/abc"
    );

    let local = PipedInstance::new("http://localhost:8080/");
    assert_eq!(local.channel_url("name"), "http://localhost:8080/c/name");
  }
}
