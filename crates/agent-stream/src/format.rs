use std::fmt;
use std::str::FromStr;

use crate::event::Event;

/// How a caller wants each event presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    /// Typed [`Event`] values.
    #[default]
    Events,
    /// Assistant text deltas only.
    Text,
    /// Each event's raw JSON payload, unchanged.
    Json,
}

/// One presented stream item.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem {
    Event(Event),
    Text(String),
    Json(serde_json::Value),
}

impl StreamFormat {
    /// Presents an event, or returns `None` when this format skips it.
    pub fn render(self, event: Event) -> Option<StreamItem> {
        match self {
            Self::Events => Some(StreamItem::Event(event)),
            Self::Text => event
                .text_delta()
                .filter(|text| !text.is_empty())
                .map(|text| StreamItem::Text(text.to_string())),
            Self::Json => Some(StreamItem::Json(event.raw)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "events" => Ok(Self::Events),
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown stream format: {other}")),
        }
    }
}
