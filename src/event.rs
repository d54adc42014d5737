// src/event.rs
//! Lifecycle events delivered over the bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topic names shared by producers and consumers.
pub const ADD_TOPIC: &str = "add";
pub const DELETE_TOPIC: &str = "delete";
pub const SCRAPE_TOPIC: &str = "scrape";

/// Operation a bus message requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Add,
    Delete,
    Scrape,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Add, EventKind::Delete, EventKind::Scrape];

    pub fn topic(self) -> &'static str {
        match self {
            EventKind::Add => ADD_TOPIC,
            EventKind::Delete => DELETE_TOPIC,
            EventKind::Scrape => SCRAPE_TOPIC,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.topic())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            ADD_TOPIC => Ok(EventKind::Add),
            DELETE_TOPIC => Ok(EventKind::Delete),
            SCRAPE_TOPIC => Ok(EventKind::Scrape),
            other => Err(format!("unknown topic: {other}")),
        }
    }
}

/// One delivery from the bus. `payload` is a symbol name for add/scrape
/// and a numeric symbol id (as text) for delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub payload: String,
}

impl Event {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_parse_case_insensitively() {
        assert_eq!("ADD".parse::<EventKind>().unwrap(), EventKind::Add);
        assert_eq!(" scrape ".parse::<EventKind>().unwrap(), EventKind::Scrape);
        assert!("update".parse::<EventKind>().is_err());
    }

    #[test]
    fn display_matches_topic() {
        for kind in EventKind::ALL {
            assert_eq!(kind.to_string(), kind.topic());
        }
    }
}
