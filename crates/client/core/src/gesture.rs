//! Recognition events received over the gesture channel.
//!
//! Every inbound payload is `{"gesture": "<value>"}`. A value made of two
//! comma-separated numbers is a pointer coordinate in processing space; any
//! other value is a gesture name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::traits::{KeyValueStore, StoreError};

/// Store key holding the user's remap table.
pub const REMAP_KEY: &str = "gestureSettings";

/// Names the recognizer emits when nothing actionable is in view.
pub const IDLE_GESTURES: [&str; 3] = ["None", "Normal", "no hand detected"];

/// A classified recognition event.
#[derive(Clone, Debug, PartialEq)]
pub enum GestureEvent {
    /// Canonical gesture name, before remapping.
    Named(String),
    /// Pointer position in processing-space pixels.
    Coordinate { x: f64, y: f64 },
}

impl GestureEvent {
    /// Classify a raw `gesture` value.
    pub fn classify(value: &str) -> Self {
        match parse_coordinate(value) {
            Some((x, y)) => GestureEvent::Coordinate { x, y },
            None => GestureEvent::Named(value.to_string()),
        }
    }

    /// Whether this is one of the recognizer's "nothing seen" names.
    pub fn is_idle(&self) -> bool {
        match self {
            GestureEvent::Named(name) => is_idle_name(name),
            GestureEvent::Coordinate { .. } => false,
        }
    }
}

pub fn is_idle_name(name: &str) -> bool {
    IDLE_GESTURES.contains(&name)
}

#[derive(Debug, Deserialize)]
struct GesturePayload {
    gesture: Option<String>,
}

/// Errors produced while decoding a channel payload.
#[derive(Debug, thiserror::Error)]
pub enum GestureParseError {
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload has no gesture field")]
    MissingGesture,
}

/// Decode and classify one inbound message.
pub fn parse_message(raw: &str) -> Result<GestureEvent, GestureParseError> {
    let payload: GesturePayload = serde_json::from_str(raw)?;
    let gesture = payload.gesture.ok_or(GestureParseError::MissingGesture)?;
    Ok(GestureEvent::classify(&gesture))
}

fn parse_coordinate(value: &str) -> Option<(f64, f64)> {
    let (x, y) = value.split_once(',')?;
    if y.contains(',') {
        return None;
    }
    let x: f64 = x.trim().parse().ok()?;
    let y: f64 = y.trim().parse().ok()?;
    (x.is_finite() && y.is_finite()).then_some((x, y))
}

/// User-chosen mapping from canonical gesture names to action names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemapTable {
    entries: HashMap<String, String>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from the store; a missing or unreadable entry yields an empty table.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(raw) = store.get(REMAP_KEY) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!("Ignoring unreadable gesture settings: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let raw =
            serde_json::to_string(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        store.set(REMAP_KEY, &raw)
    }

    pub fn insert(&mut self, gesture: impl Into<String>, action: impl Into<String>) {
        self.entries.insert(gesture.into(), action.into());
    }

    /// Mapped action name, or the canonical name itself when unmapped.
    pub fn resolve<'a>(&'a self, canonical: &'a str) -> &'a str {
        self.entries
            .get(canonical)
            .map(String::as_str)
            .unwrap_or(canonical)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RemapTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
