//! Analytics event types — identify, group, page and track calls as
//! delivered by the host framework. Events are immutable snapshots; the
//! pipeline only copies values out of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use ramen_core::types::{is_email, lookup, value_to_string, TraitBag};

use crate::dates::parse_instant;

/// Discriminant of an [`Event`], used for routing and metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Identify,
    Group,
    Page,
    Track,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Identify => "identify",
            EventKind::Group => "group",
            EventKind::Page => "page",
            EventKind::Track => "track",
        }
    }
}

/// Fields shared by every event kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(default = "Uuid::new_v4")]
    pub message_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Per-destination options keyed by destination name.
    #[serde(default, skip_serializing_if = "TraitBag::is_empty")]
    pub integrations: TraitBag,
}

impl Default for EventEnvelope {
    fn default() -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: None,
            integrations: TraitBag::new(),
        }
    }
}

impl EventEnvelope {
    /// Options scoped to one destination. The destination key is matched
    /// case-insensitively; a non-object entry (e.g. `"Ramen": true`) carries
    /// no options.
    pub fn options(&self, destination: &str) -> TraitBag {
        match lookup(&self.integrations, destination) {
            Some(Value::Object(opts)) => opts.clone(),
            _ => TraitBag::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub traits: TraitBag,
    #[serde(flatten)]
    pub envelope: EventEnvelope,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, alias = "properties")]
    pub traits: TraitBag,
    #[serde(flatten)]
    pub envelope: EventEnvelope,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub properties: TraitBag,
    #[serde(flatten)]
    pub envelope: EventEnvelope,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    pub event: String,
    #[serde(default)]
    pub properties: TraitBag,
    #[serde(flatten)]
    pub envelope: EventEnvelope,
}

/// A single analytics call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Identify(IdentifyEvent),
    Group(GroupEvent),
    Page(PageEvent),
    Track(TrackEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Identify(_) => EventKind::Identify,
            Event::Group(_) => EventKind::Group,
            Event::Page(_) => EventKind::Page,
            Event::Track(_) => EventKind::Track,
        }
    }

    pub fn envelope(&self) -> &EventEnvelope {
        match self {
            Event::Identify(e) => &e.envelope,
            Event::Group(e) => &e.envelope,
            Event::Page(e) => &e.envelope,
            Event::Track(e) => &e.envelope,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.envelope().message_id
    }

    pub fn options(&self, destination: &str) -> TraitBag {
        self.envelope().options(destination)
    }
}

/// Email carried by a trait bag.
pub(crate) fn email_in(traits: &TraitBag) -> Option<String> {
    lookup(traits, "email").and_then(value_to_string)
}

/// `name`, else `firstName lastName` when either half is present.
pub(crate) fn name_in(traits: &TraitBag) -> Option<String> {
    if let Some(name) = lookup(traits, "name").and_then(value_to_string) {
        return Some(name);
    }
    let first = lookup(traits, "firstName").and_then(value_to_string);
    let last = lookup(traits, "lastName").and_then(value_to_string);
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(half), None) | (None, Some(half)) => Some(half),
        (None, None) => None,
    }
}

/// First creation-time spelling present in the bag.
fn created_in(traits: &TraitBag) -> Option<DateTime<Utc>> {
    lookup(traits, "created")
        .or_else(|| lookup(traits, "created_at"))
        .and_then(parse_instant)
}

impl IdentifyEvent {
    pub fn new(user_id: Option<&str>, traits: TraitBag) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            traits,
            envelope: EventEnvelope::default(),
        }
    }

    /// Attach per-destination options.
    pub fn with_options(mut self, destination: &str, options: Value) -> Self {
        self.envelope
            .integrations
            .insert(destination.to_string(), options);
        self
    }

    pub fn options(&self, destination: &str) -> TraitBag {
        self.envelope.options(destination)
    }

    /// Email trait, else the user id when it is itself an address.
    pub fn email(&self) -> Option<String> {
        email_in(&self.traits).or_else(|| {
            self.user_id
                .as_deref()
                .filter(|id| is_email(id))
                .map(str::to_string)
        })
    }

    pub fn name(&self) -> Option<String> {
        name_in(&self.traits)
    }

    /// The event's own user id, else its `username` trait.
    pub fn uid(&self) -> Option<String> {
        self.user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .or_else(|| lookup(&self.traits, "username").and_then(value_to_string))
    }
}

impl GroupEvent {
    pub fn new(group_id: Option<&str>, traits: TraitBag) -> Self {
        Self {
            group_id: group_id.map(str::to_string),
            traits,
            envelope: EventEnvelope::default(),
        }
    }

    pub fn properties(&self) -> &TraitBag {
        &self.traits
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        created_in(&self.traits)
    }
}

impl PageEvent {
    pub fn new(name: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            ..Default::default()
        }
    }
}

impl TrackEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }
}
