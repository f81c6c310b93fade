//! Destination adaptors — translate analytics calls into a third-party
//! widget's configuration and entry points.
//!
//! Each adaptor implements [`Destination`]. Calls never fail: a call that
//! cannot be honoured is reported as [`DispatchOutcome::Skipped`].

pub mod ramen;

use std::fmt;

use anyhow::Result;

use crate::events::{Event, GroupEvent, IdentifyEvent, PageEvent, TrackEvent};
use crate::identity::IdentityContext;

/// Why a call made no observable change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// No email could be resolved from the event or the context.
    MissingIdentity,
    /// The vendor script has not loaded yet.
    WidgetUnavailable,
    /// Settings have never been published.
    NotIdentified,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingIdentity => "missing_identity",
            SkipReason::WidgetUnavailable => "widget_unavailable",
            SkipReason::NotIdentified => "not_identified",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of handing one call to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched,
    Skipped(SkipReason),
}

impl DispatchOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched)
    }
}

/// Adaptor trait — one implementation per destination widget.
pub trait Destination: Send {
    /// Destination name, also the key of its per-call options.
    fn name(&self) -> &str;

    /// Validate that the adaptor configuration is correct.
    fn validate_config(&self) -> Result<()>;

    /// Reset state to its freshly-constructed defaults.
    fn initialize(&mut self);

    /// Whether the destination's widget is ready to receive calls.
    fn loaded(&self) -> bool;

    fn identify(&mut self, event: &IdentifyEvent, ctx: &IdentityContext) -> DispatchOutcome;

    fn group(&mut self, event: &GroupEvent, ctx: &IdentityContext) -> DispatchOutcome;

    fn page(&mut self, event: &PageEvent, ctx: &IdentityContext) -> DispatchOutcome;

    fn track(&mut self, event: &TrackEvent, ctx: &IdentityContext) -> DispatchOutcome;

    /// Route an event to the matching handler.
    fn handle(&mut self, event: &Event, ctx: &IdentityContext) -> DispatchOutcome {
        match event {
            Event::Identify(e) => self.identify(e, ctx),
            Event::Group(e) => self.group(e, ctx),
            Event::Page(e) => self.page(e, ctx),
            Event::Track(e) => self.track(e, ctx),
        }
    }
}
