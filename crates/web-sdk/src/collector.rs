//! Event router — stands in for the host analytics framework. Records
//! identity from identify and group calls, then forwards every event, in
//! delivery order, to each registered destination. Also keeps per-kind
//! dispatch counters.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::adaptors::{Destination, DispatchOutcome, SkipReason};
use crate::events::{Event, EventKind};
use crate::identity::IdentityContext;

/// Per-kind aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindMetrics {
    pub received: u64,
    pub dispatched: u64,
    pub skipped: u64,
    pub skipped_by_reason: HashMap<SkipReason, u64>,
}

/// Routes events to destinations and tracks per-kind metrics.
pub struct EventRouter {
    context: IdentityContext,
    destinations: Vec<Box<dyn Destination>>,
    metrics: HashMap<EventKind, KindMetrics>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            context: IdentityContext::new(),
            destinations: Vec::new(),
            metrics: HashMap::new(),
        }
    }

    /// Register a destination. Destinations receive events in registration
    /// order.
    pub fn with_destination(mut self, destination: Box<dyn Destination>) -> Self {
        self.destinations.push(destination);
        self
    }

    /// Initialize every destination.
    pub fn initialize(&mut self) {
        for destination in &mut self.destinations {
            destination.initialize();
            info!(destination = destination.name(), "destination initialized");
        }
    }

    /// Record identity state, then forward the event to every destination.
    pub fn ingest(&mut self, event: &Event) -> Vec<DispatchOutcome> {
        match event {
            Event::Identify(identify) => self.context.record_identify(identify),
            Event::Group(group) => self.context.record_group(group),
            Event::Page(_) | Event::Track(_) => {}
        }

        let kind = event.kind();
        let outcomes: Vec<DispatchOutcome> = self
            .destinations
            .iter_mut()
            .map(|destination| destination.handle(event, &self.context))
            .collect();

        let metrics = self.metrics.entry(kind).or_default();
        metrics.received += 1;
        for outcome in &outcomes {
            match outcome {
                DispatchOutcome::Dispatched => metrics.dispatched += 1,
                DispatchOutcome::Skipped(reason) => {
                    metrics.skipped += 1;
                    *metrics.skipped_by_reason.entry(*reason).or_default() += 1;
                }
            }
        }

        debug!(
            kind = kind.as_str(),
            message_id = %event.message_id(),
            destinations = outcomes.len(),
            "event routed"
        );
        outcomes
    }

    /// Ingest events in order.
    pub fn ingest_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for event in events {
            self.ingest(event);
        }
    }

    pub fn context(&self) -> &IdentityContext {
        &self.context
    }

    /// Forget the current user and group (e.g. on logout).
    pub fn reset_identity(&mut self) {
        self.context.reset();
    }

    /// Metrics for one event kind.
    pub fn metrics(&self, kind: EventKind) -> KindMetrics {
        self.metrics.get(&kind).cloned().unwrap_or_default()
    }

    /// Total events received across all kinds.
    pub fn total_received(&self) -> u64 {
        self.metrics.values().map(|m| m.received).sum()
    }
}
