//! Analytics-to-widget bridge — translates identify, group, page and track
//! calls into the Ramen widget's settings object and triggers its refresh.
//!
//! # Modules
//!
//! - [`events`] — Analytics event types (identify, group, page, track)
//! - [`identity`] — Identity context and resolver
//! - [`traits`] — Trait extraction and field redaction
//! - [`dates`] — Date normalization to epoch seconds
//! - [`settings`] — Settings assembly and merge precedence
//! - [`adaptors`] — Destination adaptors (Ramen)
//! - [`collector`] — Event router standing in for the host framework

pub mod adaptors;
pub mod collector;
pub mod dates;
pub mod events;
pub mod identity;
pub mod settings;
pub mod traits;

pub use adaptors::ramen::RamenAdaptor;
pub use adaptors::{Destination, DispatchOutcome, SkipReason};
pub use collector::EventRouter;
pub use events::{Event, EventKind};
pub use identity::IdentityContext;
