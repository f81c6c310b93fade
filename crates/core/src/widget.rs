//! Widget seam — the vendor script's runtime surface.
//!
//! Adaptors accept an `Arc<dyn Widget>` to publish the settings object the
//! widget reads (`ramenSettings`), ask it to re-evaluate (`Ramen.go()`), and
//! report named events (`Ramen.Api.track_named()`).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::SettingsObject;

/// Runtime surface of the embedded widget. Every call must be safe to repeat.
pub trait Widget: Send + Sync {
    /// Whether the vendor script has finished loading.
    fn is_loaded(&self) -> bool;

    /// Expose `settings` at the shared read location.
    fn publish(&self, settings: &SettingsObject);

    /// Re-read the published settings.
    fn go(&self);

    /// Report a named user action.
    fn track_named(&self, event: &str);
}

/// Stand-in for a widget whose script never loaded. Ignores every call.
pub struct DetachedWidget;

impl Widget for DetachedWidget {
    fn is_loaded(&self) -> bool {
        false
    }

    fn publish(&self, _settings: &SettingsObject) {}

    fn go(&self) {}

    fn track_named(&self, _event: &str) {}
}

/// One observed call on a [`RecordingWidget`].
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetCall {
    Publish,
    Go,
    TrackNamed(String),
}

#[derive(Default)]
struct RecordedState {
    settings: Option<SettingsObject>,
    calls: Vec<WidgetCall>,
}

/// In-memory widget that records calls, for tests and dry runs.
pub struct RecordingWidget {
    loaded: bool,
    state: Mutex<RecordedState>,
}

impl Default for RecordingWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingWidget {
    pub fn new() -> Self {
        Self {
            loaded: true,
            state: Mutex::new(RecordedState::default()),
        }
    }

    /// A recorder that reports the script as not yet loaded.
    pub fn unloaded() -> Self {
        Self {
            loaded: false,
            ..Self::new()
        }
    }

    /// Last published settings, `None` until the first publish.
    pub fn settings(&self) -> Option<SettingsObject> {
        self.state.lock().settings.clone()
    }

    pub fn calls(&self) -> Vec<WidgetCall> {
        self.state.lock().calls.clone()
    }

    pub fn go_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| **c == WidgetCall::Go)
            .count()
    }

    pub fn tracked(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                WidgetCall::TrackNamed(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.settings = None;
        state.calls.clear();
    }
}

impl Widget for RecordingWidget {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn publish(&self, settings: &SettingsObject) {
        let mut state = self.state.lock();
        state.settings = Some(settings.clone());
        state.calls.push(WidgetCall::Publish);
    }

    fn go(&self) {
        self.state.lock().calls.push(WidgetCall::Go);
    }

    fn track_named(&self, event: &str) {
        self.state
            .lock()
            .calls
            .push(WidgetCall::TrackNamed(event.to_string()));
    }
}

/// Convenience: a widget that is never loaded.
pub fn detached_widget() -> Arc<dyn Widget> {
    Arc::new(DetachedWidget)
}

/// Convenience: create a recording widget for tests.
pub fn recording_widget() -> Arc<RecordingWidget> {
    Arc::new(RecordingWidget::new())
}
