pub mod config;
pub mod error;
pub mod types;
pub mod widget;

pub use config::{AppConfig, RamenConfig};
pub use error::{BridgeError, BridgeResult};
pub use types::{SettingsObject, TraitBag};
pub use widget::Widget;
