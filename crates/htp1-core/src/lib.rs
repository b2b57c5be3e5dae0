// htp1-core: State model, command encoding and subscriber fan-out for the HTP-1.

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod notification;
pub mod registry;
mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Action, MenuCommand};
pub use config::DeviceConfig;
pub use device::Device;
pub use error::CoreError;
pub use notification::{Notification, StateChange};
pub use registry::{NotificationSink, SubscriberId};
pub use store::{DeviceState, SoundMode, StateStore, keys};

pub use htp1_api::ConnectionStatus;
