// ── Receiver state ──
//
// Flat snapshot model, the lock-free store holding it, and the
// projection from the receiver's MSO document.

pub mod projection;
pub mod sound_mode;
mod state;
mod state_store;

pub use projection::{project_full, project_partial};
pub use sound_mode::SoundMode;
pub use state::{DeviceState, Frame, keys};
pub use state_store::StateStore;
