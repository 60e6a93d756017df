//! Sound-device boundary for trackmix.
//!
//! The device pulls audio: a [`AudioCallback`] is invoked on the audio
//! thread for every buffer, and device events come back through a lock-free
//! queue.

mod cpal_backend;
mod traits;

pub use cpal_backend::CpalOutput;
pub use traits::{AudioCallback, AudioError, AudioOutput, DeviceEvent, DeviceInfo};
