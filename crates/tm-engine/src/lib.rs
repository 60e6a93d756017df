//! Playback engine for trackmix.
//!
//! A [`Player`] owns a [`tm_ir::Song`] and turns it into audio: the
//! sequencer steps rows and ticks, the effect processor folds pattern
//! commands into per-voice state, and the mixer resamples every active voice
//! into a fixed-point stereo buffer that post-processing converts to the
//! output format.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod channel;
mod effects;
mod envelope_state;
mod error;
mod filter;
pub mod fixed;
pub mod frequency;
pub mod mixer;
mod player;
pub mod post;
pub mod ramp;
pub mod resampler;
pub mod sequencer;
pub mod settings;
pub mod voice_pool;
mod waveform;

pub use channel::ChannelState;
pub use error::EngineError;
pub use mixer::Mixer;
pub use player::Player;
pub use post::{AmigaLowPass, MixHook};
pub use sequencer::{Advance, PlayState};
pub use settings::{DitherMode, FirWindow, InterpolationKind, MixerSettings, SampleFormat};
pub use voice_pool::VoicePool;
