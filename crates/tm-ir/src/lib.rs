//! Song model for the trackmix playback engine.
//!
//! A `Song` is built by an external loader or editor and consumed read-only
//! by the engine. Sample PCM is stored padded, with loop lookahead windows
//! precomputed whenever loop points change.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod dialect;
mod effects;
mod instrument;
mod integrity;
mod pattern;
mod sample;
pub mod song;

pub use dialect::PlaybackDialect;
pub use effects::{nibbles, Effect, VolumeCommand};
pub use instrument::{
    DuplicateCheck, Envelope, EnvelopePoint, FilterMode, Instrument, KeyMapping, MidiMapping,
    NewNoteAction, NoteAction, Tuning, ENVELOPE_FRACTION, ENVELOPE_MAX,
};
pub use integrity::{check_integrity, IntegrityIssue};
pub use pattern::{Cell, Note, Pattern, NOTE_COUNT, NOTE_MIDDLE_C};
pub use sample::{
    AutoVibrato, LoopKind, LoopSlot, LoopWindows, PcmBuffer, PcmFrame, Sample, SampleData,
    SampleLoop, VibratoWave, LOOKAHEAD, WINDOW_LEN,
};
pub use song::{ChannelSettings, OrderEntry, Song, TempoMode, MAX_GLOBAL_VOLUME, MAX_PATTERN_CHANNELS};
