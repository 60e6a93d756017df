//! Instrument and envelope types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::pattern::NOTE_COUNT;

/// Envelope values are interpolated with this many fractional steps.
pub const ENVELOPE_FRACTION: i32 = 256;

/// Maximum volume envelope value.
pub const ENVELOPE_MAX: i8 = 64;

/// One keyboard slot: which sample a note plays and at which pitch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyMapping {
    /// Sample number (0 = none, n = sample index + 1)
    pub sample: u16,
    /// Note actually played (0-119)
    pub note: u8,
}

/// An instrument definition.
#[derive(Clone, Debug)]
pub struct Instrument {
    pub name: ArrayString<32>,
    /// Note (0-119) -> sample and transposed note
    pub keyboard: [KeyMapping; NOTE_COUNT as usize],
    pub volume_envelope: Option<Envelope>,
    pub panning_envelope: Option<Envelope>,
    /// Pitch envelope, or filter envelope when `pitch_envelope_is_filter`
    pub pitch_envelope: Option<Envelope>,
    pub pitch_envelope_is_filter: bool,
    /// Fade-out speed in 1/65536 of full volume per tick (0 = no fade)
    pub fadeout: u32,
    /// Instrument global volume (0-64)
    pub global_volume: u8,
    /// Default panning (0-256), applied when set
    pub default_pan: Option<u16>,
    /// Pan offset per semitone from `pitch_pan_center` (-32 to +32)
    pub pitch_pan_separation: i8,
    pub pitch_pan_center: u8,
    /// Random volume variation in percent (0-100)
    pub volume_swing: u8,
    /// Random panning variation (0-64)
    pub pan_swing: u8,
    /// Initial filter cutoff (0-127)
    pub filter_cutoff: Option<u8>,
    /// Initial filter resonance (0-127)
    pub filter_resonance: Option<u8>,
    pub filter_mode: FilterMode,
    /// What happens when a new note is played on a channel already playing this instrument
    pub new_note_action: NewNoteAction,
    /// Duplicate note checking mode
    pub duplicate_check: DuplicateCheck,
    /// Action applied to duplicates found by `duplicate_check`
    pub duplicate_action: NoteAction,
    pub midi: MidiMapping,
    /// Custom note tuning; played through the floating-point frequency path
    pub tuning: Option<Tuning>,
}

impl Default for Instrument {
    fn default() -> Self {
        let mut keyboard = [KeyMapping::default(); NOTE_COUNT as usize];
        for (note, key) in keyboard.iter_mut().enumerate() {
            key.note = note as u8;
        }
        Self {
            name: ArrayString::new(),
            keyboard,
            volume_envelope: None,
            panning_envelope: None,
            pitch_envelope: None,
            pitch_envelope_is_filter: false,
            fadeout: 0,
            global_volume: 64,
            default_pan: None,
            pitch_pan_separation: 0,
            pitch_pan_center: crate::pattern::NOTE_MIDDLE_C,
            volume_swing: 0,
            pan_swing: 0,
            filter_cutoff: None,
            filter_resonance: None,
            filter_mode: FilterMode::LowPass,
            new_note_action: NewNoteAction::Cut,
            duplicate_check: DuplicateCheck::Off,
            duplicate_action: NoteAction::Cut,
            midi: MidiMapping::default(),
            tuning: None,
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Set all notes to map to a single sample (sample number, 1-based).
    pub fn set_single_sample(&mut self, sample: u16) {
        for key in self.keyboard.iter_mut() {
            key.sample = sample;
        }
    }

    /// Look up the keyboard slot for a note.
    pub fn key(&self, note: u8) -> Option<KeyMapping> {
        self.keyboard.get(note as usize).copied()
    }
}

/// Action when a new note triggers on a channel already playing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NewNoteAction {
    /// Cut the previous note
    #[default]
    Cut,
    /// Continue the previous note (background)
    Continue,
    /// Send note-off to previous note
    Off,
    /// Fade out the previous note
    Fade,
}

/// Action applied to a background voice (duplicate or past note).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoteAction {
    #[default]
    Cut,
    Off,
    Fade,
}

/// Duplicate note checking mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// No duplicate checking
    #[default]
    Off,
    /// Check for duplicate notes
    Note,
    /// Check for duplicate samples
    Sample,
    /// Check for duplicate instruments
    Instrument,
}

/// Resonant filter response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    LowPass,
    HighPass,
}

/// MIDI output mapping. Carried with the song, not interpreted by playback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MidiMapping {
    pub channel: u8,
    pub program: Option<u8>,
    pub bank: Option<u16>,
}

/// Per-note frequency ratios relative to C-5.
#[derive(Clone, Debug, PartialEq)]
pub struct Tuning {
    pub name: ArrayString<32>,
    pub ratios: Vec<f32>,
}

impl Tuning {
    /// Equal temperament with `steps` notes per octave.
    pub fn equal_temperament(name: &str, steps: u8) -> Self {
        let steps = steps.max(1) as f64;
        let mut tuning = Self {
            name: ArrayString::new(),
            ratios: (0..NOTE_COUNT as i32)
                .map(|n| {
                    let offset = (n - crate::pattern::NOTE_MIDDLE_C as i32) as f64;
                    libm::pow(2.0, offset / steps) as f32
                })
                .collect(),
        };
        let _ = tuning.name.try_push_str(name);
        tuning
    }

    /// Ratio for a note; 1.0 when the table doesn't cover it.
    pub fn ratio(&self, note: u8) -> f32 {
        self.ratios.get(note as usize).copied().unwrap_or(1.0)
    }
}

/// A point in an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopePoint {
    /// Tick position
    pub tick: u16,
    /// Value (0 to 64 for volume, -32 to +32 for panning and pitch)
    pub value: i8,
}

/// An envelope (volume, panning, or pitch).
///
/// Loop and sustain ranges are point indices. A sustain range with
/// `start == end` holds on a single point.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub points: Vec<EnvelopePoint>,
    pub sustain: Option<(u8, u8)>,
    pub loop_range: Option<(u8, u8)>,
    /// After key-off the envelope is rescaled relative to this point
    pub release_node: Option<u8>,
    /// Keep the envelope position when a new note triggers
    pub carry: bool,
    pub enabled: bool,
}

impl Envelope {
    /// Create a new empty envelope.
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Add a point to the envelope.
    pub fn add_point(&mut self, tick: u16, value: i8) {
        self.points.push(EnvelopePoint { tick, value });
    }

    /// Tick of a point index, clamped to the last point.
    pub fn tick_of(&self, point: u8) -> u16 {
        self.points
            .get(point as usize)
            .or(self.points.last())
            .map_or(0, |p| p.tick)
    }

    /// Value of a point index, scaled by `ENVELOPE_FRACTION`.
    pub fn value_of(&self, point: u8) -> i32 {
        self.points
            .get(point as usize)
            .map_or(0, |p| p.value as i32 * ENVELOPE_FRACTION)
    }

    /// Tick of the last point.
    pub fn last_tick(&self) -> u16 {
        self.points.last().map_or(0, |p| p.tick)
    }

    /// Interpolated value at a tick, scaled by `ENVELOPE_FRACTION`.
    pub fn value_at(&self, tick: u16) -> i32 {
        let Some(first) = self.points.first() else {
            return 0;
        };

        let mut prev = first;
        for point in &self.points {
            if point.tick > tick {
                if point.tick <= prev.tick {
                    return point.value as i32 * ENVELOPE_FRACTION;
                }
                let t = (tick.saturating_sub(prev.tick)) as i32;
                let d = (point.tick - prev.tick) as i32;
                let a = prev.value as i32 * ENVELOPE_FRACTION;
                let b = point.value as i32 * ENVELOPE_FRACTION;
                return a + (b - a) * t / d;
            }
            prev = point;
        }

        // Past the last point
        prev.value as i32 * ENVELOPE_FRACTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_interpolation() {
        let mut env = Envelope::new();
        env.add_point(0, 64);
        env.add_point(100, 0);

        assert_eq!(env.value_at(0), 64 * ENVELOPE_FRACTION);
        assert_eq!(env.value_at(50), 32 * ENVELOPE_FRACTION);
        assert_eq!(env.value_at(100), 0);
        assert_eq!(env.value_at(200), 0); // Past end
    }

    #[test]
    fn envelope_fraction_keeps_sub_step_precision() {
        let mut env = Envelope::new();
        env.add_point(0, 0);
        env.add_point(3, 1);
        assert_eq!(env.value_at(1), ENVELOPE_FRACTION / 3);
    }

    #[test]
    fn empty_envelope_is_zero() {
        let env = Envelope::new();
        assert_eq!(env.value_at(10), 0);
        assert_eq!(env.tick_of(3), 0);
    }

    #[test]
    fn default_keyboard_is_identity() {
        let mut inst = Instrument::new("lead");
        inst.set_single_sample(2);
        let key = inst.key(61).unwrap();
        assert_eq!(key, KeyMapping { sample: 2, note: 61 });
        assert!(inst.key(200).is_none());
    }

    #[test]
    fn equal_temperament_octave_doubles() {
        let t = Tuning::equal_temperament("12-TET", 12);
        assert!((t.ratio(60) - 1.0).abs() < 1e-6);
        assert!((t.ratio(72) - 2.0).abs() < 1e-5);
        assert_eq!(t.ratio(250), 1.0);
    }
}
