//! Per-voice playback state.
//!
//! The same struct serves pattern channels and the background voices that
//! new note actions leave behind.

use tm_ir::{FilterMode, LoopSlot, NewNoteAction, Sample};

use crate::envelope_state::EnvelopeState;
use crate::filter::{FilterCoefs, FilterState, FILTER_MAX};
use crate::fixed::SamplePosition;
use crate::ramp::VolumeRamp;
use crate::waveform::{Waveform, LFO_STEPS};

/// Full note volume in the 0..=256 "calc volume" scale.
pub const VOLUME_MAX: i32 = 256;

/// Full fade-out volume.
pub const FADE_MAX: i32 = 65536;

/// Center of the 0..=256 pan scale.
pub const PAN_CENTER: i32 = 128;
pub const PAN_MAX: i32 = 256;

/// An oscillator driven by vibrato, tremolo or panbrello.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lfo {
    pub waveform: Waveform,
    /// Keep the phase when a new note triggers
    pub keep_phase: bool,
    /// Phase, `LFO_STEPS` per cycle
    pub position: u32,
    pub speed: u8,
    pub depth: u8,
}

impl Lfo {
    pub fn advance(&mut self) {
        self.position = (self.position + self.speed as u32 * 4) & (LFO_STEPS - 1);
    }

    pub fn retrigger(&mut self) {
        if !self.keep_phase {
            self.position = 0;
        }
    }
}

/// Parameters remembered for effects whose zero parameter means "again".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EffectMemory {
    /// Shared porta memory when the old effect rules apply
    pub porta: u8,
    pub porta_up: u8,
    pub porta_down: u8,
    pub fine_porta_up: u8,
    pub fine_porta_down: u8,
    pub tone_porta: u8,
    pub volume_slide: u8,
    pub channel_volume_slide: u8,
    pub global_volume_slide: u8,
    pub panning_slide: u8,
    pub sample_offset: u16,
    pub arpeggio: (u8, u8),
    pub tremor: (u8, u8),
    pub retrigger: (u8, u8),
    pub tempo_slide: u8,
}

/// Modulation collected while processing one tick. Cleared every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickDeltas {
    /// Added to the calc volume (tremolo)
    pub volume: i32,
    /// Added to the pan (panbrello)
    pub pan: i32,
    /// Pitch offset in 1/768 octave (arpeggio, linear vibrato)
    pub pitch_units: i32,
    /// Amiga period offset (vibrato in period mode)
    pub period: i32,
    /// Tremor off phase
    pub silenced: bool,
}

/// Mixer-side state of a voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MixState {
    pub ramp: VolumeRamp,
    pub filter: FilterState,
    /// Decaying offset left by a sample that ended, in the mix domain
    pub tail: [i32; 2],
    /// Last value this voice added to the mix
    pub last: [i32; 2],
}

impl MixState {
    /// Start a fresh note: silent ramp, clean filter. A running tail keeps
    /// decaying.
    pub fn restart(&mut self) {
        self.ramp.snap([0, 0]);
        self.filter.reset();
        self.last = [0, 0];
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelState {
    /// A sample is playing
    pub active: bool,
    /// Sample index into the song
    pub sample: Option<usize>,
    /// Instrument index into the song
    pub instrument: Option<usize>,
    /// Note after keyboard mapping, used for pitch
    pub note: u8,
    /// Note as written in the pattern
    pub pattern_note: u8,

    /// Background voice left by a new note action
    pub is_background: bool,
    /// Pattern channel that owns this voice
    pub master_channel: usize,
    /// Fading to silence; freed once the ramp reaches zero
    pub fast_cut: bool,

    /// Position in frames, 48.16
    pub position: SamplePosition,
    /// Signed 16.16 step per output frame; negative plays backwards
    pub increment: i32,
    /// Sample loop dropped for the rest of the note: too short for the
    /// increment it was reached at
    pub loop_cleared: bool,

    /// Amiga period, or frequency in Hz with linear slides
    pub period: i32,
    /// Tone portamento destination in the same unit as `period`
    pub porta_target: i32,
    pub c5_speed: u32,
    /// Finetune in 1/8 semitone
    pub finetune: i8,

    /// Note volume, 0..=256
    pub volume: i32,
    /// Channel volume, 0..=64
    pub channel_volume: i32,
    /// Pan, 0..=256
    pub pan: i32,
    pub surround: bool,
    pub muted: bool,
    /// Instrument fade-out volume, 0..=65536
    pub fade_volume: i32,
    pub fading: bool,
    pub key_released: bool,

    pub volume_env: EnvelopeState,
    pub pan_env: EnvelopeState,
    pub pitch_env: EnvelopeState,

    /// Auto-vibrato phase, 256 steps per cycle
    pub auto_vibrato_position: u32,
    /// Auto-vibrato depth build-up, depth << 8 at full strength
    pub auto_vibrato_depth: i32,
    pub auto_vibrato_ticks: u32,

    pub vibrato: Lfo,
    pub fine_vibrato: bool,
    pub tremolo: Lfo,
    pub panbrello: Lfo,
    pub memory: EffectMemory,

    pub tremor_count: u8,
    pub tremor_off: bool,
    pub retrigger_count: u8,
    /// Row-relative tick of a pending note cut
    pub note_cut_tick: Option<u8>,
    /// Row-relative tick of a pending key release
    pub key_off_tick: Option<u8>,
    /// Row-relative tick of a delayed note
    pub note_delay_tick: Option<u8>,

    pub pattern_loop_row: u16,
    pub pattern_loop_count: u8,

    /// Random volume offset fixed for the note, calc volume units
    pub volume_swing: i32,
    /// Random pan offset fixed for the note
    pub pan_swing: i32,

    pub new_note_action: NewNoteAction,
    pub filter_cutoff: u8,
    pub filter_resonance: u8,
    pub filter_mode: FilterMode,

    pub tick: TickDeltas,

    /// Volume after every stage, 0..=4096
    pub real_volume: i32,
    /// Pan after every stage, 0..=256
    pub real_pan: i32,
    pub filter_coefs: Option<FilterCoefs>,

    pub mix: MixState,
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            volume: VOLUME_MAX,
            channel_volume: 64,
            pan: PAN_CENTER,
            fade_volume: FADE_MAX,
            real_pan: PAN_CENTER,
            filter_cutoff: FILTER_MAX,
            ..Default::default()
        }
    }

    /// Initial state of a pattern channel.
    pub fn with_settings(pan: u16, volume: u8, surround: bool, muted: bool) -> Self {
        Self {
            pan: (pan as i32).min(PAN_MAX),
            channel_volume: (volume as i32).min(64),
            surround,
            muted,
            ..Self::new()
        }
    }

    /// Voice holds nothing audible and can be reused.
    pub fn is_free(&self) -> bool {
        !self.active && self.mix.tail == [0, 0] && !self.mix.ramp.is_ramping()
    }

    /// Stop the sample. Returns the voice to the pool if it is a background voice.
    pub fn stop(&mut self) {
        self.active = false;
        self.fast_cut = false;
        self.mix.ramp.snap([0, 0]);
    }

    /// Which sample loop currently applies.
    pub fn loop_slot(&self, sample: &Sample) -> LoopSlot {
        if sample.sustain_loop().is_some() && !self.key_released {
            LoopSlot::Sustain
        } else {
            LoopSlot::Normal
        }
    }

    /// Loudness used to rank voices against the mixing budget.
    pub fn loudness(&self) -> i32 {
        let [l, r] = self.mix.ramp.volume();
        self.real_volume.max(l.abs()).max(r.abs())
    }
}
