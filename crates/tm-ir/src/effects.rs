//! Effect command types for tracker patterns.
//!
//! Slide parameters that pack two nibbles keep the raw byte (`xy`); their
//! nibble meaning is fixed per command and documented on the variant.

use crate::instrument::{NewNoteAction, NoteAction};

/// Volume column command (XM/IT style).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VolumeCommand {
    #[default]
    None,
    /// Set volume (0-64)
    Volume(u8),
    /// Set panning (0-64, 32 = center)
    Panning(u8),
    VolumeSlideUp(u8),
    VolumeSlideDown(u8),
    FineVolumeUp(u8),
    FineVolumeDown(u8),
    PortaUp(u8),
    PortaDown(u8),
    TonePorta(u8),
    VibratoSpeed(u8),
    VibratoDepth(u8),
    PanSlideLeft(u8),
    PanSlideRight(u8),
}

/// Effect column command.
///
/// This enum covers the effect sets of the MOD, S3M, XM and IT families.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Effect {
    #[default]
    None,

    // === Arpeggio & Portamento ===
    /// Cycle between note, note+x, note+y each tick
    Arpeggio { x: u8, y: u8 },
    PortaUp(u8),
    PortaDown(u8),
    /// Fine porta up (once per row)
    FinePortaUp(u8),
    /// Fine porta down (once per row)
    FinePortaDown(u8),
    ExtraFinePortaUp(u8),
    ExtraFinePortaDown(u8),
    /// Slide toward the row's note
    TonePorta(u8),
    Vibrato { speed: u8, depth: u8 },
    /// Vibrato at a quarter of the depth
    FineVibrato { speed: u8, depth: u8 },
    /// Continue tone portamento, volume slide `xy`
    TonePortaVolSlide(u8),
    /// Continue vibrato, volume slide `xy`
    VibratoVolSlide(u8),

    // === Volume & panning ===
    Tremolo { speed: u8, depth: u8 },
    /// Audible for `on` ticks, silent for `off` ticks
    Tremor { on: u8, off: u8 },
    Panbrello { speed: u8, depth: u8 },
    /// Set channel panning (0-255)
    SetPan(u8),
    /// `x0` slides right, `0y` slides left, `Fy`/`xF` are fine slides
    PanningSlide(u8),
    /// Start the sample at `n * 256` frames
    SampleOffset(u16),
    /// `x0` slides up, `0y` slides down, `Fy`/`xF` are fine slides
    VolumeSlide(u8),
    FineVolumeSlideUp(u8),
    FineVolumeSlideDown(u8),
    /// Set note volume (0-64)
    SetVolume(u8),
    /// Set channel volume (0-64)
    ChannelVolume(u8),
    /// Channel volume slide, same nibble layout as `VolumeSlide`
    ChannelVolumeSlide(u8),
    /// Set global volume (0-128)
    SetGlobalVolume(u8),
    /// Global volume slide, same nibble layout as `VolumeSlide`
    GlobalVolumeSlide(u8),
    SetSurround(bool),

    // === Navigation ===
    /// Jump to order position
    PositionJump(u8),
    /// Break to row in next pattern
    PatternBreak(u8),
    /// 0 = set loop start, n = loop n times
    PatternLoop(u8),
    /// Repeat the row n more times
    PatternDelay(u8),
    /// Add n ticks to the row
    FinePatternDelay(u8),

    // === Speed & Tempo ===
    /// Set ticks per row
    SetSpeed(u8),
    /// Set tempo (32-255)
    SetTempo(u8),
    TempoSlideDown(u8),
    TempoSlideUp(u8),

    // === Triggers ===
    /// Retrigger every `interval` ticks, `volume_change` selects the IT table entry (0-15)
    Retrigger { interval: u8, volume_change: u8 },
    /// Cut note after n ticks
    NoteCut(u8),
    /// Delay note by n ticks
    NoteDelay(u8),
    /// Release the key after n ticks
    KeyOff(u8),

    // === Instrument control ===
    SetEnvelopePosition(u8),
    /// 0=sine, 1=ramp down, 2=square, 3=random; +4 keeps the phase on new notes
    SetVibratoWaveform(u8),
    SetTremoloWaveform(u8),
    SetPanbrelloWaveform(u8),
    /// Finetune in 1/8 semitone (-8 to +7)
    SetFinetune(i8),
    /// Apply an action to this channel's background voices
    PastNoteAction(NoteAction),
    /// Override the instrument's new note action
    SetNewNoteAction(NewNoteAction),
    VolumeEnvelope(bool),
    PanningEnvelope(bool),
    PitchEnvelope(bool),
    /// Resonant filter cutoff (0-127)
    SetFilterCutoff(u8),
    /// Resonant filter resonance (0-127)
    SetFilterResonance(u8),
}

impl Effect {
    /// Returns true if this effect is processed only on tick 0.
    pub fn is_row_effect(&self) -> bool {
        matches!(
            self,
            Effect::PositionJump(_)
                | Effect::PatternBreak(_)
                | Effect::PatternLoop(_)
                | Effect::PatternDelay(_)
                | Effect::FinePatternDelay(_)
                | Effect::SetSpeed(_)
                | Effect::SetTempo(_)
                | Effect::SetVolume(_)
                | Effect::SetPan(_)
                | Effect::SampleOffset(_)
                | Effect::ChannelVolume(_)
                | Effect::SetGlobalVolume(_)
                | Effect::FinePortaUp(_)
                | Effect::FinePortaDown(_)
                | Effect::ExtraFinePortaUp(_)
                | Effect::ExtraFinePortaDown(_)
                | Effect::FineVolumeSlideUp(_)
                | Effect::FineVolumeSlideDown(_)
                | Effect::SetVibratoWaveform(_)
                | Effect::SetTremoloWaveform(_)
                | Effect::SetPanbrelloWaveform(_)
                | Effect::SetFinetune(_)
                | Effect::SetSurround(_)
                | Effect::SetEnvelopePosition(_)
                | Effect::PastNoteAction(_)
                | Effect::SetNewNoteAction(_)
                | Effect::VolumeEnvelope(_)
                | Effect::PanningEnvelope(_)
                | Effect::PitchEnvelope(_)
                | Effect::SetFilterCutoff(_)
                | Effect::SetFilterResonance(_)
        )
    }

    /// Returns true if the effect slides toward the row's note instead of
    /// retriggering it.
    pub fn is_tone_porta(&self) -> bool {
        matches!(self, Effect::TonePorta(_) | Effect::TonePortaVolSlide(_))
    }
}

/// Split a packed `xy` parameter into its nibbles.
pub const fn nibbles(param: u8) -> (u8, u8) {
    (param >> 4, param & 0x0F)
}
