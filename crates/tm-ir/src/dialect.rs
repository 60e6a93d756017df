//! Playback dialect: the compatibility switches that differ between tracker
//! families.
//!
//! | switch                           | MOD | S3M | XM  | IT  |
//! |----------------------------------|-----|-----|-----|-----|
//! | `linear_slides`                  |  -  |  -  |  x  |  x  |
//! | `vibrato_resets_on_new_note`     |  x  |  x  |  x  |  -  |
//! | `vibrato_on_first_tick`          |  -  |  -  |  -  |  x  |
//! | `old_effects`                    |  x  |  x  |  x  |  -  |
//! | `tremor_counts_ticks_plus_one`   |  -  |  -  |  x  |  -  |
//! | `tremor_zero_is_one`             |  -  |  x  |  -  |  x  |
//! | `ft2_arpeggio`                   |  -  |  -  |  x  |  -  |
//! | `ft2_envelope_sustain`           |  -  |  -  |  x  |  -  |
//! | `key_off_without_envelope_cuts`  |  -  |  -  |  x  |  -  |
//! | `fade_without_volume_envelope`   |  -  |  -  |  -  |  x  |
//! | `global_pattern_loop`            |  -  |  x  |  -  |  -  |
//! | `pattern_delay_repeats_first_tick` | - |  -  |  -  |  x  |
//! | `it_auto_vibrato_sweep`          |  -  |  -  |  -  |  x  |
//! | `new_note_actions`               |  -  |  -  |  -  |  x  |
//! | `instrument_without_note_resets_volume` | x | x | x | - |
//! | `fine_lfo_tables`                |  -  |  -  |  -  |  x  |

/// Compatibility switches consulted by the effect processor and sequencer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackDialect {
    /// Slides and vibrato work in frequency space rather than Amiga periods.
    pub linear_slides: bool,
    /// Vibrato and tremolo phase restart on every new note (unless the
    /// waveform's no-retrigger bit is set).
    pub vibrato_resets_on_new_note: bool,
    /// Vibrato advances its phase on tick 0 too.
    pub vibrato_on_first_tick: bool,
    /// Vibrato depth is doubled and slides use the old parameter memory.
    pub old_effects: bool,
    /// Tremor phases last `on + 1` and `off + 1` ticks.
    pub tremor_counts_ticks_plus_one: bool,
    /// A zero tremor phase length counts as one tick.
    pub tremor_zero_is_one: bool,
    /// Arpeggio steps count down from the row length instead of up from tick 0.
    pub ft2_arpeggio: bool,
    /// The volume envelope holds on its sustain point, and the envelope loop
    /// is checked before sustain.
    pub ft2_envelope_sustain: bool,
    /// Key-off on an instrument without a volume envelope silences the note.
    pub key_off_without_envelope_cuts: bool,
    /// Key-off on an instrument without a volume envelope starts the fade-out.
    pub fade_without_volume_envelope: bool,
    /// Pattern loop state is shared by all channels.
    pub global_pattern_loop: bool,
    /// Tick-0 effects run again on every repetition of a delayed row.
    pub pattern_delay_repeats_first_tick: bool,
    /// Auto-vibrato sweep is a depth increment per tick instead of a tick count.
    pub it_auto_vibrato_sweep: bool,
    /// New notes push the previous note into a background voice.
    pub new_note_actions: bool,
    /// An instrument number without a note resets the note volume.
    pub instrument_without_note_resets_volume: bool,
    /// LFOs read a 256-step sine instead of the 64-step one.
    pub fine_lfo_tables: bool,
}

impl PlaybackDialect {
    pub const fn protracker() -> Self {
        Self {
            linear_slides: false,
            vibrato_resets_on_new_note: true,
            vibrato_on_first_tick: false,
            old_effects: true,
            tremor_counts_ticks_plus_one: false,
            tremor_zero_is_one: false,
            ft2_arpeggio: false,
            ft2_envelope_sustain: false,
            key_off_without_envelope_cuts: false,
            fade_without_volume_envelope: false,
            global_pattern_loop: false,
            pattern_delay_repeats_first_tick: false,
            it_auto_vibrato_sweep: false,
            new_note_actions: false,
            instrument_without_note_resets_volume: true,
            fine_lfo_tables: false,
        }
    }

    pub const fn screamtracker3() -> Self {
        Self {
            tremor_zero_is_one: true,
            global_pattern_loop: true,
            ..Self::protracker()
        }
    }

    pub const fn fasttracker2() -> Self {
        Self {
            linear_slides: true,
            tremor_counts_ticks_plus_one: true,
            ft2_arpeggio: true,
            ft2_envelope_sustain: true,
            key_off_without_envelope_cuts: true,
            ..Self::protracker()
        }
    }

    pub const fn impulse_tracker() -> Self {
        Self {
            linear_slides: true,
            vibrato_resets_on_new_note: false,
            vibrato_on_first_tick: true,
            old_effects: false,
            tremor_counts_ticks_plus_one: false,
            tremor_zero_is_one: true,
            ft2_arpeggio: false,
            ft2_envelope_sustain: false,
            key_off_without_envelope_cuts: false,
            fade_without_volume_envelope: true,
            global_pattern_loop: false,
            pattern_delay_repeats_first_tick: true,
            it_auto_vibrato_sweep: true,
            new_note_actions: true,
            instrument_without_note_resets_volume: false,
            fine_lfo_tables: true,
        }
    }
}

impl Default for PlaybackDialect {
    fn default() -> Self {
        Self::impulse_tracker()
    }
}
