//! Effect processing: turns pattern cells into voice state, one tick at a time.
//!
//! Row effects run on the first tick of a row, continuous effects on the
//! ticks after it. Every tick ends with [`EffectProcessor::update_voices`],
//! which folds the tick's modulation into each voice's final volume, pan,
//! increment and filter.

mod commands;
mod modulation;
mod note;

use rand_pcg::Pcg32;
use tm_ir::{Cell, Effect, Song};

use crate::channel::{ChannelState, TickDeltas};
use crate::sequencer::{Advance, PlayState};
use crate::settings::MixerSettings;
use crate::voice_pool::VoicePool;

/// Borrowed view of everything an effect may touch.
pub struct EffectProcessor<'a> {
    pub song: &'a Song,
    pub play: &'a mut PlayState,
    pub voices: &'a mut VoicePool,
    pub rng: &'a mut Pcg32,
    pub settings: &'a MixerSettings,
}

impl<'a> EffectProcessor<'a> {
    /// Apply the current row's cells for the tick `advance` produced.
    pub fn process_tick(&mut self, advance: Advance) {
        for voice in self.voices.voices_mut() {
            voice.tick = TickDeltas::default();
        }
        let Some(pattern) = self.song.patterns.get(self.play.pattern) else {
            return;
        };
        let row = self.play.row;
        let repeat_row_effects = self.song.dialect.pattern_delay_repeats_first_tick;

        for ch in 0..self.voices.channels() {
            let cell = *pattern.cell(row, ch as u8);
            match advance {
                Advance::Row => self.process_row(ch, &cell),
                Advance::RowRepeat if repeat_row_effects => self.row_effect(ch, cell.effect, false),
                Advance::RowRepeat | Advance::Tick => self.process_continuous(ch, &cell),
                Advance::Ended => {}
            }
        }
    }

    /// Tick 0: notes, then the volume column, then the effect column.
    fn process_row(&mut self, ch: usize, cell: &Cell) {
        let voice = self.voice(ch);
        voice.note_cut_tick = None;
        voice.key_off_tick = None;
        voice.note_delay_tick = None;

        match cell.effect {
            Effect::NoteDelay(delay) if delay > 0 => {
                self.voice(ch).note_delay_tick = Some(delay);
            }
            _ => {
                self.trigger_cell(ch, cell);
                self.volume_row(ch, cell.volume);
            }
        }
        self.row_effect(ch, cell.effect, true);
    }

    /// Ticks after the first: scheduled events, then continuous effects.
    fn process_continuous(&mut self, ch: usize, cell: &Cell) {
        let tick = self.play.row_tick();
        let voice = self.voice(ch);
        let due = |at: Option<u8>| at.is_some_and(|t| t as u32 == tick);
        let (delay, cut, off) = (due(voice.note_delay_tick), due(voice.note_cut_tick), due(voice.key_off_tick));

        if delay {
            self.trigger_cell(ch, cell);
            self.volume_row(ch, cell.volume);
        }
        if cut {
            self.voice(ch).volume = 0;
        }
        if off {
            self.key_off(ch);
        }
        self.volume_tick(ch, cell.volume);
        self.tick_effect(ch, cell.effect);
    }

    fn voice(&mut self, id: usize) -> &mut ChannelState {
        &mut self.voices.voices_mut()[id]
    }
}
