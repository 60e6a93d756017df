//! Row and tick sequencing.
//!
//! `PlayState` is advanced one tick at a time. Navigation effects only queue
//! requests (jump, break, loop); they are applied when the row ends.

use alloc::vec;
use alloc::vec::Vec;

use log::debug;
use tm_ir::{OrderEntry, Song, TempoMode, MAX_GLOBAL_VOLUME};

use crate::settings::MixerSettings;

pub const MIN_TEMPO: u32 = 32;
pub const MAX_TEMPO: u32 = 512;
pub const MAX_SPEED: u32 = 255;

/// What a call to [`PlayState::advance`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Entered a new row: tick 0, notes trigger.
    Row,
    /// First tick of a pattern-delay repetition of the current row.
    RowRepeat,
    /// An ordinary tick inside the row.
    Tick,
    /// The song is over.
    Ended,
}

/// Playback position, tempo and song-end bookkeeping.
#[derive(Clone, Debug)]
pub struct PlayState {
    pub order: usize,
    pub pattern: usize,
    pub row: u16,
    /// Ticks elapsed in the row, across pattern-delay repetitions
    pub tick: u32,
    pub speed: u32,
    pub tempo: u32,
    /// Repetitions of the row still to come from a pattern delay
    pub pattern_delay: u32,
    /// Extra ticks per row from a fine pattern delay
    pub frame_delay: u32,
    /// Global volume, 0..=128
    pub global_volume: u32,

    pub samples_per_tick: u32,
    tick_remainder: u32,
    pub frames_left_in_tick: u32,

    pub position_jump: Option<usize>,
    pub pattern_break: Option<u16>,
    /// Row to jump back to for a pattern loop
    pub loop_jump: Option<u16>,
    /// Shared pattern loop state when loops are global
    pub global_loop_row: u16,
    pub global_loop_count: u8,

    /// Bitmap of played rows, one bit per (order, row)
    visited: Vec<u64>,
    /// Bit offset of each order's first row
    visited_offsets: Vec<usize>,

    /// Restarts left at song end, -1 for endless
    pub repeats_left: i32,
    pub ended: bool,
    /// The next advance enters the current row instead of moving on
    starting: bool,
    sample_rate: u32,
}

impl PlayState {
    pub fn new(song: &Song, settings: &MixerSettings) -> Self {
        let mut state = Self {
            order: 0,
            pattern: 0,
            row: 0,
            tick: 0,
            speed: 6,
            tempo: 125,
            pattern_delay: 0,
            frame_delay: 0,
            global_volume: MAX_GLOBAL_VOLUME as u32,
            samples_per_tick: 0,
            tick_remainder: 0,
            frames_left_in_tick: 0,
            position_jump: None,
            pattern_break: None,
            loop_jump: None,
            global_loop_row: 0,
            global_loop_count: 0,
            visited: Vec::new(),
            visited_offsets: Vec::new(),
            repeats_left: settings.repeat_count,
            ended: false,
            starting: true,
            sample_rate: settings.sample_rate,
        };
        state.rebuild_visited(song);
        state.reset(song, settings);
        state
    }

    /// Rewind to the start of the song.
    pub fn reset(&mut self, song: &Song, settings: &MixerSettings) {
        self.order = 0;
        self.pattern = 0;
        self.row = 0;
        self.tick = 0;
        self.speed = (song.initial_speed as u32).clamp(1, MAX_SPEED);
        self.tempo = (song.initial_tempo as u32).clamp(MIN_TEMPO, MAX_TEMPO);
        self.pattern_delay = 0;
        self.frame_delay = 0;
        self.global_volume = (song.initial_global_volume as u32).min(MAX_GLOBAL_VOLUME as u32);
        self.tick_remainder = 0;
        self.frames_left_in_tick = 0;
        self.clear_navigation();
        self.global_loop_row = 0;
        self.global_loop_count = 0;
        self.repeats_left = settings.repeat_count;
        self.ended = false;
        self.starting = true;
        self.sample_rate = settings.sample_rate;
        self.clear_visited();
        self.samples_per_tick = self.tick_length(song);
        self.tick_remainder = 0;
    }

    /// Resize the visited-row bitmap after the order list or pattern sizes changed.
    pub fn rebuild_visited(&mut self, song: &Song) {
        self.visited_offsets.clear();
        let mut bits = 0;
        for order in 0..song.order.len() {
            self.visited_offsets.push(bits);
            bits += song.pattern_at_order(order).map_or(0, |p| p.rows as usize);
        }
        self.visited_offsets.push(bits);
        self.visited = vec![0; bits.div_ceil(64)];
    }

    pub fn clear_visited(&mut self) {
        self.visited.iter_mut().for_each(|w| *w = 0);
    }

    fn visited_bit(&self, order: usize, row: u16) -> Option<usize> {
        let start = *self.visited_offsets.get(order)?;
        let end = *self.visited_offsets.get(order + 1)?;
        let bit = start + row as usize;
        (bit < end).then_some(bit)
    }

    fn is_visited(&self, order: usize, row: u16) -> bool {
        self.visited_bit(order, row)
            .is_some_and(|b| self.visited[b / 64] & (1 << (b % 64)) != 0)
    }

    fn mark_visited(&mut self, order: usize, row: u16, on: bool) {
        if let Some(b) = self.visited_bit(order, row) {
            if on {
                self.visited[b / 64] |= 1 << (b % 64);
            } else {
                self.visited[b / 64] &= !(1 << (b % 64));
            }
        }
    }

    /// Ticks in one repetition of the current row.
    pub fn ticks_per_repetition(&self) -> u32 {
        self.speed + self.frame_delay
    }

    /// Ticks until the row ends, pattern delay included.
    pub fn ticks_on_row(&self) -> u32 {
        self.ticks_per_repetition() * (self.pattern_delay + 1)
    }

    /// Tick relative to the current repetition of the row.
    pub fn row_tick(&self) -> u32 {
        self.tick % self.ticks_per_repetition().max(1)
    }

    /// First tick of a row repetition.
    pub fn is_first_tick(&self) -> bool {
        self.row_tick() == 0
    }

    /// Seek to `order`/`row`; the next advance enters that row.
    pub fn jump_to(&mut self, order: usize, row: u16) {
        self.order = order;
        self.row = row;
        self.tick = 0;
        self.pattern_delay = 0;
        self.frame_delay = 0;
        self.clear_navigation();
        self.ended = false;
        self.starting = true;
        self.frames_left_in_tick = 0;
        self.clear_visited();
    }

    fn clear_navigation(&mut self) {
        self.position_jump = None;
        self.pattern_break = None;
        self.loop_jump = None;
    }

    /// Advance one tick.
    pub fn advance(&mut self, song: &Song) -> Advance {
        if self.ended {
            return Advance::Ended;
        }
        if self.starting {
            self.starting = false;
            return self.enter_row(song);
        }

        self.tick += 1;
        if self.tick < self.ticks_on_row() {
            return if self.is_first_tick() {
                Advance::RowRepeat
            } else {
                Advance::Tick
            };
        }

        self.tick = 0;
        self.pattern_delay = 0;
        self.frame_delay = 0;
        if let Some(row) = self.loop_jump.take() {
            for r in row..=self.row {
                self.mark_visited(self.order, r, false);
            }
            self.row = row;
        } else if self.position_jump.is_some() || self.pattern_break.is_some() {
            self.order = self.position_jump.take().unwrap_or(self.order + 1);
            self.row = self.pattern_break.take().unwrap_or(0);
        } else {
            self.row += 1;
            let rows = song.pattern_at_order(self.order).map_or(0, |p| p.rows);
            if self.row >= rows {
                self.order += 1;
                self.row = 0;
            }
        }
        self.clear_navigation();
        self.enter_row(song)
    }

    /// Resolve the order entry, detect song end and mark the row as played.
    fn enter_row(&mut self, song: &Song) -> Advance {
        let mut restarted = false;
        loop {
            match song.order.get(self.order) {
                Some(OrderEntry::Skip) => {
                    self.order += 1;
                    continue;
                }
                Some(OrderEntry::Pattern(p)) => {
                    let Some(pattern) = song.patterns.get(*p as usize) else {
                        debug!("order {} names missing pattern {}, stopping", self.order, p);
                        return self.finish();
                    };
                    if pattern.rows == 0 {
                        self.order += 1;
                        self.row = 0;
                        continue;
                    }
                    self.pattern = *p as usize;
                    if self.row >= pattern.rows {
                        self.row = 0;
                    }
                }
                Some(OrderEntry::End) | None => {
                    if restarted || !self.consume_repeat() {
                        return self.finish();
                    }
                    restarted = true;
                    debug!("song end, restarting at order {}", song.restart_position);
                    self.order = song.restart_position as usize;
                    self.row = 0;
                    self.clear_visited();
                    continue;
                }
            }

            if self.is_visited(self.order, self.row) {
                if restarted || !self.consume_repeat() {
                    debug!("row {} of order {} played before, song end", self.row, self.order);
                    return self.finish();
                }
                self.clear_visited();
            }
            break;
        }
        self.mark_visited(self.order, self.row, true);
        Advance::Row
    }

    fn consume_repeat(&mut self) -> bool {
        match self.repeats_left {
            0 => false,
            n if n < 0 => true,
            _ => {
                self.repeats_left -= 1;
                true
            }
        }
    }

    fn finish(&mut self) -> Advance {
        self.ended = true;
        Advance::Ended
    }

    /// Frames in the next tick at the current tempo. Carries the division
    /// remainder so long renders don't drift.
    pub fn tick_length(&mut self, song: &Song) -> u32 {
        let rate = self.sample_rate as u64;
        let tempo = self.tempo.max(1) as u64;
        let (num, den) = match song.tempo_mode {
            TempoMode::Classic => (rate * 5, tempo * 2),
            TempoMode::Alternative => (rate, tempo),
            TempoMode::Modern => {
                let rpb = (song.rows_per_beat as u64).max(1);
                (rate * 60, tempo * self.speed.max(1) as u64 * rpb)
            }
        };
        let num = num + self.tick_remainder as u64;
        self.tick_remainder = (num % den) as u32;
        (num / den).max(1) as u32
    }

    /// Start the next tick's frame budget.
    pub fn start_tick(&mut self, song: &Song) {
        self.samples_per_tick = self.tick_length(song);
        self.frames_left_in_tick = self.samples_per_tick;
    }

    pub fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);
    }

    pub fn set_speed(&mut self, speed: u32) {
        if speed > 0 {
            self.speed = speed.min(MAX_SPEED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(patterns: &[u16]) -> Song {
        let mut song = Song::with_channels("seq", 1);
        for &rows in patterns {
            song.push_pattern(rows);
        }
        song
    }

    /// Collect (order, row, tick) for every tick until the song ends.
    fn trace(song: &Song, state: &mut PlayState, limit: usize) -> Vec<(usize, u16, u32)> {
        let mut out = Vec::new();
        for _ in 0..limit {
            if state.advance(song) == Advance::Ended {
                break;
            }
            out.push((state.order, state.row, state.tick));
        }
        out
    }

    #[test]
    fn plays_every_row_then_ends() {
        let song = song(&[4]);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        let ticks = trace(&song, &mut state, 1000);
        assert_eq!(ticks.len(), 24);
        assert_eq!(ticks[0], (0, 0, 0));
        assert_eq!(ticks[6], (0, 1, 0));
        assert_eq!(ticks[23], (0, 3, 5));
        assert!(state.ended);
        assert_eq!(state.advance(&song), Advance::Ended);
    }

    #[test]
    fn classic_tempo_frames_per_tick() {
        let song = song(&[1]);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        assert_eq!(state.tick_length(&song), 882);
        state.set_tempo(150);
        assert_eq!(state.tick_length(&song), 735);
    }

    #[test]
    fn tempo_remainder_is_carried() {
        let song = song(&[1]);
        let settings = MixerSettings::default().with_sample_rate(48000);
        let mut state = PlayState::new(&song, &settings);
        state.set_tempo(137);
        let total: u64 = (0..274).map(|_| state.tick_length(&song) as u64).sum();
        // 240000 / 274 frames per tick, so 274 ticks add up exactly
        assert_eq!(total, 240_000);
    }

    #[test]
    fn modern_tempo_depends_on_speed() {
        let mut song = song(&[1]);
        song.tempo_mode = TempoMode::Modern;
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_tempo(120);
        // 120 BPM, 4 rows per beat, 6 ticks per row
        assert_eq!(state.tick_length(&song), 44100 * 60 / (120 * 6 * 4));
    }

    #[test]
    fn skip_entries_are_passed_over() {
        let mut song = song(&[1, 1]);
        song.order.insert(1, OrderEntry::Skip);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_speed(1);
        let ticks = trace(&song, &mut state, 100);
        assert_eq!(ticks, vec![(0, 0, 0), (2, 0, 0)]);
        assert_eq!(state.pattern, 1);
    }

    #[test]
    fn end_marker_stops_playback() {
        let mut song = song(&[1, 1]);
        song.order.insert(1, OrderEntry::End);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_speed(1);
        assert_eq!(trace(&song, &mut state, 100).len(), 1);
    }

    #[test]
    fn missing_pattern_ends_playback() {
        let mut song = song(&[2]);
        song.order.push(OrderEntry::Pattern(9));
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_speed(1);
        assert_eq!(trace(&song, &mut state, 100).len(), 2);
    }

    #[test]
    fn backward_jump_is_detected_as_song_end() {
        let song = song(&[2]);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_speed(1);
        assert_eq!(state.advance(&song), Advance::Row);
        assert_eq!(state.advance(&song), Advance::Row);
        state.position_jump = Some(0);
        assert_eq!(state.advance(&song), Advance::Ended);
    }

    #[test]
    fn repeat_count_restarts_song() {
        let song = song(&[2]);
        let settings = MixerSettings::default().with_repeat_count(2);
        let mut state = PlayState::new(&song, &settings);
        state.set_speed(1);
        assert_eq!(trace(&song, &mut state, 100).len(), 6);
    }

    #[test]
    fn endless_repeat_keeps_going() {
        let song = song(&[2]);
        let settings = MixerSettings::default().with_repeat_count(-1);
        let mut state = PlayState::new(&song, &settings);
        state.set_speed(1);
        assert_eq!(trace(&song, &mut state, 500).len(), 500);
    }

    #[test]
    fn break_beyond_pattern_clamps_to_zero() {
        let song = song(&[4, 2]);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_speed(1);
        state.advance(&song);
        state.pattern_break = Some(10);
        state.advance(&song);
        assert_eq!((state.order, state.row), (1, 0));
    }

    #[test]
    fn pattern_delay_repeats_row() {
        let song = song(&[2]);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_speed(2);
        assert_eq!(state.advance(&song), Advance::Row);
        state.pattern_delay = 1;
        assert_eq!(state.advance(&song), Advance::Tick);
        assert_eq!(state.advance(&song), Advance::RowRepeat);
        assert_eq!(state.advance(&song), Advance::Tick);
        assert_eq!(state.advance(&song), Advance::Row);
        assert_eq!(state.row, 1);
    }

    #[test]
    fn pattern_loop_replays_rows_without_ending() {
        let song = song(&[3]);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        state.set_speed(1);
        state.advance(&song);
        state.advance(&song);
        state.loop_jump = Some(0);
        assert_eq!(state.advance(&song), Advance::Row);
        assert_eq!(state.row, 0);
        assert_eq!(state.advance(&song), Advance::Row);
        assert_eq!(state.row, 1);
    }

    #[test]
    fn jump_to_rewinds_visited_rows() {
        let song = song(&[2]);
        let mut state = PlayState::new(&song, &MixerSettings::default());
        let _ = trace(&song, &mut state, 100);
        state.jump_to(0, 1);
        assert_eq!(state.advance(&song), Advance::Row);
        assert_eq!(state.row, 1);
    }
}
