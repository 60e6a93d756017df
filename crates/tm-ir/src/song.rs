//! Song structure and sequencing types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::dialect::PlaybackDialect;
use crate::instrument::Instrument;
use crate::pattern::Pattern;
use crate::sample::Sample;

/// Maximum number of pattern channels.
pub const MAX_PATTERN_CHANNELS: usize = 127;

/// Full global volume.
pub const MAX_GLOBAL_VOLUME: u8 = 128;

/// How tempo is turned into a tick length.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TempoMode {
    /// `rate * 5 / (tempo * 2)` frames per tick (tempo is BPM at 6 ticks/row, 4 rows/beat)
    #[default]
    Classic,
    /// `rate / tempo` frames per tick (tempo is ticks per second)
    Alternative,
    /// Tempo is exact beats per minute regardless of speed
    Modern,
}

/// A complete song.
#[derive(Clone, Debug)]
pub struct Song {
    pub title: ArrayString<32>,
    /// Initial tempo (32-255 typical)
    pub initial_tempo: u16,
    /// Initial speed (ticks per row)
    pub initial_speed: u8,
    /// Initial global volume (0-128)
    pub initial_global_volume: u8,
    /// Rows per beat, used by `TempoMode::Modern`
    pub rows_per_beat: u8,
    /// Order index playback restarts from after the song ends
    pub restart_position: u16,
    pub tempo_mode: TempoMode,
    pub dialect: PlaybackDialect,
    /// Per-channel settings
    pub channels: Vec<ChannelSettings>,
    pub patterns: Vec<Pattern>,
    pub order: Vec<OrderEntry>,
    pub instruments: Vec<Instrument>,
    pub samples: Vec<Sample>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            initial_tempo: 125,
            initial_speed: 6,
            initial_global_volume: MAX_GLOBAL_VOLUME,
            rows_per_beat: 4,
            restart_position: 0,
            tempo_mode: TempoMode::Classic,
            dialect: PlaybackDialect::default(),
            channels: Vec::new(),
            patterns: Vec::new(),
            order: Vec::new(),
            instruments: Vec::new(),
            samples: Vec::new(),
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    /// Create a song with `num_channels` centered channels.
    pub fn with_channels(title: &str, num_channels: u8) -> Self {
        let mut song = Self::new(title);
        let count = (num_channels as usize).min(MAX_PATTERN_CHANNELS);
        song.channels = (0..count).map(|_| ChannelSettings::default()).collect();
        song
    }

    /// Classic Amiga panning: L R R L.
    pub fn with_amiga_panning(mut self) -> Self {
        for (i, ch) in self.channels.iter_mut().enumerate() {
            ch.initial_pan = if i % 4 == 0 || i % 4 == 3 { 64 } else { 192 };
        }
        self
    }

    /// Number of pattern channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Append a pattern sized to the song's channels and queue it in the order list.
    pub fn push_pattern(&mut self, rows: u16) -> &mut Pattern {
        let index = self.patterns.len();
        self.patterns.push(Pattern::new(rows, self.channels.len() as u8));
        self.order.push(OrderEntry::Pattern(index as u16));
        &mut self.patterns[index]
    }

    /// Pattern at an order position, if the entry names a valid pattern.
    pub fn pattern_at_order(&self, order: usize) -> Option<&Pattern> {
        match self.order.get(order)? {
            OrderEntry::Pattern(p) => self.patterns.get(*p as usize),
            _ => None,
        }
    }
}

/// An entry in the order list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEntry {
    /// Play pattern with this index
    Pattern(u16),
    /// Skip marker (+++), continue to next
    Skip,
    /// End of song marker (---)
    End,
}

/// Per-channel settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Initial panning (0-256, 128 = center)
    pub initial_pan: u16,
    /// Initial channel volume (0-64)
    pub initial_volume: u8,
    /// Is the channel muted?
    pub muted: bool,
    pub surround: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            initial_pan: 128,
            initial_volume: 64,
            muted: false,
            surround: false,
        }
    }
}
