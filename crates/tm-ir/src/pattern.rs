//! Pattern and cell types for tracker sequences.

use alloc::vec::Vec;
use crate::effects::{Effect, VolumeCommand};

/// Number of playable notes (C-0 to B-9).
pub const NOTE_COUNT: u8 = 120;

/// C-5, the note that plays a sample at its `c5_speed`.
pub const NOTE_MIDDLE_C: u8 = 60;

/// A note value in a pattern cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    /// No note
    #[default]
    None,
    /// Note on (0-119, where 60 = C-5)
    On(u8),
    /// Key release
    Off,
    /// Stop the voice immediately
    Cut,
    /// Start the instrument fade-out
    Fade,
}

impl Note {
    /// Create a note from octave (0-9) and semitone (0-11).
    pub const fn from_octave_semitone(octave: u8, semitone: u8) -> Self {
        Note::On(octave * 12 + semitone)
    }

    /// Get the octave (0-9) if this is a note on.
    pub const fn octave(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n / 12),
            _ => None,
        }
    }

    /// Get the semitone (0-11) if this is a note on.
    pub const fn semitone(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n % 12),
            _ => None,
        }
    }
}

/// A single cell in a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub note: Note,
    /// Instrument number (0 = none, 1-255 = instrument index + 1)
    pub instrument: u8,
    /// Volume column command
    pub volume: VolumeCommand,
    /// Effect column command and its parameter
    pub effect: Effect,
}

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            note: Note::None,
            instrument: 0,
            volume: VolumeCommand::None,
            effect: Effect::None,
        }
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        self.note == Note::None
            && self.instrument == 0
            && self.volume == VolumeCommand::None
            && self.effect == Effect::None
    }
}

static EMPTY_CELL: Cell = Cell::empty();

/// A pattern containing rows of cells across channels.
#[derive(Clone, Debug)]
pub struct Pattern {
    /// Number of rows (1-1024)
    pub rows: u16,
    /// Number of channels
    pub channels: u8,
    /// Pattern data, stored row-major: data[row * channels + channel]
    pub data: Vec<Cell>,
}

impl Pattern {
    /// Create a new pattern with empty cells.
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            rows,
            channels,
            data: alloc::vec![Cell::empty(); rows as usize * channels as usize],
        }
    }

    /// Get a cell. Out-of-range coordinates read as an empty cell.
    pub fn cell(&self, row: u16, channel: u8) -> &Cell {
        if row >= self.rows || channel >= self.channels {
            return &EMPTY_CELL;
        }
        self.data
            .get(row as usize * self.channels as usize + channel as usize)
            .unwrap_or(&EMPTY_CELL)
    }

    /// Get a mutable reference to a cell, if it exists.
    pub fn cell_mut(&mut self, row: u16, channel: u8) -> Option<&mut Cell> {
        if row >= self.rows || channel >= self.channels {
            return None;
        }
        self.data
            .get_mut(row as usize * self.channels as usize + channel as usize)
    }

    /// All cells in a row (empty slice for a row past the end).
    pub fn row(&self, row: u16) -> &[Cell] {
        let start = row as usize * self.channels as usize;
        self.data
            .get(start..start + self.channels as usize)
            .unwrap_or(&[])
    }

    /// True when the cell storage matches `rows * channels`.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.rows as usize * self.channels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_octave_semitone() {
        let c5 = Note::from_octave_semitone(5, 0);
        assert_eq!(c5, Note::On(NOTE_MIDDLE_C));
        assert_eq!(c5.octave(), Some(5));
        assert_eq!(c5.semitone(), Some(0));

        let a4 = Note::from_octave_semitone(4, 9);
        assert_eq!(a4, Note::On(57));
        assert_eq!(Note::Off.octave(), None);
    }

    #[test]
    fn pattern_cell_access() {
        let mut pattern = Pattern::new(64, 4);
        pattern.cell_mut(10, 2).unwrap().note = Note::On(60);

        assert_eq!(pattern.cell(10, 2).note, Note::On(60));
        assert_eq!(pattern.cell(10, 1).note, Note::None);
    }

    #[test]
    fn out_of_range_reads_are_empty() {
        let mut pattern = Pattern::new(4, 2);
        assert!(pattern.cell(4, 0).is_empty());
        assert!(pattern.cell(0, 2).is_empty());
        assert!(pattern.cell_mut(9, 9).is_none());
        assert!(pattern.row(10).is_empty());
        assert_eq!(pattern.row(3).len(), 2);
    }

    #[test]
    fn truncated_storage_is_detected() {
        let mut pattern = Pattern::new(4, 2);
        pattern.data.truncate(5);
        assert!(!pattern.is_consistent());
        assert!(pattern.cell(3, 1).is_empty());
    }
}
