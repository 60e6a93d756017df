//! Structural checks on a song.
//!
//! Playback never trusts these to have passed; it degrades to silence or
//! clamped values on the same conditions. The checks exist so callers can
//! report problems once, up front.

use alloc::vec::Vec;
use thiserror::Error;

use crate::song::{OrderEntry, Song};

/// A data problem found in a song.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrityIssue {
    #[error("order {order} references missing pattern {pattern}")]
    MissingPattern { order: usize, pattern: u16 },
    #[error("pattern {pattern} has {found} channels, song has {expected}")]
    ChannelMismatch { pattern: usize, found: u8, expected: usize },
    #[error("pattern {pattern} cell storage does not match its size")]
    PatternStorage { pattern: usize },
    #[error("instrument {instrument} maps note {note} to missing sample {sample}")]
    MissingSample { instrument: usize, note: u8, sample: u16 },
    #[error("restart position {position} is past the order list")]
    RestartPosition { position: u16 },
    #[error("song has no channels")]
    NoChannels,
}

/// Collect every integrity issue in `song`.
pub fn check_integrity(song: &Song) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();

    if song.channels.is_empty() {
        issues.push(IntegrityIssue::NoChannels);
    }

    for (order, entry) in song.order.iter().enumerate() {
        if let OrderEntry::Pattern(p) = *entry {
            if p as usize >= song.patterns.len() {
                issues.push(IntegrityIssue::MissingPattern { order, pattern: p });
            }
        }
    }

    for (i, pattern) in song.patterns.iter().enumerate() {
        if !pattern.is_consistent() {
            issues.push(IntegrityIssue::PatternStorage { pattern: i });
        }
        if pattern.channels as usize != song.channels.len() {
            issues.push(IntegrityIssue::ChannelMismatch {
                pattern: i,
                found: pattern.channels,
                expected: song.channels.len(),
            });
        }
    }

    for (i, inst) in song.instruments.iter().enumerate() {
        // Report each missing sample once per instrument
        let mut reported: Vec<u16> = Vec::new();
        for (note, key) in inst.keyboard.iter().enumerate() {
            if key.sample != 0
                && key.sample as usize > song.samples.len()
                && !reported.contains(&key.sample)
            {
                reported.push(key.sample);
                issues.push(IntegrityIssue::MissingSample {
                    instrument: i,
                    note: note as u8,
                    sample: key.sample,
                });
            }
        }
    }

    if !song.order.is_empty() && song.restart_position as usize >= song.order.len() {
        issues.push(IntegrityIssue::RestartPosition {
            position: song.restart_position,
        });
    }

    issues
}
