//! Runtime evaluator for instrument envelopes.

use tm_ir::Envelope;

/// Playback position within one instrument envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeState {
    /// Current tick within the envelope.
    pub position: u16,
    /// Envelope switched on for this voice.
    pub enabled: bool,
    /// Value captured when the key was released on an envelope with a
    /// release node.
    value_at_release: Option<i32>,
}

impl EnvelopeState {
    /// Restart at the first point. `carry` keeps the position of the
    /// previous note.
    pub fn trigger(&mut self, envelope: Option<&Envelope>, carry: bool) {
        let enabled = envelope.is_some_and(|e| e.enabled && !e.points.is_empty());
        if !(carry && envelope.is_some_and(|e| e.carry) && self.enabled) {
            self.position = 0;
        }
        self.enabled = enabled;
        self.value_at_release = None;
    }

    /// Key released: envelopes with a release node continue from it,
    /// scaled relative to the value they had when released.
    pub fn release(&mut self, envelope: &Envelope) {
        if let Some(node) = envelope.release_node {
            if self.value_at_release.is_none() {
                self.value_at_release = Some(envelope.value_at(self.position));
                self.position = envelope.tick_of(node);
            }
        }
    }

    /// Value at the current position, scaled by `ENVELOPE_FRACTION`.
    pub fn value(&self, envelope: &Envelope) -> i32 {
        let raw = envelope.value_at(self.position);
        match (self.value_at_release, envelope.release_node) {
            (Some(held), Some(node)) => {
                let node_value = envelope.value_of(node);
                if node_value == 0 {
                    raw
                } else {
                    (held as i64 * raw as i64 / node_value as i64) as i32
                }
            }
            _ => raw,
        }
    }

    /// Move one tick forward, honouring sustain and loop ranges.
    ///
    /// With `ft2_sustain` the loop is checked first and the sustain range
    /// holds its start point; otherwise a held sustain loop takes priority
    /// over the normal loop.
    pub fn advance(&mut self, envelope: &Envelope, key_released: bool, ft2_sustain: bool) {
        if envelope.points.is_empty() {
            return;
        }
        let sustain = if key_released { None } else { envelope.sustain };
        let mut next = self.position.saturating_add(1);

        if ft2_sustain {
            if let Some((start, end)) = envelope.loop_range {
                let end_tick = envelope.tick_of(end);
                if next >= end_tick && end_tick > envelope.tick_of(start) {
                    next = envelope.tick_of(start);
                }
            }
            if let Some((point, _)) = sustain {
                let hold = envelope.tick_of(point);
                if self.position == hold {
                    next = hold;
                }
            }
        } else if let Some((start, end)) = sustain.or(envelope.loop_range) {
            if next > envelope.tick_of(end) {
                next = envelope.tick_of(start);
            }
        }

        self.position = next.min(envelope.last_tick());
    }

    /// Reached the last point with nothing left to loop.
    pub fn is_finished(&self, envelope: &Envelope, key_released: bool) -> bool {
        let looping = envelope.loop_range.is_some() || (!key_released && envelope.sustain.is_some());
        !looping && self.position >= envelope.last_tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ir::ENVELOPE_FRACTION;

    fn ramp_envelope() -> Envelope {
        let mut env = Envelope::new();
        env.add_point(0, 0);
        env.add_point(4, 64);
        env.add_point(8, 32);
        env.add_point(12, 0);
        env
    }

    fn run(state: &mut EnvelopeState, env: &Envelope, ticks: usize, released: bool, ft2: bool) -> Vec<u16> {
        (0..ticks)
            .map(|_| {
                state.advance(env, released, ft2);
                state.position
            })
            .collect()
    }

    #[test]
    fn one_shot_stops_at_last_point() {
        let env = ramp_envelope();
        let mut state = EnvelopeState::default();
        state.trigger(Some(&env), false);
        assert!(state.enabled);
        run(&mut state, &env, 20, false, false);
        assert_eq!(state.position, 12);
        assert!(state.is_finished(&env, false));
        assert_eq!(state.value(&env), 0);
    }

    #[test]
    fn loop_wraps_after_end_point() {
        let mut env = ramp_envelope();
        env.loop_range = Some((1, 2));
        let mut state = EnvelopeState { position: 7, enabled: true, ..Default::default() };
        assert_eq!(run(&mut state, &env, 3, false, false), vec![8, 4, 5]);
        assert!(!state.is_finished(&env, false));
    }

    #[test]
    fn ft2_loop_skips_end_point() {
        let mut env = ramp_envelope();
        env.loop_range = Some((1, 2));
        let mut state = EnvelopeState { position: 6, enabled: true, ..Default::default() };
        assert_eq!(run(&mut state, &env, 3, false, true), vec![7, 4, 5]);
    }

    #[test]
    fn sustain_holds_until_release() {
        let mut env = ramp_envelope();
        env.sustain = Some((1, 1));
        let mut state = EnvelopeState { position: 3, enabled: true, ..Default::default() };
        assert_eq!(run(&mut state, &env, 3, false, false), vec![4, 4, 4]);
        assert_eq!(run(&mut state, &env, 2, true, false), vec![5, 6]);

        let mut ft2 = EnvelopeState { position: 3, enabled: true, ..Default::default() };
        assert_eq!(run(&mut ft2, &env, 3, false, true), vec![4, 4, 4]);
    }

    #[test]
    fn release_node_rescales_proportionally() {
        let mut env = ramp_envelope();
        env.release_node = Some(2); // value 32 at tick 8
        env.sustain = Some((1, 1));
        let mut state = EnvelopeState { position: 4, enabled: true, ..Default::default() };
        // Released while holding 64: jumps to the node, scaled by 64 / 32
        state.release(&env);
        assert_eq!(state.position, 8);
        assert_eq!(state.value(&env), 64 * ENVELOPE_FRACTION);
        state.advance(&env, true, false);
        state.advance(&env, true, false);
        // Halfway from 32 to 0, doubled
        assert_eq!(state.value(&env), 32 * ENVELOPE_FRACTION);
    }

    #[test]
    fn carry_keeps_position() {
        let mut env = ramp_envelope();
        env.carry = true;
        let mut state = EnvelopeState::default();
        state.trigger(Some(&env), true);
        state.position = 5;
        state.trigger(Some(&env), true);
        assert_eq!(state.position, 5);
        state.trigger(Some(&env), false);
        assert_eq!(state.position, 0);
    }

    #[test]
    fn disabled_or_missing_envelope() {
        let mut env = ramp_envelope();
        env.enabled = false;
        let mut state = EnvelopeState::default();
        state.trigger(Some(&env), false);
        assert!(!state.enabled);
        state.trigger(None, false);
        assert!(!state.enabled);
    }
}
