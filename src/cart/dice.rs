//! Randomness seam for stock generation.
//!
//! The generator only needs three kinds of draws: a percentile roll, a uniform index,
//! and an inclusive integer range for prices. Production uses [`RandDice`] over a
//! seeded `StdRng`; [`ScriptedDice`] replays fixed draws so a stock can be reproduced.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

pub trait Dice: Send {
    /// Percentile roll in `1..=100`.
    fn d100(&mut self) -> u32;
    /// Uniform index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
    /// Uniform integer in `low..=high`.
    fn between(&mut self, low: u64, high: u64) -> u64;
}

/// [`Dice`] backed by a `rand` generator.
pub struct RandDice<R: Rng + Send> {
    rng: R,
}

impl RandDice<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send> RandDice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Dice for RandDice<R> {
    fn d100(&mut self) -> u32 {
        self.rng.gen_range(1..=100)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    fn between(&mut self, low: u64, high: u64) -> u64 {
        self.rng.gen_range(low..=high)
    }
}

/// Replays queued draws in order. When a queue runs dry the draw falls back to the
/// lowest legal value (roll 1, index 0, `low`).
#[derive(Debug, Default, Clone)]
pub struct ScriptedDice {
    rolls: VecDeque<u32>,
    picks: VecDeque<usize>,
    amounts: VecDeque<u64>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue percentile rolls; the first one consumed by a generator is the band.
    pub fn rolls(mut self, rolls: impl IntoIterator<Item = u32>) -> Self {
        self.rolls.extend(rolls);
        self
    }

    pub fn picks(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.picks.extend(picks);
        self
    }

    pub fn amounts(mut self, amounts: impl IntoIterator<Item = u64>) -> Self {
        self.amounts.extend(amounts);
        self
    }
}

impl Dice for ScriptedDice {
    fn d100(&mut self) -> u32 {
        self.rolls.pop_front().unwrap_or(1).clamp(1, 100)
    }

    fn pick(&mut self, len: usize) -> usize {
        self.picks.pop_front().unwrap_or(0).min(len.saturating_sub(1))
    }

    fn between(&mut self, low: u64, high: u64) -> u64 {
        self.amounts.pop_front().unwrap_or(low).clamp(low, high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rand_dice_stays_in_bounds() {
        let mut dice = RandDice::seeded(7);
        for _ in 0..500 {
            let roll = dice.d100();
            assert!((1..=100).contains(&roll));
            assert!(dice.pick(3) < 3);
            let amount = dice.between(250, 500);
            assert!((250..=500).contains(&amount));
        }
    }

    #[test]
    fn scripted_dice_replays_then_falls_back() {
        let mut dice = ScriptedDice::new().rolls([61, 120]).picks([5]).amounts([9]);
        assert_eq!(dice.d100(), 61);
        assert_eq!(dice.d100(), 100);
        assert_eq!(dice.d100(), 1);
        assert_eq!(dice.pick(2), 1);
        assert_eq!(dice.between(50, 100), 50);
    }
}
