//! Random draws for combat, weather, and AI.
//!
//! Every random decision in a battle goes through the [`Dice`] trait so that
//! a battle can be replayed from its seed and tests can script exact
//! outcomes.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform draws.
pub trait Dice {
    /// Draws a uniform value in `[0, 1)`.
    fn roll(&mut self) -> f64;

    /// Returns `true` with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.roll() < p
    }

    /// Draws an integer in `[lo, hi]`.
    fn range(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        let width = i64::from(hi) - i64::from(lo);
        #[allow(clippy::cast_precision_loss)]
        let span = (width + 1) as f64;
        #[allow(clippy::cast_possible_truncation)]
        let offset = ((self.roll() * span).floor() as i64).min(width);
        i32::try_from(i64::from(lo) + offset).unwrap_or(hi)
    }
}

/// Seeded production dice.
///
/// Uses `ChaCha8Rng` so a given seed produces the same sequence on every
/// platform.
#[derive(Debug, Clone)]
pub struct BattleRng {
    rng: ChaCha8Rng,
}

impl BattleRng {
    /// Creates dice from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Shuffles a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

impl Dice for BattleRng {
    fn roll(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Dice that replay a fixed sequence of draws.
///
/// Once the script runs out every further draw returns `fallback`.
///
/// # Example
///
/// ```
/// use broadside_core::dice::{Dice, ScriptedDice};
///
/// let mut dice = ScriptedDice::new([0.1, 0.9]);
/// assert!(dice.chance(0.5));
/// assert!(!dice.chance(0.5));
/// assert!((dice.roll() - 0.5).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    script: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedDice {
    /// Creates dice that replay `script` then return 0.5 forever.
    pub fn new(script: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: 0.5,
        }
    }

    /// Dice that always return `value`.
    #[must_use]
    pub fn constant(value: f64) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: value,
        }
    }

    /// Sets the value returned once the script is used up.
    #[must_use]
    pub fn with_fallback(mut self, value: f64) -> Self {
        self.fallback = value;
        self
    }

    /// Draws not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Dice for ScriptedDice {
    fn roll(&mut self) -> f64 {
        self.script.pop_front().unwrap_or(self.fallback)
    }
}
