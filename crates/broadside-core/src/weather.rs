//! Weather conditions and their effect on gunnery.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dice::Dice;

/// Chance the weather holds from one round to the next.
pub const WEATHER_PERSISTENCE: f64 = 0.7;

/// Sea and sky conditions, ordered mildest to harshest.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    /// No penalty.
    #[default]
    Clear,
    /// Light rain.
    Rainy,
    /// Fog banks.
    Foggy,
    /// Thunderstorm.
    Thunderstorm,
    /// Hurricane.
    Hurricane,
}

impl Weather {
    const ORDER: [Self; 5] = [
        Self::Clear,
        Self::Rainy,
        Self::Foggy,
        Self::Thunderstorm,
        Self::Hurricane,
    ];

    /// Multiplier applied to attack accuracy.
    #[must_use]
    pub const fn accuracy_modifier(self) -> f32 {
        match self {
            Self::Clear => 1.0,
            Self::Rainy => 0.95,
            Self::Foggy => 0.85,
            Self::Thunderstorm => 0.8,
            Self::Hurricane => 0.6,
        }
    }

    fn index(self) -> usize {
        Self::ORDER.iter().position(|w| *w == self).unwrap_or(0)
    }

    /// Rolls next round's weather.
    ///
    /// Holds with [`WEATHER_PERSISTENCE`]; otherwise moves one step milder or
    /// harsher with equal odds, clamped at both ends.
    pub fn transition(self, dice: &mut dyn Dice) -> Self {
        if dice.chance(WEATHER_PERSISTENCE) {
            return self;
        }
        let idx = self.index();
        let next = if dice.chance(0.5) {
            idx.saturating_sub(1)
        } else {
            (idx + 1).min(Self::ORDER.len() - 1)
        };
        Self::ORDER[next]
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear => write!(f, "clear"),
            Self::Rainy => write!(f, "rainy"),
            Self::Foggy => write!(f, "foggy"),
            Self::Thunderstorm => write!(f, "thunderstorm"),
            Self::Hurricane => write!(f, "hurricane"),
        }
    }
}
