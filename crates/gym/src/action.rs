//! Action spaces: how an integer action index becomes controller input.

use nes::Buttons;
use serde::{Deserialize, Serialize};

use crate::GymError;

/// Button combinations of the discrete action space, as
/// `[up, left, down, right, a, b]`.
pub const DISCRETE_ACTIONS: [[u8; 6]; 14] = [
    [0, 0, 0, 0, 0, 0],
    [1, 0, 0, 0, 0, 0],
    [0, 0, 1, 0, 0, 0],
    [0, 1, 0, 0, 0, 0],
    [0, 1, 0, 0, 1, 0],
    [0, 1, 0, 0, 0, 1],
    [0, 1, 0, 0, 1, 1],
    [0, 0, 0, 1, 0, 0],
    [0, 0, 0, 1, 1, 0],
    [0, 0, 0, 1, 0, 1],
    [0, 0, 0, 1, 1, 1],
    [0, 0, 0, 0, 1, 0],
    [0, 0, 0, 0, 0, 1],
    [0, 0, 0, 0, 1, 1],
];

pub const DISCRETE_ACTION_NAMES: [&str; 14] = [
    "NOOP",
    "Up",
    "Down",
    "Left",
    "Left+A",
    "Left+B",
    "Left+A+B",
    "Right",
    "Right+A",
    "Right+B",
    "Right+A+B",
    "A",
    "B",
    "A+B",
];

const BUTTON_COUNT: u32 = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSpace {
    /// One of the 14 combinations in [`DISCRETE_ACTIONS`].
    #[default]
    Discrete,
    /// Any subset of the six buttons, as a bit mask (bit 0 = up … bit 5 = b).
    MultiDiscrete,
}

impl ActionSpace {
    /// Number of valid action indices; valid indices are `0..len`.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            ActionSpace::Discrete => DISCRETE_ACTIONS.len(),
            ActionSpace::MultiDiscrete => 1 << BUTTON_COUNT,
        }
    }

    /// Maps an action index to the buttons it holds down.
    ///
    /// # Errors
    /// [`GymError::InvalidAction`] when `action` is negative or `>= len()`.
    pub fn decode(self, action: i64) -> Result<Buttons, GymError> {
        let count = self.len();
        let index = usize::try_from(action)
            .ok()
            .filter(|i| *i < count)
            .ok_or(GymError::InvalidAction { action, count })?;
        Ok(match self {
            ActionSpace::Discrete => Buttons::from_array(DISCRETE_ACTIONS[index]),
            ActionSpace::MultiDiscrete => Buttons::from_mask(u8::try_from(index).unwrap_or_default()),
        })
    }

    /// Human-readable label for logs.
    #[must_use]
    pub fn describe(self, action: i64) -> String {
        match (self, usize::try_from(action)) {
            (ActionSpace::Discrete, Ok(i)) if i < DISCRETE_ACTION_NAMES.len() => DISCRETE_ACTION_NAMES[i].to_string(),
            (ActionSpace::MultiDiscrete, Ok(i)) if i < self.len() => format!("mask {i:06b}"),
            _ => format!("invalid({action})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_table_matches_names() {
        let right_a = ActionSpace::Discrete.decode(8).unwrap();
        assert!(right_a.right && right_a.a && !right_a.b);
        assert!(ActionSpace::Discrete.decode(0).unwrap().is_idle());
        assert_eq!(ActionSpace::Discrete.describe(10), "Right+A+B");
    }

    #[test]
    fn boundaries_are_rejected() {
        for space in [ActionSpace::Discrete, ActionSpace::MultiDiscrete] {
            let max = i64::try_from(space.len()).unwrap() - 1;
            assert!(space.decode(0).is_ok());
            assert!(space.decode(max).is_ok());
            assert!(matches!(space.decode(-1), Err(GymError::InvalidAction { action: -1, .. })));
            assert!(matches!(space.decode(max + 1), Err(GymError::InvalidAction { .. })));
        }
    }

    #[test]
    fn multi_discrete_is_a_button_mask() {
        let buttons = ActionSpace::MultiDiscrete.decode(0b10_1000).unwrap();
        assert!(buttons.right && buttons.b);
        assert!(!buttons.a && !buttons.up);
        assert_eq!(ActionSpace::MultiDiscrete.len(), 64);
    }
}
