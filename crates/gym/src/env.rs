use crate::{GymError, Observation, Session, Step};

/// Reinforcement learning environment trait.
///
/// The classic Gym surface: [`step`] advances the game by one action and
/// returns the new observation, a reward signal and whether the episode has
/// terminated. Agents written against this trait do not care which emulator
/// or catalog entry sits behind it.
///
/// [`step`]: Env::step
pub trait Env {
    /// Advance the environment by one action.
    ///
    /// # Errors
    /// Invalid actions and emulator faults.
    fn step(&mut self, action: i64) -> Result<Step, GymError>;

    /// Reset the environment to its starting state and return the initial
    /// observation.
    ///
    /// # Errors
    /// Emulator start-up failures.
    fn reset(&mut self) -> Result<Observation, GymError>;

    /// Shape of every observation.
    fn obs_shape(&self) -> Vec<usize>;

    /// Number of valid action indices.
    fn action_size(&self) -> usize;

    /// Release whatever backs the environment.
    fn close(&mut self);
}

impl Env for Session {
    fn step(&mut self, action: i64) -> Result<Step, GymError> {
        Session::step(self, action)
    }

    fn reset(&mut self) -> Result<Observation, GymError> {
        Session::reset(self)
    }

    fn obs_shape(&self) -> Vec<usize> {
        self.spec().observation.shape()
    }

    fn action_size(&self) -> usize {
        self.spec().action_space.len()
    }

    fn close(&mut self) {
        Session::close(self);
    }
}
