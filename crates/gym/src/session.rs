//! One emulator-backed environment instance.

use std::sync::Arc;

use nes::{DisplayMode, GameInfo, NesError, NesLauncher, PixelFrame};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::timing::TimeTracker;
use crate::worker::{EmulatorWorker, Request, Snapshot};
use crate::{Curriculum, EnvironmentSpec, EpisodeScope, GymConfig, GymError, Observation, ObservationMode, RewardTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// No emulator attached, or the last one was discarded after a fault.
    Uninitialized,
    /// An episode has been reset and no step taken yet.
    Ready,
    Stepping,
    Closed,
}

/// Side information returned with every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    #[serde(flatten)]
    pub game: GameInfo,
    pub frame: u32,
    pub episode_reward: f64,
    pub died: bool,
    pub stuck: bool,
    /// The episode had already finished; no frame was played.
    pub ignore: bool,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Exclusive owner of one emulator.
///
/// The emulator is started by the first [`Session::reset`] and released by
/// [`Session::close`], which also runs on drop.
pub struct Session {
    spec: EnvironmentSpec,
    config: Arc<GymConfig>,
    launcher: Arc<dyn NesLauncher>,
    launch_gate: Arc<Mutex<()>>,
    state: SessionState,
    worker: Option<EmulatorWorker>,
    reward: RewardTracker,
    curriculum: Option<Curriculum>,
    rng: fastrand::Rng,
    noop_seed: u8,
    level: u8,
    pick_next_level: bool,
    last: Option<Snapshot>,
    episode_reward: f64,
    episode_finished: bool,
    timings: TimeTracker,
}

impl Session {
    pub(crate) fn new(
        spec: EnvironmentSpec,
        config: Arc<GymConfig>,
        launcher: Arc<dyn NesLauncher>,
        launch_gate: Arc<Mutex<()>>,
    ) -> Self {
        let curriculum = (spec.scope == EpisodeScope::Curriculum).then(|| Curriculum::new(config.curriculum));
        let level = if spec.scope == EpisodeScope::Level { spec.level_index() } else { 0 };
        let mut rng = fastrand::Rng::new();
        let noop_seed = rng.u8(..);
        Self {
            reward: RewardTracker::new(config.reward),
            spec,
            config,
            launcher,
            launch_gate,
            state: SessionState::Uninitialized,
            worker: None,
            curriculum,
            rng,
            noop_seed,
            level,
            pick_next_level: false,
            last: None,
            episode_reward: 0.0,
            episode_finished: false,
            timings: TimeTracker::new(),
        }
    }

    /// Reseeds the per-episode start offset. `None` draws fresh entropy.
    /// Returns the seed the next episode will use.
    pub fn seed(&mut self, seed: Option<u64>) -> u8 {
        self.rng = seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        self.noop_seed = self.rng.u8(..);
        self.noop_seed
    }

    /// Starts a new episode, launching the emulator if none is attached.
    ///
    /// # Errors
    /// [`GymError::SessionClosed`] after [`Session::close`];
    /// [`GymError::EmulatorUnavailable`] when the emulator cannot start;
    /// [`GymError::EmulatorTimeout`] when it does not answer in time.
    pub fn reset(&mut self) -> Result<Observation, GymError> {
        self.timings.enter("reset");
        let result = self.reset_episode();
        self.timings.exit();
        result
    }

    /// Takes one action.
    ///
    /// # Errors
    /// [`GymError::NotReady`] before the first reset or after a fault,
    /// [`GymError::SessionClosed`] after close, [`GymError::InvalidAction`]
    /// for an index outside the action space, and emulator faults.
    pub fn step(&mut self, action: i64) -> Result<Step, GymError> {
        self.timings.enter("step");
        let result = self.step_episode(action);
        self.timings.exit();
        result
    }

    /// Moves a curriculum session to `level`, or to the curriculum's choice
    /// when `level` is `None` or still locked, and resets.
    ///
    /// # Errors
    /// [`GymError::Config`] for environments without a curriculum, otherwise
    /// as [`Session::reset`].
    pub fn change_level(&mut self, level: Option<u8>) -> Result<Observation, GymError> {
        if self.state == SessionState::Closed {
            return Err(GymError::SessionClosed);
        }
        let Some(curriculum) = self.curriculum.as_ref() else {
            return Err(GymError::Config(format!("{} has no curriculum to change levels in", self.spec.id)));
        };
        self.level = match level {
            Some(requested) if curriculum.is_unlocked(requested) => requested,
            Some(requested) => {
                warn!("Level {requested} is locked; using the curriculum's choice");
                curriculum.next_level()
            }
            None => curriculum.next_level(),
        };
        self.pick_next_level = false;
        self.reset()
    }

    /// Releases the emulator. Further calls fail with
    /// [`GymError::SessionClosed`]; closing twice is harmless.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown(self.config.step_timeout());
        }
        self.state = SessionState::Closed;
        self.last = None;
        info!("Closed session for {}", self.spec.id);
    }

    /// Last screen shown by the emulator, whatever the observation mode.
    #[must_use]
    pub fn render(&self) -> Option<PixelFrame> {
        self.last.as_ref().map(|snapshot| snapshot.screen.clone())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn spec(&self) -> &EnvironmentSpec {
        &self.spec
    }

    #[must_use]
    pub fn episode_reward(&self) -> f64 {
        self.episode_reward
    }

    /// Zero-based level the current episode plays.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub fn curriculum(&self) -> Option<&Curriculum> {
        self.curriculum.as_ref()
    }

    #[must_use]
    pub fn timings(&self) -> &TimeTracker {
        &self.timings
    }

    fn reset_episode(&mut self) -> Result<Observation, GymError> {
        if self.state == SessionState::Closed {
            return Err(GymError::SessionClosed);
        }
        if std::mem::take(&mut self.pick_next_level) {
            if let Some(curriculum) = &self.curriculum {
                self.level = curriculum.next_level();
            }
        }
        if self.worker.is_none() {
            self.worker = Some(self.launch()?);
        }

        let noop_seed = self.noop_seed;
        self.noop_seed = self.rng.u8(..);
        let snapshot = self.call(Request::Reset { level: self.level, noop_seed }, self.config.reset_timeout())?;

        self.reward.reset();
        self.episode_reward = 0.0;
        self.episode_finished = false;
        if let Some(curriculum) = self.curriculum.as_mut() {
            curriculum.begin_episode(self.level);
        }
        self.state = SessionState::Ready;
        info!("Reset {} at level {} (seed {noop_seed})", self.spec.id, self.level);

        let observation = self.observe(&snapshot);
        self.last = Some(snapshot);
        Ok(observation)
    }

    fn step_episode(&mut self, action: i64) -> Result<Step, GymError> {
        match self.state {
            SessionState::Closed => return Err(GymError::SessionClosed),
            SessionState::Uninitialized => return Err(GymError::NotReady),
            SessionState::Ready | SessionState::Stepping => {}
        }
        let buttons = self.spec.action_space.decode(action)?;
        if self.episode_finished {
            return self.finished_step();
        }

        let snapshot = self.call(Request::Step(buttons), self.config.step_timeout())?;
        let outcome = self.reward.observe(&snapshot.info);
        let done = snapshot.finished || outcome.stuck;
        self.episode_reward += outcome.reward;
        self.state = SessionState::Stepping;

        if let Some(curriculum) = self.curriculum.as_mut() {
            curriculum.record(self.level, self.episode_reward);
            if done {
                curriculum.unlock_levels();
            }
        }
        if done {
            self.episode_finished = true;
            self.pick_next_level = true;
            info!(
                "Episode on {} finished after {} frames with reward {:.1}",
                self.spec.id, snapshot.frame, self.episode_reward
            );
        }

        let info = StepInfo {
            game: snapshot.info,
            frame: snapshot.frame,
            episode_reward: self.episode_reward,
            died: outcome.died,
            stuck: outcome.stuck,
            ignore: false,
        };
        let observation = self.observe(&snapshot);
        self.last = Some(snapshot);
        Ok(Step { observation, reward: outcome.reward, done, info })
    }

    fn finished_step(&self) -> Result<Step, GymError> {
        let snapshot = self.last.as_ref().ok_or(GymError::NotReady)?;
        Ok(Step {
            observation: self.observe(snapshot),
            reward: 0.0,
            done: true,
            info: StepInfo {
                game: snapshot.info,
                frame: snapshot.frame,
                episode_reward: self.episode_reward,
                died: false,
                stuck: false,
                ignore: true,
            },
        })
    }

    fn launch(&mut self) -> Result<EmulatorWorker, GymError> {
        let _gate = self.launch_gate.lock();
        let rom = self.spec.rom;
        let mut options = self.config.launch_options(rom);
        let timeout = self.config.reset_timeout();
        info!("Launching emulator for {} ({:?})", self.spec.id, options.display);

        let launched = self.timings.time("launch", |_| {
            match EmulatorWorker::launch(Arc::clone(&self.launcher), rom, options.clone(), timeout) {
                Err(NesError::FullscreenRejected) => {
                    warn!("Fullscreen display rejected; falling back to windowed");
                    options.display = DisplayMode::Windowed;
                    EmulatorWorker::launch(Arc::clone(&self.launcher), rom, options, timeout)
                }
                other => other,
            }
        });
        launched.map_err(GymError::from)
    }

    /// Runs one request on the worker. Any failure discards the emulator and
    /// leaves the session needing a reset.
    fn call(&mut self, request: Request, timeout: std::time::Duration) -> Result<Snapshot, GymError> {
        let Some(worker) = self.worker.as_ref() else {
            return Err(GymError::NotReady);
        };
        self.timings.enter("emulator");
        let result = worker.call(request, timeout);
        self.timings.exit();

        result.map_err(|err| {
            match &err {
                NesError::Timeout(after) => warn!("Emulator for {} timed out after {after:?}; force-closing it", self.spec.id),
                other => warn!("Emulator for {} failed: {other}; discarding it", self.spec.id),
            }
            self.discard_emulator();
            GymError::from(err)
        })
    }

    fn discard_emulator(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abandon();
        }
        self.last = None;
        if self.state != SessionState::Closed {
            self.state = SessionState::Uninitialized;
        }
    }

    fn observe(&self, snapshot: &Snapshot) -> Observation {
        match self.spec.observation {
            ObservationMode::Pixels => Observation::Pixels(snapshot.screen.clone()),
            ObservationMode::Tiles => Observation::Tiles(snapshot.tiles.clone()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.spec.id)
            .field("state", &self.state)
            .field("level", &self.level)
            .field("episode_reward", &self.episode_reward)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
