//! Thread that owns one emulator backend.
//!
//! Backend calls block, sometimes for a long time, so they run on a
//! dedicated thread and the session waits for each reply with a deadline.
//! A worker that misses a deadline is abandoned: it finishes (or keeps
//! hanging in) its current call on its own and shuts the backend down once
//! it notices nobody is listening.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use nes::{Buttons, GameInfo, LaunchOptions, NesBackend, NesError, NesLauncher, PixelFrame, RomTarget, TileGrid};
use tracing::{debug, warn};

/// Everything read back from the emulator after a request.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub frame: u32,
    pub screen: PixelFrame,
    pub tiles: TileGrid,
    pub info: GameInfo,
    pub finished: bool,
}

impl Snapshot {
    fn capture(backend: &dyn NesBackend, frame: u32) -> Self {
        Self {
            frame,
            screen: backend.frame_buffer(),
            tiles: backend.tile_memory(),
            info: backend.game_info(),
            finished: backend.is_finished(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Request {
    Reset { level: u8, noop_seed: u8 },
    Step(Buttons),
    Shutdown,
}

type Reply = Result<Snapshot, NesError>;

pub(crate) struct EmulatorWorker {
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    handle: Option<JoinHandle<()>>,
}

impl EmulatorWorker {
    /// Starts a worker thread and launches the emulator on it.
    ///
    /// # Errors
    /// Whatever the launcher reports, or [`NesError::Timeout`] when the
    /// launch does not finish within `timeout`.
    pub fn launch(
        launcher: Arc<dyn NesLauncher>,
        rom: RomTarget,
        options: LaunchOptions,
        timeout: Duration,
    ) -> Result<Self, NesError> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name(format!("nes-{}", rom.file_name()))
            .spawn(move || match launcher.launch(rom, &options) {
                Ok(backend) => {
                    let ready = Snapshot::capture(backend.as_ref(), 0);
                    if reply_tx.send(Ok(ready)).is_ok() {
                        serve(backend, &request_rx, &reply_tx);
                    }
                }
                Err(err) => {
                    let _ = reply_tx.send(Err(err));
                }
            })?;

        match reply_rx.recv_timeout(timeout) {
            Ok(Ok(_)) => Ok(Self { requests: request_tx, replies: reply_rx, handle: Some(handle) }),
            Ok(Err(err)) => {
                let _ = handle.join();
                Err(err)
            }
            Err(RecvTimeoutError::Timeout) => Err(NesError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(NesError::Unavailable("emulator thread exited during launch".into()))
            }
        }
    }

    /// Sends one request and waits at most `timeout` for its reply.
    ///
    /// # Errors
    /// The backend's error, [`NesError::Timeout`] on a missed deadline, or
    /// [`NesError::Closed`] when the worker is gone.
    pub fn call(&self, request: Request, timeout: Duration) -> Reply {
        self.requests.send(request).map_err(|_| NesError::Closed)?;
        match self.replies.recv_timeout(timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => Err(NesError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(NesError::Closed),
        }
    }

    /// Asks the worker to shut the backend down and waits up to `timeout`
    /// for it to finish; a worker that does not finish is left detached.
    pub fn shutdown(mut self, timeout: Duration) {
        if self.requests.send(Request::Shutdown).is_err() {
            return;
        }
        // The worker drops its reply sender on the way out.
        match self.replies.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                debug!("Emulator worker stopped");
            }
            Ok(_) | Err(RecvTimeoutError::Timeout) => {
                warn!("Emulator worker did not stop within {timeout:?}; detaching it");
            }
        }
    }

    /// Gives up on the worker without waiting; it shuts its backend down
    /// after the call in flight returns.
    pub fn abandon(self) {
        let _ = self.requests.send(Request::Shutdown);
        warn!("Abandoned unresponsive emulator worker");
    }
}

fn serve(mut backend: Box<dyn NesBackend>, requests: &Receiver<Request>, replies: &Sender<Reply>) {
    while let Ok(request) = requests.recv() {
        let reply = match request {
            Request::Reset { level, noop_seed } => backend
                .reset(level, noop_seed)
                .map(|()| Snapshot::capture(backend.as_ref(), 0)),
            Request::Step(buttons) => backend
                .apply_input(buttons)
                .map(|frame| Snapshot::capture(backend.as_ref(), frame)),
            Request::Shutdown => break,
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    backend.shutdown();
}
