//! # FCEUX backend
//!
//! Drives a real FCEUX process. Each backend gets its own temporary
//! directory holding two named pipes and a generated Lua bootstrap file:
//!
//! -   `smb-fifo-out.<name>`: commands written by us, read by the Lua side.
//! -   `smb-fifo-in.<name>`: `!`-terminated messages written by the Lua side
//!     and consumed by a listener thread, which folds them into a shared
//!     [`FrameState`] and wakes whoever waits for the next frame.
//!
//! Opening a FIFO blocks until the other end shows up, so every open that
//! depends on the emulator runs on a helper thread and is awaited with a
//! timeout. The emulator process is killed on shutdown and when the backend
//! is dropped.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as Process, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use parking_lot::{Condvar, Mutex};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::protocol::{self, Command, FrameState, Message, MessageBuffer};
use crate::{
    Buttons, DisplayMode, GameInfo, LaunchOptions, NesBackend, NesError, NesLauncher, PixelFrame,
    RomTarget, TileGrid,
};

const EXECUTABLE: &str = "fceux";
const EXTRA_SEARCH_DIRS: [&str; 2] = ["/usr/games", "/usr/local/games"];
const PIPE_PREFIX: &str = "smb-fifo";
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LISTENER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Boots FCEUX processes.
#[derive(Debug, Clone)]
pub struct FceuxLauncher {
    executable: PathBuf,
}

impl FceuxLauncher {
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into() }
    }

    /// Uses `explicit` when given, otherwise searches `PATH` plus the usual
    /// games directories for an `fceux` executable.
    ///
    /// # Errors
    /// [`NesError::Unavailable`] when no executable can be found.
    pub fn locate(explicit: Option<PathBuf>) -> Result<Self, NesError> {
        if let Some(path) = explicit {
            return if path.is_file() {
                Ok(Self::new(path))
            } else {
                Err(NesError::Unavailable(format!("no emulator at {}", path.display())))
            };
        }
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        std::env::split_paths(&path_var)
            .chain(EXTRA_SEARCH_DIRS.iter().map(PathBuf::from))
            .map(|dir| dir.join(EXECUTABLE))
            .find(|candidate| candidate.is_file())
            .map(Self::new)
            .ok_or_else(|| {
                NesError::Unavailable("fceux is required; install it with `apt-get install fceux`".into())
            })
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl NesLauncher for FceuxLauncher {
    fn launch(&self, rom: RomTarget, options: &LaunchOptions) -> Result<Box<dyn NesBackend>, NesError> {
        let backend = FceuxBackend::launch(&self.executable, rom, options)?;
        Ok(Box::new(backend))
    }
}

fn display_available() -> bool {
    std::env::var_os("DISPLAY").is_some() || std::env::var_os("WAYLAND_DISPLAY").is_some()
}

fn display_args(display: DisplayMode) -> &'static [&'static str] {
    match display {
        DisplayMode::Fullscreen => &["-f", "1"],
        DisplayMode::Windowed => &["--xscale", "2", "--yscale", "2", "-f", "0"],
        DisplayMode::Headless => &["--nogui", "-f", "0"],
    }
}

fn make_fifo(path: &Path) -> Result<(), NesError> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| NesError::Unavailable(format!("pipe path contains NUL: {}", path.display())))?;
    // SAFETY: `c_path` is NUL-terminated and outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

/// Opens the other end of `path` without blocking so a thread stuck in
/// `open` on it can proceed.
fn unblock_fifo(path: &Path) {
    let _ = OpenOptions::new().read(true).custom_flags(libc::O_NONBLOCK).open(path);
    let _ = OpenOptions::new().write(true).custom_flags(libc::O_NONBLOCK).open(path);
}

fn write_bootstrap(path: &Path, pipe_name: u32, pipe_prefix: &Path, scripts: &[PathBuf]) -> Result<(), NesError> {
    let mut lua = String::new();
    lua.push_str(&format!("pipe_name = \"{pipe_name}\";\n"));
    lua.push_str(&format!("pipe_prefix = \"{}\";\n", pipe_prefix.display()));
    for (i, script) in scripts.iter().enumerate() {
        lua.push_str(&format!("f_{i} = assert (loadfile (\"{}\"));\n", script.display()));
        lua.push_str(&format!("f_{i} ();\n"));
    }
    std::fs::write(path, lua)?;
    Ok(())
}

struct Shared {
    state: Mutex<FrameState>,
    progress: Condvar,
    exiting: AtomicBool,
}

impl Shared {
    fn apply(&self, message: Message) {
        self.state.lock().apply(message);
        self.progress.notify_all();
    }

    fn mark_exited(&self) {
        self.state.lock().exited = true;
        self.progress.notify_all();
    }
}

fn listen(path: &Path, shared: &Shared) {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Could not open emulator pipe {}: {e}", path.display());
            shared.mark_exited();
            return;
        }
    };
    let mut buffer = MessageBuffer::default();
    for line in BufReader::new(file).lines() {
        if shared.exiting.load(Ordering::Acquire) {
            break;
        }
        let Ok(line) = line else { break };
        let Some(raw) = buffer.push_line(&line) else {
            continue;
        };
        match protocol::parse_message(&raw) {
            Ok(message) => {
                let exit = message == Message::Exit;
                shared.apply(message);
                if exit {
                    break;
                }
            }
            Err(e) => {
                error!("Closing emulator pipe: {e}");
                break;
            }
        }
    }
    shared.mark_exited();
}

/// A running FCEUX process.
pub struct FceuxBackend {
    child: Option<Child>,
    workdir: TempDir,
    pipe_in: PathBuf,
    pipe_out_path: PathBuf,
    pipe_out: Option<File>,
    shared: Arc<Shared>,
    listener: Option<JoinHandle<()>>,
    boot_timeout: Duration,
    frame_timeout: Duration,
    booted: bool,
    pending_noop: Option<u8>,
}

impl FceuxBackend {
    fn launch(executable: &Path, rom: RomTarget, options: &LaunchOptions) -> Result<Self, NesError> {
        if !options.rom_path.is_file() {
            return Err(NesError::RomNotFound(options.rom_path.clone()));
        }

        let mut mode = options.display;
        if mode != DisplayMode::Headless && !display_available() {
            warn!("No display server found; starting {} headless instead of {mode:?}", rom.file_name());
            mode = DisplayMode::Headless;
        }

        let workdir = tempfile::Builder::new().prefix("smb-fceux").tempdir()?;
        let pipe_name = fastrand::u32(..);
        let prefix = workdir.path().join(PIPE_PREFIX);
        let pipe_in = workdir.path().join(format!("{PIPE_PREFIX}-in.{pipe_name}"));
        let pipe_out_path = workdir.path().join(format!("{PIPE_PREFIX}-out.{pipe_name}"));
        make_fifo(&pipe_in)?;
        make_fifo(&pipe_out_path)?;

        let bootstrap = workdir.path().join("bootstrap.lua");
        write_bootstrap(&bootstrap, pipe_name, &prefix, &options.lua_scripts)?;

        let shared = Arc::new(Shared {
            state: Mutex::new(FrameState::default()),
            progress: Condvar::new(),
            exiting: AtomicBool::new(false),
        });

        let listener = {
            let shared = Arc::clone(&shared);
            let path = pipe_in.clone();
            thread::Builder::new()
                .name(format!("fceux-listener-{pipe_name}"))
                .spawn(move || listen(&path, &shared))?
        };

        let stdout = File::create(workdir.path().join("fceux.stdout.log"))?;
        let stderr = File::create(workdir.path().join("fceux.stderr.log"))?;
        let spawned = Process::new(executable)
            .args(display_args(mode))
            .arg("--loadlua")
            .arg(&bootstrap)
            .arg(&options.rom_path)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn();
        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                shared.exiting.store(true, Ordering::Release);
                unblock_fifo(&pipe_in);
                return Err(NesError::Unavailable(format!("unable to start {}: {e}", executable.display())));
            }
        };
        info!("Started fceux pid {} for {} ({mode:?})", child.id(), rom.file_name());

        let mut backend = Self {
            child: Some(child),
            workdir,
            pipe_in,
            pipe_out_path,
            pipe_out: None,
            shared,
            listener: Some(listener),
            boot_timeout: options.boot_timeout,
            frame_timeout: options.frame_timeout,
            booted: false,
            pending_noop: None,
        };
        match backend.open_command_pipe(mode) {
            Ok(file) => {
                backend.pipe_out = Some(file);
                Ok(backend)
            }
            Err(e) => {
                backend.shutdown();
                Err(e)
            }
        }
    }

    /// Waits for the Lua side to open its read end of the command pipe,
    /// watching for the process dying in the meantime.
    fn open_command_pipe(&mut self, display: DisplayMode) -> Result<File, NesError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let path = self.pipe_out_path.clone();
        thread::spawn(move || {
            let _ = tx.send(OpenOptions::new().write(true).open(path));
        });

        let deadline = Instant::now() + self.boot_timeout;
        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(opened) => return opened.map_err(NesError::from),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(NesError::Unavailable("command pipe opener vanished".into()));
                }
                Err(RecvTimeoutError::Timeout) => {}
            }
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    unblock_fifo(&self.pipe_out_path);
                    if display == DisplayMode::Fullscreen && !status.success() {
                        return Err(NesError::FullscreenRejected);
                    }
                    return Err(NesError::Unavailable(format!("fceux exited early with {status}")));
                }
            }
            if Instant::now() >= deadline {
                unblock_fifo(&self.pipe_out_path);
                return Err(NesError::Timeout(self.boot_timeout));
            }
        }
    }

    fn send(&mut self, command: Command) -> Result<(), NesError> {
        let pipe = self.pipe_out.as_mut().ok_or(NesError::Closed)?;
        debug!("-> {command}");
        writeln!(pipe, "{command}")?;
        pipe.flush()?;
        Ok(())
    }

    fn wait_until(&self, timeout: Duration, mut ready: impl FnMut(&FrameState) -> bool) -> Result<(), NesError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !ready(&state) {
            if state.exited {
                return Err(NesError::Closed);
            }
            if self.shared.progress.wait_until(&mut state, deadline).timed_out() {
                return if ready(&state) { Ok(()) } else { Err(NesError::Timeout(timeout)) };
            }
        }
        Ok(())
    }

    /// Joins the listener once the pipe has closed. A listener still
    /// reading after `LISTENER_JOIN_TIMEOUT` (the write end leaked into
    /// another process) is left detached.
    fn join_listener(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let deadline = Instant::now() + LISTENER_JOIN_TIMEOUT;
        while !listener.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if listener.is_finished() {
            if listener.join().is_err() {
                error!("Emulator pipe listener panicked");
            }
        } else {
            warn!("Emulator pipe listener still reading after {LISTENER_JOIN_TIMEOUT:?}; detaching it");
        }
    }

    fn load_level(&mut self, level: u8) -> Result<(), NesError> {
        let loads_before = self.shared.state.lock().level_loads;
        self.send(Command::ChangeLevel(level))?;
        self.wait_until(self.boot_timeout, |state| {
            state.level_loads > loads_before && state.last_frame > 0
        })
    }
}

impl NesBackend for FceuxBackend {
    fn reset(&mut self, level: u8, noop_seed: u8) -> Result<(), NesError> {
        if self.booted {
            self.load_level(level)?;
        } else {
            self.wait_until(self.boot_timeout, |state| state.last_frame > 0)?;
            self.booted = true;
            if level != 0 {
                self.load_level(level)?;
            }
        }
        self.pending_noop = Some(noop_seed);
        Ok(())
    }

    fn apply_input(&mut self, buttons: Buttons) -> Result<u32, NesError> {
        let start_frame = {
            let state = self.shared.state.lock();
            if state.exited {
                return Err(NesError::Closed);
            }
            state.last_frame
        };
        if let Some(seed) = self.pending_noop.take() {
            self.send(Command::Noop { frame: start_frame, seed })?;
        }
        self.send(Command::Press { frame: start_frame, buttons })?;
        self.wait_until(self.frame_timeout, |state| state.last_frame > start_frame || state.finished)?;
        Ok(self.shared.state.lock().last_frame)
    }

    fn frame_buffer(&self) -> PixelFrame {
        self.shared.state.lock().screen.clone()
    }

    fn tile_memory(&self) -> TileGrid {
        self.shared.state.lock().tiles.clone()
    }

    fn game_info(&self) -> GameInfo {
        self.shared.state.lock().info
    }

    fn is_finished(&self) -> bool {
        self.shared.state.lock().finished
    }

    fn shutdown(&mut self) {
        if self.shared.exiting.swap(true, Ordering::AcqRel) && self.child.is_none() {
            return;
        }
        if self.pipe_out.is_some() {
            let _ = self.send(Command::Exit);
        }
        self.pipe_out = None;
        if let Some(mut child) = self.child.take() {
            info!("Stopping fceux pid {}", child.id());
            let _ = child.kill();
            let _ = child.wait();
        }
        unblock_fifo(&self.pipe_in);
        unblock_fifo(&self.pipe_out_path);
        self.join_listener();
        self.shared.mark_exited();
        debug!("Released emulator workdir {}", self.workdir.path().display());
    }
}

impl Drop for FceuxBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}
