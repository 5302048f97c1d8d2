#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # NES capability boundary
//!
//! The emulator that actually runs Super Mario Bros is an external program.
//! This crate describes what the environment layer is allowed to ask of it
//! and nothing more: boot a ROM, restart a level, press controller buttons
//! for one frame, read the frame buffer, read the symbolic tile map, and ask
//! whether the episode has finished.
//!
//! -   [`NesLauncher`] boots an emulator for a [`RomTarget`] and hands back a
//!     [`NesBackend`], the live handle driven frame by frame.
//! -   [`fceux`] talks to a real FCEUX process over named pipes.
//! -   `mock` (behind the `mock` feature) is a deterministic in-process
//!     backend used by tests and the headless demo runtime.

use std::path::PathBuf;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod palette;
pub mod protocol;

#[cfg(unix)]
pub mod fceux;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockConfig, MockLauncher, MockNes};

/// Height of the NES picture in pixels, overscan rows removed.
pub const SCREEN_HEIGHT: usize = 224;
/// Width of the NES picture in pixels.
pub const SCREEN_WIDTH: usize = 256;
/// Rows of the symbolic tile map.
pub const TILE_ROWS: usize = 13;
/// Columns of the symbolic tile map.
pub const TILE_COLS: usize = 16;
/// Number of playable levels (8 worlds of 4 stages).
pub const LEVEL_COUNT: u8 = 32;

#[derive(Error, Debug)]
pub enum NesError {
    #[error("emulator unavailable: {0}")]
    Unavailable(String),
    #[error("ROM not found at {0}")]
    RomNotFound(PathBuf),
    #[error("emulator rejected fullscreen display")]
    FullscreenRejected,
    #[error("emulator did not answer within {0:?}")]
    Timeout(Duration),
    #[error("emulator i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed emulator message: {0}")]
    Protocol(String),
    #[error("emulator already shut down")]
    Closed,
}

/// ROM images the launcher knows how to boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RomTarget {
    #[default]
    SuperMarioBros,
}

impl RomTarget {
    /// File name the ROM is expected under inside the ROM directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            RomTarget::SuperMarioBros => "super-mario.nes",
        }
    }
}

/// How the emulator window is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Fullscreen,
    #[default]
    Windowed,
    Headless,
}

/// Everything a launcher needs besides the ROM identity.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub display: DisplayMode,
    /// Path of the ROM image on disk.
    pub rom_path: PathBuf,
    /// Extra Lua scripts loaded by the emulator after the bootstrap variables.
    pub lua_scripts: Vec<PathBuf>,
    /// How long to wait for the emulator to report its first frame.
    pub boot_timeout: Duration,
    /// How long to wait for one frame to be processed.
    pub frame_timeout: Duration,
}

impl LaunchOptions {
    #[must_use]
    pub fn new(rom_path: impl Into<PathBuf>) -> Self {
        Self {
            display: DisplayMode::default(),
            rom_path: rom_path.into(),
            lua_scripts: Vec::new(),
            boot_timeout: Duration::from_secs(30),
            frame_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_display(mut self, display: DisplayMode) -> Self {
        self.display = display;
        self
    }
}

/// State of the six controller buttons the game reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buttons {
    pub up: bool,
    pub left: bool,
    pub down: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
}

impl Buttons {
    pub const NONE: Buttons = Buttons::from_array([0, 0, 0, 0, 0, 0]);

    /// Builds a button state from `[up, left, down, right, a, b]`, any
    /// non-zero entry meaning pressed.
    #[must_use]
    pub const fn from_array(pressed: [u8; 6]) -> Self {
        Self {
            up: pressed[0] != 0,
            left: pressed[1] != 0,
            down: pressed[2] != 0,
            right: pressed[3] != 0,
            a: pressed[4] != 0,
            b: pressed[5] != 0,
        }
    }

    /// Decodes a 6-bit mask; bit 0 is `up`, bit 5 is `b`.
    #[must_use]
    pub const fn from_mask(mask: u8) -> Self {
        Self {
            up: mask & 0b00_0001 != 0,
            left: mask & 0b00_0010 != 0,
            down: mask & 0b00_0100 != 0,
            right: mask & 0b00_1000 != 0,
            a: mask & 0b01_0000 != 0,
            b: mask & 0b10_0000 != 0,
        }
    }

    #[must_use]
    pub fn to_array(self) -> [u8; 6] {
        [self.up, self.left, self.down, self.right, self.a, self.b].map(u8::from)
    }

    #[must_use]
    pub fn is_idle(self) -> bool {
        self == Buttons::NONE
    }
}

/// One RGB pixel, laid out so a whole frame can be viewed as raw bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Row-major `SCREEN_HEIGHT x SCREEN_WIDTH` RGB picture.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelFrame {
    pixels: Vec<Rgb>,
}

impl std::fmt::Debug for PixelFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelFrame").field("shape", &Self::SHAPE).finish()
    }
}

impl Default for PixelFrame {
    fn default() -> Self {
        Self::filled(Rgb::default())
    }
}

impl PixelFrame {
    /// `[height, width, channels]`.
    pub const SHAPE: [usize; 3] = [SCREEN_HEIGHT, SCREEN_WIDTH, 3];

    #[must_use]
    pub fn filled(color: Rgb) -> Self {
        Self { pixels: vec![color; SCREEN_HEIGHT * SCREEN_WIDTH] }
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgb> {
        (x < SCREEN_WIDTH && y < SCREEN_HEIGHT).then(|| self.pixels[y * SCREEN_WIDTH + x])
    }

    /// Writes one pixel; coordinates outside the picture are ignored.
    pub fn set(&mut self, x: usize, y: usize, color: Rgb) -> bool {
        if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
            return false;
        }
        self.pixels[y * SCREEN_WIDTH + x] = color;
        true
    }

    pub fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: Rgb) {
        for row in y..(y + h).min(SCREEN_HEIGHT) {
            for col in x..(x + w).min(SCREEN_WIDTH) {
                self.pixels[row * SCREEN_WIDTH + col] = color;
            }
        }
    }

    /// Interleaved `RGBRGB...` bytes, `SCREEN_HEIGHT * SCREEN_WIDTH * 3` long.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    #[must_use]
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }
}

/// Symbol stored in one cell of the tile map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    Empty = 0,
    Solid = 1,
    Enemy = 2,
    Player = 3,
}

impl Tile {
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Tile::Empty),
            1 => Some(Tile::Solid),
            2 => Some(Tile::Enemy),
            3 => Some(Tile::Player),
            _ => None,
        }
    }
}

/// `TILE_ROWS x TILE_COLS` symbolic view of the visible screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TileGrid {
    cells: [[u8; TILE_COLS]; TILE_ROWS],
}

impl TileGrid {
    pub const SHAPE: [usize; 2] = [TILE_ROWS, TILE_COLS];

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<Tile> {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|v| Tile::from_u8(*v))
    }

    pub fn set(&mut self, row: usize, col: usize, tile: Tile) -> bool {
        match self.cells.get_mut(row).and_then(|r| r.get_mut(col)) {
            Some(cell) => {
                *cell = tile as u8;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[[u8; TILE_COLS]; TILE_ROWS] {
        &self.cells
    }

    /// Row-major copy of the cell values.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.cells.iter().flatten().copied().collect()
    }
}

/// Game counters reported by the emulator after every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub distance: i32,
    pub score: i32,
    pub coins: i32,
    pub life: i32,
    /// In-game clock, counting down.
    pub time: i32,
    pub player_status: i32,
    /// Zero-based level index, `(world - 1) * 4 + (stage - 1)`.
    pub level: i32,
    pub world: i32,
    pub stage: i32,
}

impl GameInfo {
    /// Applies one `name:value` pair; unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: i32) -> bool {
        let slot = match name {
            "distance" => &mut self.distance,
            "score" => &mut self.score,
            "coins" => &mut self.coins,
            "life" => &mut self.life,
            "time" => &mut self.time,
            "player_status" => &mut self.player_status,
            "level" => &mut self.level,
            "world" => &mut self.world,
            "stage" => &mut self.stage,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// A live emulator, exclusively owned by one driver.
///
/// Every method that advances the game blocks until the emulator has
/// processed the request or the launch options' frame timeout elapses.
pub trait NesBackend: Send {
    /// Restarts play at `level` (zero-based). The first frame after a reset
    /// is preceded by `noop_seed` idle frames so episodes do not all start on
    /// the same frame.
    ///
    /// # Errors
    /// [`NesError::Timeout`] when the emulator never reports ready, or an I/O
    /// error from the transport.
    fn reset(&mut self, level: u8, noop_seed: u8) -> Result<(), NesError>;

    /// Holds `buttons` for one frame and returns the frame number reached.
    ///
    /// # Errors
    /// [`NesError::Timeout`] when the frame is not processed in time.
    fn apply_input(&mut self, buttons: Buttons) -> Result<u32, NesError>;

    fn frame_buffer(&self) -> PixelFrame;

    fn tile_memory(&self) -> TileGrid;

    fn game_info(&self) -> GameInfo;

    fn is_finished(&self) -> bool;

    /// Releases the emulator. Calling it twice is harmless.
    fn shutdown(&mut self);
}

/// Boots emulators. One launcher is shared by every session of a process.
pub trait NesLauncher: Send + Sync + 'static {
    /// Loads `rom` into a fresh emulator instance.
    ///
    /// # Errors
    /// [`NesError::Unavailable`] or [`NesError::RomNotFound`] when the
    /// emulator cannot start, [`NesError::FullscreenRejected`] when only the
    /// requested display mode failed.
    fn launch(&self, rom: RomTarget, options: &LaunchOptions) -> Result<Box<dyn NesBackend>, NesError>;
}
