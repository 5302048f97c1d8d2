//! Drives `FceuxBackend` against `fake_fceux.sh`, a shell stand-in that
//! speaks the pipe protocol, so the FIFO handshake, frame waits, level
//! reloads and shutdown run without a real emulator.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use nes::fceux::FceuxLauncher;
use nes::{
    Buttons, DisplayMode, GameInfo, LaunchOptions, NesBackend, NesError, NesLauncher, PixelFrame, RomTarget,
    Tile, TileGrid,
};

const RIGHT: Buttons = Buttons::from_array([0, 0, 0, 1, 0, 0]);
const DOWN: Buttons = Buttons::from_array([0, 0, 1, 0, 0, 0]);

/// Writes the script once per test binary; concurrent tests wait on the
/// lock instead of forking while the file is still open for writing.
fn fake_emulator() -> &'static Path {
    static SCRIPT: OnceLock<PathBuf> = OnceLock::new();
    SCRIPT.get_or_init(|| {
        let path = Path::new(env!("CARGO_TARGET_TMPDIR")).join("fake_fceux.sh");
        std::fs::write(&path, include_str!("fake_fceux.sh")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    })
}

fn options(dir: &Path) -> LaunchOptions {
    let rom = dir.join("super-mario.nes");
    std::fs::write(&rom, b"NES\x1a").unwrap();
    let mut options = LaunchOptions::new(rom).with_display(DisplayMode::Headless);
    options.boot_timeout = Duration::from_secs(10);
    options.frame_timeout = Duration::from_millis(500);
    options
}

fn launch(options: &LaunchOptions) -> Box<dyn NesBackend> {
    FceuxLauncher::new(fake_emulator())
        .launch(RomTarget::SuperMarioBros, options)
        .unwrap()
}

#[test]
fn full_lifecycle_over_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());
    let mut nes = launch(&options);

    nes.reset(0, 7).unwrap();
    assert_eq!(nes.apply_input(RIGHT).unwrap(), 2);
    let info = nes.game_info();
    // The idle frames are requested before the first press only.
    assert_eq!((info.distance, info.score, info.life), (41, 7, 3));
    assert_eq!(nes.apply_input(RIGHT).unwrap(), 3);
    assert_eq!((nes.game_info().distance, nes.game_info().score), (42, 0));
    assert_eq!(nes.tile_memory().get(10, 0), Some(Tile::Player));
    assert!(nes.frame_buffer() != PixelFrame::default());
    assert!(!nes.is_finished());

    nes.reset(5, 0).unwrap();
    assert_eq!(nes.game_info(), GameInfo::default());
    assert_eq!(nes.tile_memory(), TileGrid::default());
    assert!(nes.frame_buffer() == PixelFrame::default());
    assert_eq!(nes.apply_input(RIGHT).unwrap(), 2);
    assert_eq!(nes.game_info().level, 5);

    nes.shutdown();
    assert!(matches!(nes.apply_input(RIGHT), Err(NesError::Closed)));
}

#[test]
fn unanswered_frame_times_out_and_backend_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());
    let mut nes = launch(&options);
    nes.reset(0, 0).unwrap();

    match nes.apply_input(DOWN) {
        Err(NesError::Timeout(waited)) => assert_eq!(waited, options.frame_timeout),
        other => panic!("expected a frame timeout, got {other:?}"),
    }
    assert_eq!(nes.apply_input(RIGHT).unwrap(), 2);
}

#[test]
fn emulator_exiting_during_boot_is_unavailable() {
    // Written before this test forks, for the reason given on `fake_emulator`.
    fake_emulator();
    let dir = tempfile::tempdir().unwrap();
    let options = options(dir.path());
    let launched = FceuxLauncher::new("/bin/false").launch(RomTarget::SuperMarioBros, &options);
    assert!(matches!(launched, Err(NesError::Unavailable(_))));
}
