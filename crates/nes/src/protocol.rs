//! Line protocol spoken with the emulator's Lua side.
//!
//! Outgoing commands are single lines. Incoming messages may be split across
//! several lines by the pipe and are terminated with `!`; a message is
//! `<type>_<frame>` optionally followed by `#<payload>`.

use std::fmt;

use crate::{palette, Buttons, GameInfo, NesError, PixelFrame, Tile, TileGrid};

/// Commands written to the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Idle for `seed` frames before the first action of an episode.
    Noop { frame: u32, seed: u8 },
    /// Hold buttons during the frame following `frame`.
    Press { frame: u32, buttons: Buttons },
    ChangeLevel(u8),
    Exit,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Noop { frame, seed } => write!(f, "noop_{frame}#{seed}"),
            Command::Press { frame, buttons } => {
                let [up, left, down, right, a, b] = buttons.to_array();
                write!(f, "commands_{frame}#{up},{left},{down},{right},{a},{b}")
            }
            Command::ChangeLevel(level) => write!(f, "changelevel#{level}"),
            Command::Exit => f.write_str("exit"),
        }
    }
}

/// Messages read from the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Emulator booted (or finished loading a level) and waits for commands.
    Ready { frame: u32 },
    /// Frame fully processed; data, screen and tiles for it were sent before.
    Done { frame: u32 },
    /// A level change completed; frame numbering restarts.
    Reset,
    Exit,
    Data { frame: u32, fields: Vec<(String, i32)> },
    /// Changed pixels as `(x, y, palette index)`.
    Screen { frame: u32, pixels: Vec<(u8, u8, u8)> },
    /// Tile cells as `(col, row, tile)`.
    Tiles { frame: u32, cells: Vec<(u8, u8, Tile)> },
}

/// Reassembles `!`-terminated messages from pipe lines.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    pending: String,
}

impl MessageBuffer {
    /// Feeds one line; returns a complete message body once its terminator
    /// arrives.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end();
        if line.is_empty() {
            return None;
        }
        self.pending.push_str(line);
        if self.pending.ends_with('!') {
            let mut message = std::mem::take(&mut self.pending);
            message.pop();
            Some(message)
        } else {
            None
        }
    }
}

fn protocol_error(raw: &str, what: &str) -> NesError {
    NesError::Protocol(format!("{what} in {raw:?}"))
}

fn hex(raw: &str, digits: &str) -> Result<u8, NesError> {
    u8::from_str_radix(digits, 16).map_err(|_| protocol_error(raw, "bad hex digits"))
}

/// Parses one complete message body (without the trailing `!`).
///
/// # Errors
/// [`NesError::Protocol`] for unknown message types or malformed payloads.
pub fn parse_message(raw: &str) -> Result<Message, NesError> {
    let raw = raw.trim();
    let (header, payload) = raw.split_once('#').unwrap_or((raw, ""));
    let (kind, frame) = match header.split_once('_') {
        Some((kind, frame)) => {
            let frame = frame
                .parse::<u32>()
                .map_err(|_| protocol_error(raw, "bad frame number"))?;
            (kind, frame)
        }
        None => (header, 0),
    };

    match kind {
        "ready" => Ok(Message::Ready { frame }),
        "done" => Ok(Message::Done { frame }),
        "reset" => Ok(Message::Reset),
        "exit" => Ok(Message::Exit),
        "data" => {
            let mut fields = Vec::new();
            for part in payload.split('|') {
                let Some((name, value)) = part.split_once(':') else {
                    continue;
                };
                let value = value
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| protocol_error(raw, "bad data value"))?;
                fields.push((name.trim().to_string(), value));
            }
            Ok(Message::Data { frame, fields })
        }
        "screen" => {
            let mut pixels = Vec::new();
            for part in payload.split('|').filter(|p| p.len() == 6 && p.is_ascii()) {
                pixels.push((hex(raw, &part[0..2])?, hex(raw, &part[2..4])?, hex(raw, &part[4..6])?));
            }
            Ok(Message::Screen { frame, pixels })
        }
        "tiles" => {
            let mut cells = Vec::new();
            for part in payload.split('|').filter(|p| p.len() == 3 && p.is_ascii()) {
                let col = hex(raw, &part[0..1])?;
                let row = hex(raw, &part[1..2])?;
                let tile = Tile::from_u8(hex(raw, &part[2..3])?)
                    .ok_or_else(|| protocol_error(raw, "unknown tile value"))?;
                cells.push((col, row, tile));
            }
            Ok(Message::Tiles { frame, cells })
        }
        _ => Err(protocol_error(raw, "unknown message type")),
    }
}

/// Emulator-side state as reconstructed from incoming messages.
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    /// Last frame the emulator finished; zero while booting or loading.
    pub last_frame: u32,
    pub info: GameInfo,
    pub finished: bool,
    pub screen: PixelFrame,
    pub tiles: TileGrid,
    pub exited: bool,
    /// Number of level changes the emulator has confirmed.
    pub level_loads: u32,
}

impl FrameState {
    /// Folds one message into the state. Payloads for frames that were
    /// already completed are stale and dropped.
    pub fn apply(&mut self, message: Message) {
        match message {
            Message::Ready { frame } | Message::Done { frame } => self.last_frame = frame,
            Message::Reset => {
                self.level_loads += 1;
                self.last_frame = 0;
                self.finished = false;
                self.info = GameInfo::default();
                self.screen = PixelFrame::default();
                self.tiles = TileGrid::default();
            }
            Message::Exit => self.exited = true,
            Message::Data { frame, fields } if frame > self.last_frame => {
                for (name, value) in fields {
                    if name == "is_finished" {
                        self.finished = value != 0;
                    } else {
                        self.info.set_field(&name, value);
                    }
                }
            }
            Message::Screen { frame, pixels } if frame > self.last_frame => {
                for (x, y, index) in pixels {
                    self.screen.set(usize::from(x), usize::from(y), palette::rgb(index));
                }
            }
            Message::Tiles { frame, cells } if frame > self.last_frame => {
                for (col, row, tile) in cells {
                    self.tiles.set(usize::from(row), usize::from(col), tile);
                }
            }
            Message::Data { .. } | Message::Screen { .. } | Message::Tiles { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rgb;

    #[test]
    fn formats_commands() {
        let press = Command::Press { frame: 12, buttons: Buttons::from_array([0, 0, 0, 1, 1, 0]) };
        assert_eq!(press.to_string(), "commands_12#0,0,0,1,1,0");
        assert_eq!(Command::Noop { frame: 0, seed: 17 }.to_string(), "noop_0#17");
        assert_eq!(Command::ChangeLevel(5).to_string(), "changelevel#5");
        assert_eq!(Command::Exit.to_string(), "exit");
    }

    #[test]
    fn reassembles_split_lines() {
        let mut buffer = MessageBuffer::default();
        assert_eq!(buffer.push_line("data_3#distance:4"), None);
        assert_eq!(buffer.push_line("1|score:100!\n"), Some("data_3#distance:41|score:100".to_string()));
        assert_eq!(buffer.push_line(""), None);
        assert_eq!(buffer.push_line("ready_1!"), Some("ready_1".to_string()));
    }

    #[test]
    fn parses_data_and_finish_flag() {
        let msg = parse_message("data_7#distance:52|life:3|is_finished:1|junk").unwrap();
        let mut state = FrameState { last_frame: 6, ..FrameState::default() };
        state.apply(msg);
        assert_eq!(state.info.distance, 52);
        assert_eq!(state.info.life, 3);
        assert!(state.finished);
    }

    #[test]
    fn stale_payloads_are_dropped() {
        let mut state = FrameState { last_frame: 10, ..FrameState::default() };
        state.apply(parse_message("data_9#distance:99").unwrap());
        assert_eq!(state.info.distance, 0);
        state.apply(parse_message("done_11").unwrap());
        assert_eq!(state.last_frame, 11);
    }

    #[test]
    fn screen_and_tiles_update_buffers() {
        let mut state = FrameState::default();
        state.apply(parse_message("screen_1#0A0222|FFDF0D|bad").unwrap());
        assert_eq!(state.screen.get(10, 2), Some(Rgb::new(92, 148, 252)));
        assert_eq!(state.screen.get(255, 223), Some(Rgb::new(0, 0, 0)));
        state.apply(parse_message("tiles_1#3C3|0A1").unwrap());
        assert_eq!(state.tiles.get(12, 3), Some(Tile::Player));
        assert_eq!(state.tiles.get(10, 0), Some(Tile::Solid));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_message("hello_1").is_err());
        assert!(parse_message("ready_x").is_err());
        assert!(parse_message("tiles_1#009").is_err());
    }

    #[test]
    fn reset_clears_progress() {
        let mut state = FrameState { last_frame: 40, finished: true, ..FrameState::default() };
        state.apply(parse_message("screen_41#0A0222").unwrap());
        state.apply(parse_message("tiles_41#0A3").unwrap());
        assert_eq!(state.tiles.get(10, 0), Some(Tile::Player));
        state.apply(parse_message("reset").unwrap());
        assert_eq!(state.last_frame, 0);
        assert_eq!(state.level_loads, 1);
        assert!(!state.finished);
        assert!(state.screen == PixelFrame::default());
        assert_eq!(state.tiles, TileGrid::default());
    }
}
