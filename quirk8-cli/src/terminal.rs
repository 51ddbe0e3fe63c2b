//! Terminal front end.
//!
//! Renders the display with half block characters, two machine rows per
//! terminal line, and reads the keypad from the keyboard.
use std::{
    collections::HashMap,
    io::{self, Stdout, Write},
    time::Duration,
};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode as HostKey, KeyModifiers},
    queue, style, terminal,
};
use log::{debug, warn, LevelFilter};
use quirk8::{constants::*, Chip8Vm, KeyCode};

/// Raw mode alternate screen, restored on drop.
///
/// Logging is off while the screen is open, since the CPU thread would
/// write over the display.
pub struct Terminal {
    stdout: Stdout,
    quiet: Option<QuietLog>,
}

impl Terminal {
    pub fn open() -> io::Result<Self> {
        let quiet = QuietLog::new();
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        queue!(
            stdout,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All)
        )?;
        stdout.flush()?;

        Ok(Self {
            stdout,
            quiet: Some(quiet),
        })
    }

    pub fn draw(&mut self, vm: &Chip8Vm) -> io::Result<()> {
        let display = vm.framebuffer();

        for (line, rows) in display.chunks(DISPLAY_WIDTH * 2).enumerate() {
            let (top, bottom) = rows.split_at(DISPLAY_WIDTH);
            let text: String = top
                .iter()
                .zip(bottom)
                .map(|(&upper, &lower)| match (upper, lower) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect();

            queue!(self.stdout, cursor::MoveTo(0, line as u16), style::Print(text))?;
        }

        let status = format!(
            "PC {:04X}  I {:04X}  DT {:02X}  ST {:02X} {}  {:?}",
            vm.pc(),
            vm.index(),
            vm.delay_timer(),
            vm.sound_timer(),
            if vm.sound_timer() > 0 { '♪' } else { ' ' },
            vm.state(),
        );
        queue!(
            self.stdout,
            cursor::MoveTo(0, (DISPLAY_HEIGHT / 2) as u16 + 1),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(status)
        )?;

        self.stdout.flush()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let result = queue!(self.stdout, cursor::Show, terminal::LeaveAlternateScreen)
            .and_then(|_| self.stdout.flush())
            .and_then(|_| terminal::disable_raw_mode());

        drop(self.quiet.take());
        if let Err(err) = result {
            warn!("failed to restore terminal: {err}");
        }
    }
}

/// Turns logging off, and restores the previous level on drop.
struct QuietLog {
    level: LevelFilter,
}

impl QuietLog {
    fn new() -> Self {
        let level = log::max_level();
        log::set_max_level(LevelFilter::Off);
        Self { level }
    }
}

impl Drop for QuietLog {
    fn drop(&mut self) {
        log::set_max_level(self.level);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// Nothing changed.
    Idle,
    /// The pressed key changed.
    Key(Option<KeyCode>),
    Quit,
}

/// Maps host keyboard presses to the keypad.
pub struct Keyboard {
    keymap: HashMap<char, KeyCode>,
    hold_frames: u32,
    held: Option<KeyCode>,
    /// Frames left before the held key is released.
    frames_left: u32,
}

impl Keyboard {
    pub fn new(keymap: HashMap<char, KeyCode>, hold_frames: u32) -> Self {
        Self {
            keymap,
            hold_frames,
            held: None,
            frames_left: 0,
        }
    }

    /// Drain pending terminal events. Called once per frame.
    pub fn poll(&mut self) -> io::Result<Poll> {
        let mut pressed = None;

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key_event) = event::read()? {
                match key_event.code {
                    HostKey::Esc => return Ok(Poll::Quit),
                    HostKey::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(Poll::Quit)
                    }
                    HostKey::Char(c) => match self.keymap.get(&c.to_ascii_lowercase()) {
                        Some(key) => pressed = Some(*key),
                        None => debug!("unmapped key {c:?}"),
                    },
                    _ => {}
                }
            }
        }

        Ok(self.update(pressed))
    }

    /// Advance the hold countdown by one frame.
    fn update(&mut self, pressed: Option<KeyCode>) -> Poll {
        match pressed {
            Some(key) => {
                self.frames_left = self.hold_frames;
                if self.held == Some(key) {
                    Poll::Idle
                } else {
                    self.held = Some(key);
                    Poll::Key(Some(key))
                }
            }
            None if self.held.is_some() => {
                self.frames_left = self.frames_left.saturating_sub(1);
                if self.frames_left == 0 {
                    self.held = None;
                    Poll::Key(None)
                } else {
                    Poll::Idle
                }
            }
            None => Poll::Idle,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quiet_log_restores_level() {
        log::set_max_level(LevelFilter::Warn);

        let quiet = QuietLog::new();
        assert_eq!(log::max_level(), LevelFilter::Off);
        assert!(!log::log_enabled!(log::Level::Error));

        drop(quiet);
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_key_released_after_hold_frames() {
        let mut keyboard = Keyboard::new(HashMap::new(), 2);

        assert_eq!(keyboard.update(Some(KeyCode::Key5)), Poll::Key(Some(KeyCode::Key5)));
        assert_eq!(keyboard.update(None), Poll::Idle);
        assert_eq!(keyboard.update(None), Poll::Key(None));
        assert_eq!(keyboard.update(None), Poll::Idle);
    }

    #[test]
    fn test_repeat_press_extends_hold() {
        let mut keyboard = Keyboard::new(HashMap::new(), 2);

        assert_eq!(keyboard.update(Some(KeyCode::KeyA)), Poll::Key(Some(KeyCode::KeyA)));
        assert_eq!(keyboard.update(None), Poll::Idle);
        assert_eq!(keyboard.update(Some(KeyCode::KeyA)), Poll::Idle);
        assert_eq!(keyboard.update(None), Poll::Idle);
        assert_eq!(keyboard.update(None), Poll::Key(None));
    }

    #[test]
    fn test_new_key_replaces_held() {
        let mut keyboard = Keyboard::new(HashMap::new(), 4);

        keyboard.update(Some(KeyCode::Key1));
        assert_eq!(keyboard.update(Some(KeyCode::Key2)), Poll::Key(Some(KeyCode::Key2)));
    }
}
