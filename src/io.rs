// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! Host-side collaborators: audio sinks, terminal input, and terminal output.
//!
//! None of this is needed to run a [CPU](crate::cpu::CPU) headless.

use crate::{
    error::{Error, Result},
    screen::Screen,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    queue,
    style::Print,
    terminal::{self, Clear, ClearType},
};
use std::{io::Write, str::FromStr, time::Duration};

/// Something that can make (or pretend to make) a continuous tone
pub trait Audio: Send {
    /// Starts the tone
    fn start(&mut self) -> Result<()>;
    /// Stops the tone
    fn stop(&mut self) -> Result<()>;
}

/// Makes no noise at all
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mute;

impl Audio for Mute {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Rings the terminal bell when a tone starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bell;

impl Audio for Bell {
    fn start(&mut self) -> Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drives the PC speaker through the `beep` crate
#[cfg(feature = "beep")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Beeper {
    /// Pitch of the tone, in Hz
    pub pitch: u16,
}

#[cfg(feature = "beep")]
impl Default for Beeper {
    fn default() -> Self {
        // A4
        Beeper { pitch: 440 }
    }
}

#[cfg(feature = "beep")]
impl Audio for Beeper {
    fn start(&mut self) -> Result<()> {
        beep::beep(self.pitch).map_err(|e| Error::Audio {
            reason: e.to_string(),
        })
    }
    fn stop(&mut self) -> Result<()> {
        beep::beep(0).map_err(|e| Error::Audio {
            reason: e.to_string(),
        })
    }
}

/// Selects an [Audio] sink by name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AudioKind {
    /// [Mute]
    Mute,
    /// [Bell]
    #[default]
    Bell,
    /// `Beeper`, if built with the `beep` feature
    Beep,
}

impl AudioKind {
    /// Builds the selected sink
    pub fn build(self) -> Box<dyn Audio> {
        match self {
            AudioKind::Mute => Box::new(Mute),
            AudioKind::Bell => Box::new(Bell),
            #[cfg(feature = "beep")]
            AudioKind::Beep => Box::<Beeper>::default(),
            #[cfg(not(feature = "beep"))]
            AudioKind::Beep => {
                tracing::warn!("built without the `beep` feature, using the terminal bell");
                Box::new(Bell)
            }
        }
    }
}

impl FromStr for AudioKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mute" | "none" => Ok(AudioKind::Mute),
            "bell" => Ok(AudioKind::Bell),
            "beep" | "speaker" => Ok(AudioKind::Beep),
            _ => Err(Error::InvalidAudio {
                name: s.to_string(),
            }),
        }
    }
}

/// Maps a typed character onto a Chip-8 key: `0`-`9` and `a`-`f`, either case
/// # Examples
/// ```rust
/// # use trill::io::identify_key;
/// assert_eq!(Some(0xb), identify_key('B'));
/// assert_eq!(Some(0x7), identify_key('7'));
/// assert_eq!(None, identify_key('g'));
/// ```
pub fn identify_key(key: char) -> Option<usize> {
    key.to_digit(16).map(|key| key as usize)
}

/// Latches key presses for a number of frames.
///
/// Terminals report key presses (and repeats) but never releases, so a key
/// counts as held until `hold` frames pass without it being typed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Keypad {
    held: [u8; 16],
    hold: u8,
}

impl Keypad {
    /// Creates a keypad with nothing held
    pub fn new(hold: u8) -> Self {
        Keypad {
            held: [0; 16],
            hold: hold.max(1),
        }
    }

    /// Presses a key, restarting its latch.
    /// If key does not exist, returns [Error::InvalidKey].
    pub fn press(&mut self, key: usize) -> Result<()> {
        let hold = self.hold;
        *self.held.get_mut(key).ok_or(Error::InvalidKey { key })? = hold;
        Ok(())
    }

    /// Ages every latch by one frame
    pub fn frame(&mut self) {
        self.held
            .iter_mut()
            .for_each(|frames| *frames = frames.saturating_sub(1));
    }

    /// Gets the state of every key
    pub fn keys(&self) -> [bool; 16] {
        self.held.map(|frames| frames > 0)
    }
}

impl Default for Keypad {
    fn default() -> Self {
        // ~100ms at 60 fps
        Self::new(6)
    }
}

/// Reads the keypad from the terminal, in raw mode.
///
/// Esc and Ctrl-C request a shutdown.
#[derive(Debug)]
pub struct TerminalKeys {
    keypad: Keypad,
}

impl TerminalKeys {
    /// Puts the terminal into raw mode. It's restored when this is dropped.
    pub fn new(keypad: Keypad) -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(TerminalKeys { keypad })
    }

    /// Drains pending terminal events, and ages the latches by one frame.
    ///
    /// Returns [None] if the user asked to quit, else the state of every key.
    pub fn poll(&mut self) -> Result<Option<[bool; 16]>> {
        self.keypad.frame();
        while event::poll(Duration::ZERO)? {
            if let Event::Key(KeyEvent {
                code, modifiers, ..
            }) = event::read()?
            {
                match code {
                    KeyCode::Esc => return Ok(None),
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(None)
                    }
                    KeyCode::Char(c) => {
                        if let Some(key) = identify_key(c) {
                            self.keypad.press(key)?;
                        }
                    }
                    _ => (),
                }
            }
        }
        Ok(Some(self.keypad.keys()))
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        terminal::disable_raw_mode().ok();
    }
}

/// Redraws a [Screen] in place on a terminal.
///
/// Frames identical to the last one presented are skipped.
#[derive(Debug)]
pub struct TerminalPresenter<W: Write> {
    out: W,
    last: Option<Screen>,
    braille: bool,
}

impl<W: Write> TerminalPresenter<W> {
    /// Clears the terminal and hides the cursor
    pub fn new(mut out: W) -> Result<Self> {
        queue!(out, Hide, Clear(ClearType::All))?;
        out.flush()?;
        Ok(TerminalPresenter {
            out,
            last: None,
            braille: false,
        })
    }

    /// Draws with braille characters instead of one block per pixel.
    /// Needs the `drawille` feature.
    pub fn with_braille(mut self, braille: bool) -> Self {
        if braille && cfg!(not(feature = "drawille")) {
            tracing::warn!("built without the `drawille` feature, drawing with blocks");
        }
        self.braille = braille;
        self
    }

    fn render(&self, screen: &Screen) -> String {
        #[cfg(feature = "drawille")]
        if self.braille {
            return screen.braille();
        }
        screen.to_string()
    }

    /// Draws the screen, if it changed since the last call.
    ///
    /// Returns true if anything was drawn
    pub fn present(&mut self, screen: &Screen) -> Result<bool> {
        if self.last.as_ref() == Some(screen) {
            return Ok(false);
        }
        queue!(self.out, MoveTo(0, 0))?;
        // raw mode doesn't translate \n into \r\n for us
        for line in self.render(screen).lines() {
            queue!(
                self.out,
                Print(line),
                Clear(ClearType::UntilNewLine),
                Print("\r\n")
            )?;
        }
        self.out.flush()?;
        self.last = Some(*screen);
        Ok(true)
    }

    /// Gets the writer back, showing the cursor again
    pub fn into_inner(mut self) -> Result<W> {
        queue!(self.out, Show)?;
        self.out.flush()?;
        Ok(self.out)
    }
}
