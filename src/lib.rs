// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

#![warn(missing_docs)]
//! This crate implements a Chip-8 virtual machine as if it were a real CPU architecture.
//!
//! The [CPU](cpu::CPU) runs on one thread, while the delay and sound timers count
//! down on another, at 60Hz. A [Machine](machine::Machine) runs both, and trades
//! [Screen](screen::Screen) snapshots and keypad states with the host.

pub mod cpu;
pub mod error;
pub mod io;
pub mod machine;
pub mod screen;

/// Holds the state of a Chip-8: its [CPU](cpu::CPU), and its [Screen](screen::Screen)
#[derive(Debug, Default)]
pub struct Chip8 {
    /// Contains the registers, memory, and timers
    pub cpu: cpu::CPU,
    /// Contains the display
    pub screen: screen::Screen,
}

impl Chip8 {
    /// Creates a new Chip-8, with `rom` loaded into program memory
    pub fn new(rom: impl AsRef<std::path::Path>) -> error::Result<Self> {
        let mut chip8 = Self::default();
        chip8.cpu.load_program(rom)?;
        Ok(chip8)
    }

    /// Resets the CPU and blanks the screen
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.screen.clear();
    }

    /// Fetches and executes a single instruction
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut ch8 = Chip8::default();
    /// // mov $000, I ; draw #5, v0, v0
    /// ch8.cpu.load_program_bytes(&[0xa0, 0x00, 0xd0, 0x05]).unwrap();
    /// ch8.step().unwrap().step().unwrap();
    /// assert!(!ch8.screen.is_blank());
    /// ```
    pub fn step(&mut self) -> error::Result<&mut Self> {
        self.cpu.step(&mut self.screen)?;
        Ok(self)
    }
}

/// Common imports for trill
pub mod prelude {
    pub use super::Chip8;
    use super::*;
    pub use cpu::{
        flags::Flags,
        instruction::{
            disassembler::{Dis, Disassembler},
            Insn,
        },
        mem::{Mem, Region::*, CHARSET},
        timers::{TimerService, Timers, Tone},
        CPU,
    };
    pub use error::{Error, Result};
    pub use io::*;
    pub use machine::{Exit, Machine, Pacing, Shutdown};
    pub use screen::Screen;
}
