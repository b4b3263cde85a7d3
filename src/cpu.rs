// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! Decodes and runs instructions


pub mod behavior;
pub mod flags;
pub mod instruction;
pub mod mem;
pub mod timers;

use self::{
    flags::Flags,
    instruction::disassembler::{Dis, Disassembler},
    mem::{Mem, Region::*, MEM_SIZE},
    timers::Timers,
};
use crate::{
    error::{Error, Result},
    screen::Screen,
};
use owo_colors::OwoColorize;
use rand::{rngs::StdRng, SeedableRng};
use std::{fmt::Debug, path::Path};
use tracing::{debug, trace, warn};

type Reg = usize;
type Adr = u16;
type Nib = u8;

/// Where execution begins
pub const START: Adr = 0x200;
/// How many return addresses the stack can hold
pub const STACK_SIZE: usize = 16;

/// Represents the internal state of the CPU interpreter
pub struct CPU {
    /// Flags that control how the CPU behaves, but which aren't inherent to the
    /// chip-8. Includes live disassembly, and whether the CPU is waiting on a key.
    pub flags: Flags,
    // memory
    mem: Mem,
    stack: [Adr; STACK_SIZE],
    sp: usize,
    // registers
    pc: Adr,
    i: Adr,
    v: [u8; 16],
    timers: Timers,
    // I/O
    keys: [bool; 16],
    // Execution data
    cycle: usize,
    rng: StdRng,
    disassembler: Dis,
}

// public interface
impl CPU {
    /// Constructs a new CPU whose random numbers are reproducible
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let (mut a, mut b) = (CPU::with_seed(10), CPU::with_seed(10));
    /// let (mut sa, mut sb) = (Screen::new(), Screen::new());
    /// // rand #ff, v0
    /// a.execute(&mut sa, 0xc0ff).unwrap();
    /// b.execute(&mut sb, 0xc0ff).unwrap();
    /// assert_eq!(a.v(), b.v());
    /// ```
    pub fn with_seed(seed: u64) -> Self {
        CPU {
            rng: StdRng::seed_from_u64(seed),
            ..Default::default()
        }
    }

    /// Loads a program from disk into the CPU's program space
    pub fn load_program(&mut self, rom: impl AsRef<Path>) -> Result<&mut Self> {
        let path = rom.as_ref();
        let rom = std::fs::read(path).map_err(|source| Error::RomReadFailure {
            path: path.to_owned(),
            source,
        })?;
        self.load_program_bytes(&rom)?;
        debug!("loaded {} bytes from {}", rom.len(), path.display());
        Ok(self)
    }

    /// Loads bytes into the CPU's program space, clearing anything already there.
    ///
    /// Returns [Error::RomTooLarge] if the program doesn't fit, leaving memory untouched
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// cpu.load_program_bytes(&[0x6a, 0x0f]).unwrap();
    /// assert_eq!(0x6a, cpu.mem().read(0x200));
    /// assert!(cpu.load_program_bytes(&[0; 0x1000]).is_err());
    /// ```
    pub fn load_program_bytes(&mut self, rom: &[u8]) -> Result<&mut Self> {
        let max = Program.range().len();
        if rom.len() > max {
            return Err(Error::RomTooLarge { len: rom.len(), max });
        }
        self.mem.clear_region(Program);
        self.mem.load_region(Program, rom)?;
        Ok(self)
    }

    /// Presses a key, and reports whether the key's state changed.
    /// If key does not exist, returns [Error::InvalidKey].
    ///
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    ///
    /// // press key `7`
    /// let did_press = cpu.press(0x7).unwrap();
    /// assert!(did_press);
    ///
    /// // press key `7` again, even though it's already pressed
    /// let did_press = cpu.press(0x7).unwrap();
    /// // it was already pressed, so nothing's changed.
    /// assert!(!did_press);
    /// ```
    pub fn press(&mut self, key: usize) -> Result<bool> {
        let keyref = self.keys.get_mut(key).ok_or(Error::InvalidKey { key })?;
        Ok(!std::mem::replace(keyref, true))
    }

    /// Releases a key, and reports whether the key's state changed.
    /// If key is outside range `0..=0xF`, returns [Error::InvalidKey].
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// // press key `7`
    /// cpu.press(0x7).unwrap();
    /// // release key `7`
    /// let changed = cpu.release(0x7).unwrap();
    /// assert!(changed); // key released
    /// // try releasing `7` again
    /// let changed = cpu.release(0x7).unwrap();
    /// assert!(!changed); // key was not held
    /// ```
    pub fn release(&mut self, key: usize) -> Result<bool> {
        let keyref = self.keys.get_mut(key).ok_or(Error::InvalidKey { key })?;
        Ok(std::mem::replace(keyref, false))
    }

    /// Replaces the state of the whole keypad
    pub fn set_keys(&mut self, keys: [bool; 16]) {
        self.keys = keys;
    }

    /// Gets the state of the whole keypad
    pub fn keys(&self) -> &[bool; 16] {
        &self.keys
    }

    /// Sets a general purpose register in the CPU.
    /// If the register doesn't exist, returns [Error::InvalidRegister]
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// // Create a new CPU, and set v4 to 0x41
    /// let mut cpu = CPU::default();
    /// cpu.set_v(0x4, 0x41).unwrap();
    /// assert_eq!(0x41, cpu.v()[4]);
    /// assert!(cpu.set_v(0x10, 0).is_err());
    /// ```
    pub fn set_v(&mut self, reg: Reg, value: u8) -> Result<()> {
        *self.v.get_mut(reg).ok_or(Error::InvalidRegister { reg })? = value;
        Ok(())
    }

    /// Gets a slice of the entire general purpose registers
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// cpu.set_v(0x0, 0x41).unwrap();
    /// assert_eq!(
    ///     cpu.v(),
    ///     [0x41, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
    /// )
    /// ```
    pub fn v(&self) -> &[u8] {
        self.v.as_slice()
    }

    /// Gets the program counter
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let cpu = CPU::default();
    /// assert_eq!(0x200, cpu.pc());
    /// ```
    pub fn pc(&self) -> Adr {
        self.pc
    }

    /// Gets the I register
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let cpu = CPU::default();
    /// assert_eq!(0, cpu.i());
    /// ```
    pub fn i(&self) -> Adr {
        self.i
    }

    /// Gets the stack pointer: the number of return addresses on the stack
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Gets the return addresses currently on the stack, oldest first
    pub fn stack(&self) -> &[Adr] {
        &self.stack[..self.sp]
    }

    /// Gets the value in the Sound Timer register
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let cpu = CPU::default();
    /// assert_eq!(0, cpu.sound());
    /// ```
    pub fn sound(&self) -> u8 {
        self.timers.sound()
    }

    /// Gets the value in the Delay Timer register
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let cpu = CPU::default();
    /// assert_eq!(0, cpu.delay());
    /// ```
    pub fn delay(&self) -> u8 {
        self.timers.delay()
    }

    /// Gets the handle to the delay and sound timers, which count down
    /// independently of the CPU. Clone it to give it to a
    /// [TimerService](timers::TimerService).
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Gets the CPU's memory
    pub fn mem(&self) -> &Mem {
        &self.mem
    }

    /// Gets the number of cycles the CPU has executed
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let cpu = CPU::default();
    /// assert_eq!(0x0, cpu.cycle());
    /// ```
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Resets the CPU to the state it had when constructed.
    ///
    /// Clears the memory (including the program), stack, registers, timers,
    /// keys, and cycle count. Does not touch [Flags::debug], or the random number generator.
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// cpu.load_program_bytes(&[0x12, 0x02]).unwrap();
    /// cpu.step(&mut Screen::new()).unwrap();
    /// assert_eq!(0x202, cpu.pc());
    /// cpu.reset();
    /// assert_eq!(0x200, cpu.pc());
    /// assert_eq!(0, cpu.mem().read(0x200));
    /// ```
    pub fn reset(&mut self) {
        self.flags = Flags {
            keypause: false,
            ..self.flags
        };
        self.mem = Mem::new();
        self.stack = [0; STACK_SIZE];
        self.sp = 0;
        self.pc = START;
        self.i = 0;
        self.v = [0; 16];
        self.timers.reset();
        self.keys = [false; 16];
        self.cycle = 0;
    }

    /// Reads the instruction word at the program counter, and advances past it.
    ///
    /// Returns [Error::ProgramCounterOutOfBounds] if the word isn't entirely in memory
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// cpu.load_program_bytes(&[0x6a, 0x0f]).unwrap();
    /// assert_eq!(0x6a0f, cpu.fetch().unwrap());
    /// assert_eq!(0x202, cpu.pc());
    /// ```
    pub fn fetch(&mut self) -> Result<u16> {
        let pc = self.pc;
        if pc as usize + 1 >= MEM_SIZE {
            return Err(Error::ProgramCounterOutOfBounds { pc });
        }
        let word = u16::from_be_bytes([self.mem.read(pc), self.mem.read(pc + 1)]);
        self.pc = pc + 2;
        Ok(word)
    }

    /// Fetches and executes a single instruction
    ///
    /// Unknown opcodes are logged and skipped.
    /// Returns any other error, which leaves the CPU unable to continue.
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// let mut screen = Screen::new();
    /// cpu.load_program_bytes(&[
    ///     0x00, 0xe0, // cls
    ///     0x12, 0x02, // jmp 202 (pc)
    /// ]).unwrap();
    /// cpu.step(&mut screen)
    ///     .expect("0x00e0 (cls) should be a valid opcode.");
    /// assert_eq!(0x202, cpu.pc());
    /// assert_eq!(1, cpu.cycle());
    /// ```
    /// Unknown instructions are skipped
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// let mut screen = Screen::new();
    /// cpu.load_program_bytes(&[
    ///     0xff, 0xff, // invalid!
    ///     0x12, 0x02, // jmp 202 (pc)
    /// ]).unwrap();
    /// cpu.step(&mut screen).unwrap();
    /// assert_eq!(0x202, cpu.pc());
    /// ```
    pub fn step(&mut self, screen: &mut Screen) -> Result<&mut Self> {
        self.cycle += 1;
        let pc = self.pc;
        let word = self.fetch()?;
        if self.flags.debug {
            trace!(
                "{:3} {:03x}: {:<36}",
                self.cycle.bright_black(),
                pc,
                self.disassembler.once(word)
            );
        }
        match self.execute(screen, word) {
            Err(e) if !e.is_fatal() => warn!("{e} at {pc:03x}"),
            result => result?,
        }
        Ok(self)
    }

    /// Executes `steps` instructions, stopping early on a fatal error
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut cpu = CPU::default();
    /// let mut screen = Screen::new();
    /// cpu.load_program_bytes(&[
    ///     0x00, 0xe0, // cls
    ///     0x12, 0x02, // jmp 202 (pc)
    /// ]).unwrap();
    /// cpu.multistep(&mut screen, 0x20)
    ///     .expect("The program should only have valid opcodes.");
    /// assert_eq!(0x202, cpu.pc());
    /// assert_eq!(0x20, cpu.cycle());
    /// ```
    pub fn multistep(&mut self, screen: &mut Screen, steps: usize) -> Result<&mut Self> {
        for _ in 0..steps {
            self.step(screen)?;
        }
        Ok(self)
    }

    /// Dumps the current state of all CPU registers, and the cycle count
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let cpu = CPU::default();
    /// println!("{}", cpu.dump());
    /// ```
    /// outputs
    /// ```text
    /// PC: 0200, SP: 00, I: 0000
    /// v0: 00 v1: 00 v2: 00 v3: 00
    /// v4: 00 v5: 00 v6: 00 v7: 00
    /// v8: 00 v9: 00 vA: 00 vB: 00
    /// vC: 00 vD: 00 vE: 00 vF: 00
    /// DLY: 0, SND: 0, CYC:      0
    /// ```
    pub fn dump(&self) -> String {
        format!(
            "PC: {:04x}, SP: {:02x}, I: {:04x}\n{}DLY: {}, SND: {}, CYC: {:6}",
            self.pc,
            self.sp,
            self.i,
            self.v
                .into_iter()
                .enumerate()
                .map(|(i, gpr)| {
                    format!(
                        "v{i:X}: {gpr:02x}{}",
                        match i % 4 {
                            3 => "\n",
                            _ => " ",
                        }
                    )
                })
                .collect::<String>(),
            self.delay(),
            self.sound(),
            self.cycle,
        )
    }
}

impl Debug for CPU {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CPU")
            .field("flags", &self.flags)
            .field("stack", &self.stack())
            .field("pc", &self.pc)
            .field("i", &self.i)
            .field("v", &self.v)
            .field("timers", &self.timers)
            .field("keys", &self.keys)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl Default for CPU {
    /// Constructs a new CPU, with the font loaded, and random numbers seeded by the OS
    ///
    /// | value  | default | description
    /// |--------|---------|------------
    /// | font   |`0x0000` | Location of font memory.
    /// | pc     |`0x0200` | Start location.
    ///
    /// # Examples
    /// ```rust
    /// use trill::prelude::*;
    /// let cpu = CPU::default();
    /// assert_eq!(0xf0, cpu.mem().read(0));
    /// ```
    fn default() -> Self {
        CPU {
            flags: Flags::default(),
            mem: Mem::new(),
            stack: [0; STACK_SIZE],
            sp: 0,
            pc: START,
            i: 0,
            v: [0; 16],
            timers: Timers::new(),
            keys: [false; 16],
            cycle: 0,
            rng: StdRng::from_entropy(),
            disassembler: Dis::default(),
        }
    }
}
