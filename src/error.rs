// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! Error type for Trill

use std::path::PathBuf;
use thiserror::Error;

/// Result type, equivalent to [std::result::Result]<T, [enum@Error]>
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Trill.
#[derive(Debug, Error)]
pub enum Error {
    /// The ROM file could not be read from disk
    #[error("could not read rom {}: {source}", path.display())]
    RomReadFailure {
        /// The path that was asked for
        path: PathBuf,
        /// What went wrong
        #[source]
        source: std::io::Error,
    },
    /// The ROM does not fit in program memory
    #[error("rom is {len} bytes, but program memory only holds {max}")]
    RomTooLarge {
        /// Size of the offending ROM
        len: usize,
        /// Size of program memory
        max: usize,
    },
    /// Tried to fetch an instruction from outside of memory
    #[error("program counter {pc:04x} is out of bounds")]
    ProgramCounterOutOfBounds {
        /// The offending program counter
        pc: u16,
    },
    /// A call would nest deeper than the stack allows
    #[error("stack overflow at {pc:03x}")]
    StackOverflow {
        /// Address of the offending call
        pc: u16,
    },
    /// A return was issued with nothing on the stack
    #[error("stack underflow at {pc:03x}")]
    StackUnderflow {
        /// Address of the offending return
        pc: u16,
    },
    /// The fetched word is not a Chip-8 instruction
    #[error("opcode {word:04x} not recognized")]
    UnknownOpcode {
        /// The offending word
        word: u16,
    },
    /// Tried to press a key that doesn't exist
    #[error("tried to press key {key:X} which does not exist")]
    InvalidKey {
        /// The offending key
        key: usize,
    },
    /// Tried to get/set an out-of-bounds register
    #[error("tried to access register v{reg:X} which does not exist")]
    InvalidRegister {
        /// The offending register
        reg: usize,
    },
    /// Tried to convert string into an audio sink, but it did not match.
    #[error("no audio sink named \"{name}\"")]
    InvalidAudio {
        /// The string which failed to become an audio sink
        name: String,
    },
    /// The audio sink failed to start or stop a tone
    #[error("audio sink failed: {reason}")]
    Audio {
        /// Whatever the sink reported
        reason: String,
    },
    /// A worker thread panicked instead of returning
    #[error("{thread} thread panicked")]
    ThreadPanicked {
        /// Name of the thread
        thread: &'static str,
    },
    /// Error originated in [std::io]
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Reports whether this error must stop the execution loop.
    ///
    /// Only [Error::UnknownOpcode] is recoverable: the instruction is skipped.
    /// # Examples
    /// ```rust
    /// # use trill::error::Error;
    /// assert!(!Error::UnknownOpcode { word: 0xffff }.is_fatal());
    /// assert!(Error::StackUnderflow { pc: 0x200 }.is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::UnknownOpcode { .. })
    }
}
