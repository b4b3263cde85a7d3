// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! The Mem represents the CPU's memory
//!
//! Contains some handy utils for reading and writing

use crate::error::{Error, Result};
use std::{
    fmt::{Debug, Display, Formatter},
    ops::Range,
    slice::SliceIndex,
};

/// Size of the Chip-8 address space, in bytes
pub const MEM_SIZE: usize = 0x1000;

/// The built-in hexadecimal font, five bytes per glyph
#[rustfmt::skip]
pub const CHARSET: [u8; 80] = [
    0xf0, 0x90, 0x90, 0x90, 0xf0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xf0, 0x10, 0xf0, 0x80, 0xf0, // 2
    0xf0, 0x10, 0xf0, 0x10, 0xf0, // 3
    0x90, 0x90, 0xf0, 0x10, 0x10, // 4
    0xf0, 0x80, 0xf0, 0x10, 0xf0, // 5
    0xf0, 0x80, 0xf0, 0x90, 0xf0, // 6
    0xf0, 0x10, 0x20, 0x40, 0x40, // 7
    0xf0, 0x90, 0xf0, 0x90, 0xf0, // 8
    0xf0, 0x90, 0xf0, 0x10, 0xf0, // 9
    0xf0, 0x90, 0xf0, 0x90, 0x90, // A
    0xe0, 0x90, 0xe0, 0x90, 0xe0, // B
    0xf0, 0x80, 0x80, 0x80, 0xf0, // C
    0xe0, 0x90, 0x90, 0x90, 0xe0, // D
    0xf0, 0x80, 0xf0, 0x80, 0xf0, // E
    0xf0, 0x80, 0xf0, 0x80, 0x80, // F
];

/// Represents a named region in memory
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Region {
    /// Character ROM (but writable!)
    Charset,
    /// Program memory
    Program,
}

impl Region {
    /// The address range this region occupies
    pub fn range(self) -> Range<usize> {
        match self {
            Region::Charset => 0x000..CHARSET.len(),
            Region::Program => 0x200..MEM_SIZE,
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Region::Charset => "Charset",
                Region::Program => "Program",
            }
        )
    }
}

/// The 4 KiB of memory a Chip-8 program sees
#[derive(Clone, PartialEq, Eq)]
pub struct Mem {
    memory: [u8; MEM_SIZE],
}

impl Mem {
    /// Constructs a new mem, with the charset loaded and everything else zeroed
    /// # Examples
    /// ```rust
    ///# use trill::prelude::*;
    ///     let mem = Mem::new();
    ///     assert_eq!(Some(CHARSET.as_slice()), mem.get_region(Charset));
    /// ```
    pub fn new() -> Self {
        let mut mem = Mem {
            memory: [0; MEM_SIZE],
        };
        mem.memory[Region::Charset.range()].copy_from_slice(&CHARSET);
        mem
    }

    /// Gets the length of the mem' backing memory
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Because clippy is so kind:
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Gets a slice of [Mem] memory
    #[inline(always)]
    pub fn get<I>(&self, index: I) -> Option<&<I as SliceIndex<[u8]>>::Output>
    where
        I: SliceIndex<[u8]>,
    {
        self.memory.get(index)
    }

    /// Gets a mutable slice of [Mem] memory
    #[inline(always)]
    pub fn get_mut<I>(&mut self, index: I) -> Option<&mut <I as SliceIndex<[u8]>>::Output>
    where
        I: SliceIndex<[u8]>,
    {
        self.memory.get_mut(index)
    }

    /// Reads the byte at `addr`, wrapping around the 12-bit address space
    #[inline(always)]
    pub fn read(&self, addr: u16) -> u8 {
        self.memory[addr as usize % MEM_SIZE]
    }

    /// Writes `data` to `addr`, wrapping around the 12-bit address space
    #[inline(always)]
    pub fn write(&mut self, addr: u16, data: u8) {
        self.memory[addr as usize % MEM_SIZE] = data;
    }

    /// Loads data into a named [Region], starting at the bottom of the region
    ///
    /// Returns [Error::RomTooLarge] if the data doesn't fit
    /// # Examples
    /// ```rust
    ///# use trill::prelude::*;
    ///# fn main() -> Result<()> {
    ///     let mut mem = Mem::new();
    ///     mem.load_region(Program, b"Hello, world!")?;
    ///     assert_eq!(Some(b"Hello".as_slice()), mem.get(0x200..0x205));
    ///#    Ok(())
    ///# }
    /// ```
    pub fn load_region(&mut self, name: Region, data: &[u8]) -> Result<&mut Self> {
        let region = self.get_region_mut(name);
        if data.len() > region.len() {
            return Err(Error::RomTooLarge {
                len: data.len(),
                max: region.len(),
            });
        }
        region[..data.len()].copy_from_slice(data);
        Ok(self)
    }

    /// Fills a [Region] with zeroes
    pub fn clear_region(&mut self, name: Region) -> &mut Self {
        self.get_region_mut(name).fill(0);
        self
    }

    /// Gets a slice of a named [Region] of memory
    #[inline(always)]
    pub fn get_region(&self, name: Region) -> Option<&[u8]> {
        self.get(name.range())
    }

    /// Gets a mutable slice of a named region of memory
    #[inline(always)]
    fn get_region_mut(&mut self, name: Region) -> &mut [u8] {
        &mut self.memory[name.range()]
    }
}

impl Default for Mem {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Mem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mem")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
