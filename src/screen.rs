// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! Stores and displays the Chip-8's screen memory

use std::fmt::{Display, Formatter, Result};

/// Width of the display, in pixels
pub const WIDTH: usize = 64;
/// Height of the display, in pixels
pub const HEIGHT: usize = 32;

/// The 64x32 monochrome display.
///
/// Each row is packed into a [u64], with the leftmost pixel in the high bit.
/// Screens are [Copy], so the host can take a whole snapshot at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Screen {
    rows: [u64; HEIGHT],
}

impl Screen {
    /// Creates a blank screen
    pub fn new() -> Self {
        Screen { rows: [0; HEIGHT] }
    }

    /// Sets every pixel to off
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut screen = Screen::new();
    /// screen.toggle(3, 4);
    /// screen.clear();
    /// assert!(screen.is_blank());
    /// ```
    pub fn clear(&mut self) {
        self.rows = [0; HEIGHT];
    }

    /// Gets the pixel at (x, y). Coordinates wrap.
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.rows[y % HEIGHT] & Self::mask(x) != 0
    }

    /// XORs the pixel at (x, y), coordinates wrapping.
    ///
    /// Returns true if the pixel was turned *off* (a collision)
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut screen = Screen::new();
    /// assert!(!screen.toggle(64, 32)); // wraps to (0, 0), which turns on
    /// assert!(screen.get(0, 0));
    /// assert!(screen.toggle(0, 0)); // and off again
    /// ```
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let (row, mask) = (&mut self.rows[y % HEIGHT], Self::mask(x));
        let was_set = *row & mask != 0;
        *row ^= mask;
        was_set
    }

    /// Returns true if no pixel is lit
    pub fn is_blank(&self) -> bool {
        self.rows.iter().all(|&row| row == 0)
    }

    /// Gets the packed rows of the screen, top to bottom
    pub fn rows(&self) -> &[u64; HEIGHT] {
        &self.rows
    }

    /// Iterates over the lit pixels, as (x, y) coordinates
    pub fn lit(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..HEIGHT).flat_map(move |y| (0..WIDTH).filter_map(move |x| self.get(x, y).then_some((x, y))))
    }

    /// Renders the screen in braille, with each character holding 2x4 pixels
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let mut screen = Screen::new();
    /// screen.toggle(0, 0);
    /// assert!(screen.braille().starts_with('⠁'));
    /// ```
    #[cfg(feature = "drawille")]
    pub fn braille(&self) -> String {
        use drawille::Canvas;
        let mut canvas = Canvas::new(WIDTH as u32, HEIGHT as u32);
        self.lit()
            .for_each(|(x, y)| canvas.set(x as u32, y as u32));
        canvas.frame()
    }

    #[inline(always)]
    fn mask(x: usize) -> u64 {
        0x8000_0000_0000_0000 >> (x % WIDTH)
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Screen {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for row in self.rows {
            writeln!(
                f,
                "{}",
                format!("{row:064b}").replace('0', " ").replace('1', "█")
            )?;
        }
        Ok(())
    }
}
