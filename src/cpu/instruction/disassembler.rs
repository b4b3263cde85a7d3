// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! A disassembler for Chip-8 opcodes
use super::Insn;
use owo_colors::{OwoColorize, Style};

/// Disassembles Chip-8 instructions
pub trait Disassembler {
    /// Disassemble a single instruction
    fn once(&self, insn: u16) -> String;
}

/// Disassembles Chip-8 instructions, printing them in the provided [owo_colors::Style]s
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dis {
    /// Styles invalid instructions
    pub invalid: Style,
    /// Styles valid instructions
    pub normal: Style,
    /// Styles instructions which jump, call, return, or skip
    pub branch: Style,
}

impl Dis {
    /// A disassembler which doesn't style its output at all
    /// # Examples
    /// ```rust
    /// # use trill::prelude::*;
    /// let dis = Dis::plain();
    /// assert!(dis.once(0x6a0f).contains("mov    #0f, vA"));
    /// assert!(dis.once(0x0123).contains("inval  0123"));
    /// ```
    pub fn plain() -> Self {
        Self {
            invalid: Style::new(),
            normal: Style::new(),
            branch: Style::new(),
        }
    }
}

impl Default for Dis {
    fn default() -> Self {
        Self {
            invalid: Style::new().bold().red(),
            normal: Style::new().green(),
            branch: Style::new().bright_cyan(),
        }
    }
}

impl Disassembler for Dis {
    fn once(&self, insn: u16) -> String {
        match Insn::from_word(insn) {
            Some(insn) if insn.is_control_transfer() => format!("{}", insn.style(self.branch)),
            Some(insn) => format!("{}", insn.style(self.normal)),
            None => format!("{}", format!("inval  {insn:04x}").style(self.invalid)),
        }
    }
}
