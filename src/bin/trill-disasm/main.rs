// (c) 2023 John A. Breaux
// This code is licensed under MIT license (see LICENSE for details)

//! Lists the instructions in a Chip-8 ROM

use gumdrop::*;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use trill::{error::Error, prelude::*};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Options, Hash)]
struct Arguments {
    #[options(help = "Show help text")]
    help: bool,
    #[options(help = "Load a ROM to disassemble", free, required)]
    pub file: PathBuf,
    #[options(help = "Load address (default 200)", parse(try_from_str = "parse_hex"))]
    pub loadaddr: u16,
    #[options(help = "Start disassembling at offset...")]
    pub offset: usize,
    #[options(help = "Don't color the output")]
    pub plain: bool,
}

fn parse_hex(value: &str) -> std::result::Result<u16, std::num::ParseIntError> {
    u16::from_str_radix(value, 16)
}

fn main() -> Result<()> {
    let options = Arguments::parse_args_default_or_exit();
    let contents = std::fs::read(&options.file).map_err(|source| Error::RomReadFailure {
        path: options.file.clone(),
        source,
    })?;
    let disassembler = match options.plain {
        true => Dis::plain(),
        false => Dis::default(),
    };
    let base = match options.loadaddr {
        0 => 0x200,
        addr => addr as usize,
    } + options.offset;
    let contents = contents.get(options.offset..).unwrap_or_default();
    for line in listing(contents, base, &disassembler, options.plain) {
        println!("{line}");
    }
    Ok(())
}

/// Disassembles `contents` as if loaded at `base`, one line per word.
/// A trailing odd byte is listed as data.
fn listing(contents: &[u8], base: usize, dis: &Dis, plain: bool) -> Vec<String> {
    let words = contents.chunks_exact(2);
    let tail = words.remainder();
    let mut lines: Vec<String> = words
        .enumerate()
        .map(|(index, insn)| {
            let insn = u16::from_be_bytes([insn[0], insn[1]]);
            let addr = 2 * index + base;
            match plain {
                true => format!("{addr:03x}: {} {insn:04x}", dis.once(insn)),
                false => format!("{addr:03x}: {} {:04x}", dis.once(insn), insn.bright_black()),
            }
        })
        .collect();
    if let [byte] = tail {
        let addr = base + contents.len() - 1;
        lines.push(format!("{addr:03x}: db     #{byte:02x}"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_word() {
        let lines = listing(&[0x00, 0xe0, 0x12, 0x00], 0x200, &Dis::plain(), true);
        assert_eq!(2, lines.len());
        assert!(lines[0].starts_with("200: ") && lines[0].ends_with(" 00e0"));
        assert!(lines[1].starts_with("202: ") && lines[1].contains("jmp    200"));
    }

    #[test]
    fn odd_byte_is_data() {
        let lines = listing(&[0x6a, 0x0f, 0xab], 0x200, &Dis::plain(), true);
        assert_eq!(2, lines.len());
        assert_eq!("202: db     #ab", lines[1]);
    }

    #[test]
    fn empty_rom() {
        assert!(listing(&[], 0x200, &Dis::plain(), true).is_empty());
        assert_eq!(vec!["300: db     #ff"], listing(&[0xff], 0x300, &Dis::plain(), true));
    }
}
