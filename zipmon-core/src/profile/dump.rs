//! Annotated disassembly.
//!
//! Walks an instruction image word by word from a base address, decoding each
//! word and, when a profile table is available, attaching its hit count and
//! cycle total.
//!
//! Count columns follow one policy throughout a report:
//! - no profile table: no count columns at all
//! - address inside the table's range: `hits cycles`, zero if never sampled
//! - address outside the table's range: blank columns of the same width

use super::ProfileTable;
use crate::decoder::{Decoder, Mnemonic};
use std::fmt;

/// Width of the `%8d %8d ` count columns.
const COUNT_COLUMNS: usize = 18;
/// Indent of the alternate mnemonic line.
const ALTERNATE_INDENT: usize = 26;

/// Profile annotation for one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counts {
    /// No profile data was supplied.
    Unprofiled,
    /// A profile exists but does not cover this address.
    OutOfRange,
    Sampled { hits: u32, cycles: u64 },
}

/// One decoded instruction in the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLine {
    pub address: u32,
    pub word: u32,
    pub mnemonic: Mnemonic,
    pub counts: Counts,
}

/// The four bytes of `word`, most significant first, as ASCII or `.`.
pub fn ascii(word: u32) -> String {
    word.to_be_bytes()
        .iter()
        .map(|&byte| {
            if byte.is_ascii_graphic() {
                byte as char
            } else {
                '.'
            }
        })
        .collect()
}

impl fmt::Display for DumpLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}: (0x{:08x} {}) ",
            self.address,
            self.word,
            ascii(self.word)
        )?;
        match self.counts {
            Counts::Unprofiled => {}
            Counts::OutOfRange => write!(f, "{:width$}", "", width = COUNT_COLUMNS)?,
            Counts::Sampled { hits, cycles } => write!(f, "{hits:8} {cycles:8} ")?,
        }
        write!(f, "{}", self.mnemonic.primary)?;
        if let Some(alternate) = self.mnemonic.alternate_line() {
            write!(f, "\n{:width$}{alternate}", "", width = ALTERNATE_INDENT)?;
        }
        Ok(())
    }
}

/// Forward-only iterator of [`DumpLine`]s over an instruction stream.
pub struct AnnotatedDump<'a, I, D> {
    words: I,
    address: u32,
    decoder: D,
    table: Option<&'a ProfileTable>,
}

impl<'a, I, D> AnnotatedDump<'a, I, D>
where
    I: Iterator<Item = u32>,
    D: Decoder,
{
    pub fn new<W>(words: W, base_address: u32, decoder: D, table: Option<&'a ProfileTable>) -> Self
    where
        W: IntoIterator<Item = u32, IntoIter = I>,
    {
        Self {
            words: words.into_iter(),
            address: base_address,
            decoder,
            table,
        }
    }

    fn counts(&self, address: u32) -> Counts {
        match self.table {
            None => Counts::Unprofiled,
            Some(table) => match table.get(address) {
                Some(stat) => Counts::Sampled {
                    hits: stat.hit_count,
                    cycles: stat.total_cycles,
                },
                None => Counts::OutOfRange,
            },
        }
    }
}

impl<I, D> Iterator for AnnotatedDump<'_, I, D>
where
    I: Iterator<Item = u32>,
    D: Decoder,
{
    type Item = DumpLine;

    fn next(&mut self) -> Option<DumpLine> {
        let word = self.words.next()?;
        let address = self.address;
        self.address = self.address.wrapping_add(1);

        Some(DumpLine {
            address,
            word,
            mnemonic: self.decoder.decode(word),
            counts: self.counts(address),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.words.size_hint()
    }
}
