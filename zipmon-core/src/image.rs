//! Instruction image loading.
//!
//! An image is a flat file of 32-bit instruction words with no header. A
//! trailing partial word is dropped.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Byte order of words in an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WordOrder {
    #[default]
    Little,
    Big,
}

impl WordOrder {
    pub fn decode(self, bytes: [u8; 4]) -> u32 {
        match self {
            WordOrder::Little => u32::from_le_bytes(bytes),
            WordOrder::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Read every whole word from `reader`.
pub fn read_image<R: Read>(mut reader: R, order: WordOrder) -> io::Result<Vec<u32>> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let chunks = bytes.chunks_exact(4);
    let leftover = chunks.remainder().len();
    let words = chunks
        .map(|chunk| order.decode([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if leftover != 0 {
        warn!("ignoring {leftover} trailing byte(s) after the last whole instruction word");
    }
    Ok(words)
}

/// Load an image file from disk.
pub fn load_image(path: &Path, order: WordOrder) -> io::Result<Vec<u32>> {
    let file = File::open(path)?;
    read_image(BufReader::new(file), order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_image_little_endian() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0x00, 0x00, 0x00, 0x4e];
        let words = read_image(&bytes[..], WordOrder::Little).unwrap();
        assert_eq!(words, vec![0x1234_5678, 0x4e00_0000]);
    }

    #[test]
    fn test_read_image_big_endian_drops_partial_word() {
        let bytes = [0x4e, 0x00, 0x00, 0x00, 0xaa, 0xbb];
        let words = read_image(&bytes[..], WordOrder::Big).unwrap();
        assert_eq!(words, vec![0x4e00_0000]);
    }
}
