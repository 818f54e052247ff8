//! The binary image: the word vector produced by the assembler, its
//! little-endian byte encoding, and the post-halt memory-dump format.

use std::io::{self, Write};

use crate::bus::Bus;

/// An assembled program. Writing past the current end zero-fills the gap,
/// which is how `.org` holes end up in the file.
pub struct Image {
    words: Vec<u16>,
}

impl Image {
    pub fn new() -> Image {
        Image { words: Vec::new() }
    }

    pub fn write(&mut self, address: u16, word: u16) {
        let index = address as usize;
        if index >= self.words.len() {
            self.words.resize(index + 1, 0);
        }
        self.words[index] = word;
    }

    pub fn words(&self) -> &[u16] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.words)
    }
}

/// Little-endian per word: the low byte of each word comes first.
pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        let [low, high] = word.to_le_bytes();
        bytes.push(low);
        bytes.push(high);
    }
    bytes
}

/// Inverse of [`words_to_bytes`]. An odd trailing byte forms a final word
/// with a zero high byte.
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u16> {
    let mut words = Vec::with_capacity(bytes.len().div_ceil(2));
    let mut chunks = bytes.chunks_exact(2);
    for chunk in &mut chunks {
        words.push(u16::from_le_bytes([chunk[0], chunk[1]]));
    }
    if let [low] = chunks.remainder() {
        words.push(*low as u16);
    }
    words
}

/// One line per word address over the whole 64K space, both fields
/// uppercase zero-padded hex: `AAAA VVVV`.
pub fn dump_memory<W: Write>(bus: &Bus, out: &mut W) -> io::Result<()> {
    for address in 0..=u16::MAX {
        writeln!(out, "{:04X} {:04X}", address, bus.peek(address))?;
    }
    Ok(())
}
