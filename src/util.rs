// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common helpers

use byteorder::{BigEndian, ByteOrder};

use crate::frame::Word;

/// The most significant byte of a word.
pub const fn byte_high(word: Word) -> u8 {
    (word >> 8) as u8
}

/// The least significant byte of a word.
pub const fn byte_low(word: Word) -> u8 {
    (word & 0xFF) as u8
}

/// Combine two bytes into a big-endian word.
pub const fn to_word(high: u8, low: u8) -> Word {
    ((high as u16) << 8) | low as u16
}

/// Pack registers into a big-endian byte buffer.
pub fn registers_to_bytes(registers: &[Word]) -> Vec<u8> {
    let mut bytes = vec![0; registers.len() * 2];
    BigEndian::write_u16_into(registers, &mut bytes);
    bytes
}

/// Unpack big-endian byte pairs into registers.
///
/// A trailing odd byte is ignored.
pub fn bytes_to_registers(bytes: &[u8]) -> Vec<Word> {
    let mut registers = vec![0; bytes.len() / 2];
    BigEndian::read_u16_into(&bytes[..registers.len() * 2], &mut registers);
    registers
}

/// Format bytes as upper case hex pairs for frame logging.
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
