// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP

use byteorder::{BigEndian, ByteOrder};

use crate::{error::DecodeError, frame::PROTOCOL_ID};

pub type TransactionId = u16;

/// Size of the MBAP header in bytes.
pub const HEADER_LEN: usize = 6;

/// The MBAP header preceding every PDU on the wire.
///
/// ```text
/// +----------------+-------------+--------+
/// | transaction id | protocol id | length |
/// |    2 bytes     |   2 bytes   | 2 bytes|
/// +----------------+-------------+--------+
/// ```
///
/// `length` counts every byte that follows the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AduHeader {
    buf: [u8; HEADER_LEN],
}

impl Default for AduHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[u8; HEADER_LEN]> for AduHeader {
    fn from(buf: [u8; HEADER_LEN]) -> Self {
        Self { buf }
    }
}

impl AduHeader {
    #[must_use]
    pub fn new() -> Self {
        let mut buf = [0; HEADER_LEN];
        BigEndian::write_u16(&mut buf[2..4], PROTOCOL_ID);
        Self { buf }
    }

    /// Take over a header that has been read from the wire.
    pub fn unpack(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::BufferSize);
        }
        let mut buf = [0; HEADER_LEN];
        buf.copy_from_slice(&bytes[..HEADER_LEN]);
        Ok(Self { buf })
    }

    #[must_use]
    pub const fn pack(&self) -> [u8; HEADER_LEN] {
        self.buf
    }

    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        BigEndian::read_u16(&self.buf[0..2])
    }

    #[must_use]
    pub fn protocol_id(&self) -> u16 {
        BigEndian::read_u16(&self.buf[2..4])
    }

    /// Number of bytes following the header.
    #[must_use]
    pub fn pdu_len(&self) -> usize {
        BigEndian::read_u16(&self.buf[4..6]) as usize
    }

    /// Prepare the header for the next request.
    ///
    /// The transaction id is incremented (wrapping) and the length field
    /// is set to `pdu_size`.
    pub fn update(&mut self, pdu_size: u16) -> [u8; HEADER_LEN] {
        let transaction_id = self.transaction_id().wrapping_add(1);
        BigEndian::write_u16(&mut self.buf[0..2], transaction_id);
        BigEndian::write_u16(&mut self.buf[4..6], pdu_size);
        self.buf
    }

    #[cfg(test)]
    pub(crate) fn with_transaction_id(transaction_id: TransactionId) -> Self {
        let mut hdr = Self::new();
        BigEndian::write_u16(&mut hdr.buf[0..2], transaction_id);
        hdr
    }
}
