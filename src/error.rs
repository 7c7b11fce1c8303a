// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;

use thiserror::Error;

use crate::frame::ExceptionResponse;

/// A value or quantity violates the bounds of the Modbus protocol.
///
/// Raised before any I/O takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumberError {
    /// More registers than fit into one PDU
    #[error("Invalid register count: {count} (max = {max})")]
    RegisterCount { count: usize, max: usize },
    /// Invalid quantity of items to process
    #[error("Invalid quantity: {quantity} (expected 1..={max})")]
    Quantity { quantity: u16, max: usize },
    /// The addressed range exceeds the 16 bit address space
    #[error("Address range overflow: address = {address}, quantity = {quantity}")]
    AddressOverflow { address: u16, quantity: u16 },
}

/// Any failure of the transport layer.
///
/// Callers should treat every variant as connection-affecting.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connect, read, write or timeout failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The received header declares more bytes than allowed
    #[error("Maximum ADU size is reached: declared length = {len}, max = {max}")]
    AduTooLarge { len: usize, max: usize },
    /// The outgoing payload does not fit into the length field
    #[error("PDU too large: {0} bytes")]
    PduTooLarge(usize),
    /// Protocol not Modbus
    #[error("Protocol not Modbus(0), received {0} instead")]
    ProtocolId(u16),
    /// The reply does not belong to the last request
    #[error("Transaction id mismatch: expected = {expected}, actual = {actual}")]
    TransactionMismatch { expected: u16, actual: u16 },
}

/// A PDU could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Invalid buffer size
    #[error("Invalid buffer size")]
    BufferSize,
    /// Invalid function code
    #[error("Invalid function code: 0x{0:0>2X}")]
    FnCode(u8),
    /// Invalid exception code
    #[error("Invalid exception code: 0x{0:0>2X}")]
    ExceptionCode(u8),
    /// Invalid byte count
    #[error("Invalid byte count: {0}")]
    ByteCount(usize),
    /// The body is shorter than its byte count declares
    #[error("{expected} bytes expected, but {actual} received")]
    ShortRead { expected: usize, actual: usize },
    /// The reply comes from another unit
    #[error("Unit id mismatch: expected = {expected}, actual = {actual}")]
    UnitId { expected: u8, actual: u8 },
    /// The byte source failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// modbus-master Error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Number(#[from] NumberError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The device answered with an exception response
    #[error("Modbus exception: {0}")]
    Exception(ExceptionResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn transport_error_keeps_io_cause() {
        let err = TransportError::from(io::Error::new(io::ErrorKind::TimedOut, "timeout"));
        let source = err.source().expect("cause");
        assert_eq!(source.to_string(), "timeout");
    }

    #[test]
    fn display_number_error() {
        let err = NumberError::RegisterCount {
            count: 126,
            max: 125,
        };
        assert_eq!(err.to_string(), "Invalid register count: 126 (max = 125)");
    }

    #[test]
    fn display_decode_error() {
        assert_eq!(
            DecodeError::FnCode(0x7).to_string(),
            "Invalid function code: 0x07"
        );
        assert_eq!(
            DecodeError::ShortRead {
                expected: 6,
                actual: 4
            }
            .to_string(),
            "6 bytes expected, but 4 received"
        );
    }
}
