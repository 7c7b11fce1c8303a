// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use super::{Message, ShortReadPolicy, read_body};
use crate::{
    error::{DecodeError, NumberError},
    frame::{Address, FunctionCode, MAX_READ_REGISTERS, Quantity, Word},
    util::{bytes_to_registers, registers_to_bytes},
};

/// Read Holding Registers (`0x03`) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegistersRequest {
    address: Address,
    quantity: Quantity,
}

impl ReadHoldingRegistersRequest {
    /// Request `quantity` registers starting at `address`.
    pub fn new(address: Address, quantity: Quantity) -> Result<Self, NumberError> {
        if quantity == 0 || quantity as usize > MAX_READ_REGISTERS {
            return Err(NumberError::Quantity {
                quantity,
                max: MAX_READ_REGISTERS,
            });
        }
        if address as usize + quantity as usize > 0x1_0000 {
            return Err(NumberError::AddressOverflow { address, quantity });
        }
        Ok(Self { address, quantity })
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }
}

impl Message for ReadHoldingRegistersRequest {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::ReadHoldingRegisters
    }

    fn byte_count(&self) -> usize {
        4
    }

    fn encode(&self, sink: &mut dyn Write) -> io::Result<()> {
        sink.write_u16::<BigEndian>(self.address)?;
        sink.write_u16::<BigEndian>(self.quantity)
    }

    /// The body has a fixed size, so a short read is always rejected.
    fn decode(
        &mut self,
        source: &mut dyn Read,
        _policy: ShortReadPolicy,
    ) -> Result<(), DecodeError> {
        let (buf, count) = read_body(source, 4)?;
        if count < 4 {
            return Err(DecodeError::ShortRead {
                expected: 4,
                actual: count,
            });
        }
        self.address = BigEndian::read_u16(&buf[0..2]);
        self.quantity = BigEndian::read_u16(&buf[2..4]);
        Ok(())
    }
}

/// Read Holding Registers (`0x03`) response.
///
/// The register values are kept as the raw big-endian bytes of the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadHoldingRegistersResponse {
    buf: Vec<u8>,
    truncated: bool,
}

impl ReadHoldingRegistersResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_registers(registers: &[Word]) -> Result<Self, NumberError> {
        let mut rsp = Self::new();
        rsp.set_registers(registers)?;
        Ok(rsp)
    }

    /// Replace the register values.
    ///
    /// On error the current values are kept.
    pub fn set_registers(&mut self, registers: &[Word]) -> Result<(), NumberError> {
        if registers.len() > MAX_READ_REGISTERS {
            return Err(NumberError::RegisterCount {
                count: registers.len(),
                max: MAX_READ_REGISTERS,
            });
        }
        self.buf = registers_to_bytes(registers);
        self.truncated = false;
        Ok(())
    }

    /// The register values.
    ///
    /// Missing registers of a truncated response read as `0`.
    #[must_use]
    pub fn registers(&self) -> Vec<Word> {
        bytes_to_registers(&self.buf)
    }

    /// The raw register bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// `true` if the last decode received fewer bytes than declared.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Message for ReadHoldingRegistersResponse {
    fn function_code(&self) -> FunctionCode {
        FunctionCode::ReadHoldingRegisters
    }

    fn byte_count(&self) -> usize {
        self.buf.len()
    }

    fn encode(&self, sink: &mut dyn Write) -> io::Result<()> {
        // set_registers keeps the count below 256
        sink.write_u8(self.buf.len() as u8)?;
        sink.write_all(&self.buf)
    }

    fn decode(&mut self, source: &mut dyn Read, policy: ShortReadPolicy) -> Result<(), DecodeError> {
        let byte_count = match source.read_u8() {
            Ok(cnt) => cnt as usize,
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(DecodeError::ShortRead {
                    expected: 1,
                    actual: 0,
                });
            }
            Err(err) => return Err(err.into()),
        };
        if byte_count % 2 != 0 || byte_count > MAX_READ_REGISTERS * 2 {
            return Err(DecodeError::ByteCount(byte_count));
        }
        let (buf, count) = read_body(source, byte_count)?;
        let truncated = count < byte_count;
        if truncated {
            match policy {
                ShortReadPolicy::Warn => {
                    log::warn!("{byte_count} bytes expected, but {count} received.");
                }
                ShortReadPolicy::Reject => {
                    return Err(DecodeError::ShortRead {
                        expected: byte_count,
                        actual: count,
                    });
                }
            }
        }
        self.buf = buf;
        self.truncated = truncated;
        Ok(())
    }
}
