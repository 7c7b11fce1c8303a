// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus messages (PDUs)

use std::io::{self, Read, Write};

use byteorder::WriteBytesExt;

use crate::{
    error::DecodeError,
    frame::{ExceptionResponse, FunctionCode},
};

mod read_holding_registers;

pub use self::read_holding_registers::*;

/// How to treat a body that is shorter than its declared byte count.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShortReadPolicy {
    /// Log a warning and keep the missing tail zero-filled.
    ///
    /// The decoded message reports itself as truncated.
    #[default]
    Warn,
    /// Fail the decode with [`DecodeError::ShortRead`].
    Reject,
}

/// One Modbus PDU: a function code followed by a function specific body.
pub trait Message {
    /// The fixed function code of this message type.
    fn function_code(&self) -> FunctionCode;

    /// Number of body bytes, excluding the function code.
    fn byte_count(&self) -> usize;

    /// Write the body to `sink`.
    fn encode(&self, sink: &mut dyn Write) -> io::Result<()>;

    /// Read the body from `source`.
    ///
    /// The function code must already have been consumed. Bytes missing
    /// from the body are handled as `policy` says, while a body that ends
    /// before its fixed-size leading fields is always a
    /// [`DecodeError::ShortRead`]. Only a failing source yields
    /// [`DecodeError::Io`].
    fn decode(&mut self, source: &mut dyn Read, policy: ShortReadPolicy)
    -> Result<(), DecodeError>;

    /// Serialize function code and body.
    fn encode_pdu(&self) -> io::Result<Vec<u8>> {
        let mut pdu = Vec::with_capacity(1 + self.byte_count());
        pdu.write_u8(self.function_code().value())?;
        self.encode(&mut pdu)?;
        Ok(pdu)
    }
}

/// A decoded response of one of the supported function codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ReadHoldingRegisters(ReadHoldingRegistersResponse),
    Exception(ExceptionResponse),
}

impl Response {
    /// Decode a response PDU, dispatching on its function code.
    pub fn decode(pdu: &[u8], policy: ShortReadPolicy) -> Result<Self, DecodeError> {
        let Some((&fn_code, mut body)) = pdu.split_first() else {
            return Err(DecodeError::BufferSize);
        };
        if fn_code >= 0x80 {
            return ExceptionResponse::try_from(pdu).map(Self::Exception);
        }
        match FunctionCode::new(fn_code) {
            FunctionCode::ReadHoldingRegisters => {
                let mut rsp = ReadHoldingRegistersResponse::new();
                rsp.decode(&mut body, policy)?;
                Ok(Self::ReadHoldingRegisters(rsp))
            }
            _ => Err(DecodeError::FnCode(fn_code)),
        }
    }

    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Self::Exception(ex) => ex.function,
        }
    }
}

/// Read up to `len` bytes into a fresh buffer of exactly `len` bytes.
///
/// Returns the buffer together with the number of bytes actually read,
/// which is less than `len` only if the source reached its end.
pub(crate) fn read_body(source: &mut dyn Read, len: usize) -> io::Result<(Vec<u8>, usize)> {
    let mut buf = vec![0; len];
    let mut count = 0;
    while count < len {
        match source.read(&mut buf[count..]) {
            Ok(0) => break,
            Ok(n) => count += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok((buf, count))
}
