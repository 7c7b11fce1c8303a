// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client (master) specific functions.

use crate::{
    error::{DecodeError, Error},
    frame::{Address, ExceptionResponse, Quantity, UnitId, Word},
    message::{
        Message, ReadHoldingRegistersRequest, ReadHoldingRegistersResponse, ShortReadPolicy,
    },
    transport::Transport,
};

/// Issues requests to one unit behind a transport.
///
/// The unit id is sent as the first byte after the MBAP header.
#[derive(Debug)]
pub struct Client<T> {
    transport: T,
    unit_id: UnitId,
    policy: ShortReadPolicy,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, unit_id: UnitId) -> Self {
        Self {
            transport,
            unit_id,
            policy: ShortReadPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_short_read_policy(mut self, policy: ShortReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Read `quantity` holding registers starting at `address`.
    pub fn read_holding_registers(
        &self,
        address: Address,
        quantity: Quantity,
    ) -> Result<Vec<Word>, Error> {
        let request = ReadHoldingRegistersRequest::new(address, quantity)?;
        let mut response = ReadHoldingRegistersResponse::new();
        self.call(&request, &mut response)?;
        let registers = response.registers();
        if registers.len() != quantity as usize {
            return Err(DecodeError::ByteCount(response.byte_count()).into());
        }
        Ok(registers)
    }

    /// Send `request` and decode the reply into `response`.
    ///
    /// The request and its reply are exchanged without interruption by
    /// other callers of the same transport.
    pub fn call(&self, request: &impl Message, response: &mut impl Message) -> Result<(), Error> {
        let mut adu = vec![self.unit_id];
        adu.extend(request.encode_pdu().map_err(DecodeError::from)?);
        let mut buf = Vec::new();
        self.transport.exchange(&adu, &mut buf)?;
        let [unit_id, fn_code, body @ ..] = buf.as_slice() else {
            return Err(DecodeError::BufferSize.into());
        };
        if *unit_id != self.unit_id {
            return Err(DecodeError::UnitId {
                expected: self.unit_id,
                actual: *unit_id,
            }
            .into());
        }
        if *fn_code >= 0x80 {
            let ex = ExceptionResponse::try_from(&buf[1..])?;
            log::debug!("Unit {} replied with exception: {ex}", self.unit_id);
            return Err(Error::Exception(ex));
        }
        if *fn_code != response.function_code().value() {
            return Err(DecodeError::FnCode(*fn_code).into());
        }
        let mut body = body;
        response.decode(&mut body, self.policy)?;
        Ok(())
    }
}
