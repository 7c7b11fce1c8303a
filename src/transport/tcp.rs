// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP transport

use std::{
    io::{self, Read, Write},
    sync::{Mutex, MutexGuard, PoisonError},
};

use super::{Connection, ConnectionState, Connector, TcpConfig, TcpConnector, Transport};
use crate::{
    codec::tcp::{AduHeader, HEADER_LEN},
    error::TransportError,
    frame::PROTOCOL_ID,
    util::hex,
};

struct State<S> {
    header: AduHeader,
    stream: Option<S>,
}

/// Blocking Modbus TCP transport.
///
/// All `send`/`recv` calls are serialized by one lock. `exchange` holds it
/// for a whole request/response cycle, so concurrent callers never see
/// each other's replies.
///
/// Without `keep_alive` every `send` opens a fresh connection that is closed
/// again when the matching `recv` returns. With `keep_alive` the connection
/// is reused and a failed `send` reconnects and retries exactly once.
pub struct TcpTransport<C: Connector = TcpConnector> {
    config: TcpConfig,
    connector: C,
    state: Mutex<State<C::Stream>>,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> TcpTransport<C> {
    pub fn with_connector(config: TcpConfig, connector: C) -> Self {
        let transport = Self {
            config,
            connector,
            state: Mutex::new(State {
                header: AduHeader::new(),
                stream: None,
            }),
        };
        if transport.config.keep_alive {
            let mut state = transport.lock();
            if let Err(err) = transport.open(&mut state) {
                log::warn!("Failed to connect to {}: {err}", transport.peer());
            }
        }
        transport
    }

    #[must_use]
    pub const fn config(&self) -> &TcpConfig {
        &self.config
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        if self.lock().stream.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Close the connection.
    ///
    /// The transport is closed afterwards even if this fails.
    pub fn close(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        Self::close_stream(&mut state)
    }

    fn lock(&self) -> MutexGuard<'_, State<C::Stream>> {
        // Every failure path resets the state, so it is consistent
        // even after a panic of another thread.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn peer(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    fn open(&self, state: &mut State<C::Stream>) -> Result<(), TransportError> {
        if let Err(err) = Self::close_stream(state) {
            log::debug!("Failed to close previous connection: {err}");
        }
        let stream = self.connector.connect(&self.config)?;
        log::debug!("Connected to {}", self.peer());
        state.stream = Some(stream);
        Ok(())
    }

    fn close_stream(state: &mut State<C::Stream>) -> Result<(), TransportError> {
        let Some(mut stream) = state.stream.take() else {
            return Ok(());
        };
        log::debug!("Closing connection");
        stream.shutdown()?;
        Ok(())
    }

    fn close_quietly(state: &mut State<C::Stream>) {
        if let Err(err) = Self::close_stream(state) {
            log::debug!("Failed to close connection: {err}");
        }
    }

    fn send_adu(state: &mut State<C::Stream>, pdu: &[u8], len: u16) -> Result<(), TransportError> {
        let State { header, stream } = state;
        let stream = stream.as_mut().ok_or_else(not_connected)?;
        let hdr = header.update(len);
        log::trace!("Send ADU: {} {}", hex(&hdr), hex(pdu));
        stream.write_all(&hdr)?;
        stream.write_all(pdu)?;
        stream.flush()?;
        Ok(())
    }

    fn recv_adu(&self, state: &mut State<C::Stream>, pdu: &mut Vec<u8>) -> Result<(), TransportError> {
        let State { header, stream } = state;
        let stream = stream.as_mut().ok_or_else(not_connected)?;

        let mut buf = [0; HEADER_LEN];
        read_frame(stream, &mut buf)?;
        let received = AduHeader::from(buf);

        let len = received.pdu_len();
        if HEADER_LEN + len > self.config.max_adu_len {
            log::error!("Maximum ADU size is reached: {}", hex(&buf));
            return Err(TransportError::AduTooLarge {
                len: HEADER_LEN + len,
                max: self.config.max_adu_len,
            });
        }
        if received.protocol_id() != PROTOCOL_ID {
            log::error!("Invalid protocol id: {}", hex(&buf));
            return Err(TransportError::ProtocolId(received.protocol_id()));
        }
        if received.transaction_id() != header.transaction_id() {
            return Err(TransportError::TransactionMismatch {
                expected: header.transaction_id(),
                actual: received.transaction_id(),
            });
        }

        pdu.clear();
        pdu.resize(len, 0);
        read_frame(stream, pdu)?;
        log::trace!("Received ADU: {} {}", hex(&buf), hex(pdu));
        Ok(())
    }
}

impl<C: Connector> Transport for TcpTransport<C> {
    fn send(&self, pdu: &[u8]) -> Result<(), TransportError> {
        let mut state = self.lock();
        self.send_locked(&mut state, pdu)
    }

    fn recv(&self, pdu: &mut Vec<u8>) -> Result<(), TransportError> {
        let mut state = self.lock();
        self.recv_locked(&mut state, pdu)
    }

    fn exchange(&self, request: &[u8], reply: &mut Vec<u8>) -> Result<(), TransportError> {
        let mut state = self.lock();
        self.send_locked(&mut state, request)?;
        self.recv_locked(&mut state, reply)
    }
}

impl<C: Connector> TcpTransport<C> {
    fn send_locked(&self, state: &mut State<C::Stream>, pdu: &[u8]) -> Result<(), TransportError> {
        let len = u16::try_from(pdu.len())
            .ok()
            .filter(|len| HEADER_LEN + *len as usize <= self.config.max_adu_len)
            .ok_or(TransportError::PduTooLarge(pdu.len()))?;

        if !self.config.keep_alive {
            self.open(state)?;
        }
        let Err(err) = Self::send_adu(state, pdu, len) else {
            return Ok(());
        };
        if !self.config.keep_alive {
            Self::close_quietly(state);
            return Err(err);
        }

        log::warn!("Failed to send request to {}, reconnecting: {err}", self.peer());
        self.open(state)?;
        Self::send_adu(state, pdu, len).inspect_err(|_| Self::close_quietly(state))
    }

    fn recv_locked(
        &self,
        state: &mut State<C::Stream>,
        pdu: &mut Vec<u8>,
    ) -> Result<(), TransportError> {
        match self.recv_adu(state, pdu) {
            Ok(()) if !self.config.keep_alive => Self::close_stream(state),
            Ok(()) => Ok(()),
            Err(err) => {
                // The position within the stream is unknown now.
                Self::close_quietly(state);
                Err(err)
            }
        }
    }
}

/// Read until `buf` is full.
///
/// The stream may deliver fewer bytes per call than requested.
fn read_frame(stream: &mut impl Read, buf: &mut [u8]) -> io::Result<()> {
    stream.read_exact(buf)
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no open connection")
}
