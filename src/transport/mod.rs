// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection oriented transports.

use std::{
    io::{self, BufReader, BufWriter, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

use socket2::SockRef;

use crate::{
    error::TransportError,
    frame::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT, MAX_TCP_ADU_LEN, TCP_PORT},
};

mod tcp;

pub use self::tcp::TcpTransport;

/// Frames and exchanges PDUs with a remote device.
pub trait Transport {
    /// Send one PDU.
    fn send(&self, pdu: &[u8]) -> Result<(), TransportError>;

    /// Receive the PDU of the next reply into `pdu`, replacing its content.
    fn recv(&self, pdu: &mut Vec<u8>) -> Result<(), TransportError>;

    /// Send `request` and receive its reply as one uninterrupted cycle.
    ///
    /// No other `send` or `recv` of the same transport may run in between.
    fn exchange(&self, request: &[u8], reply: &mut Vec<u8>) -> Result<(), TransportError>;
}

/// State of the connection owned by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// A byte stream to a remote device.
pub trait Connection: Read + Write {
    /// Shut down both directions of the connection.
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Opens connections, e.g. a TCP socket factory.
pub trait Connector {
    type Stream: Connection;

    fn connect(&self, config: &TcpConfig) -> io::Result<Self::Stream>;
}

/// Modbus TCP transport configuration.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    /// Reuse one connection for all requests instead of connecting per request.
    pub keep_alive: bool,
    pub connect_timeout: Duration,
    /// Read and write timeout of an established connection.
    pub response_timeout: Duration,
    /// Upper bound for a whole ADU (header included) in both directions.
    pub max_adu_len: usize,
}

impl TcpConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: TCP_PORT,
            keep_alive: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_adu_len: MAX_TCP_ADU_LEN,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_adu_len(mut self, max_adu_len: usize) -> Self {
        self.max_adu_len = max_adu_len;
        self
    }
}

/// Connects with [`TcpStream`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = BufferedTcpStream;

    fn connect(&self, config: &TcpConfig) -> io::Result<Self::Stream> {
        let mut last_err = None;
        for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                Ok(stream) => {
                    return BufferedTcpStream::new(
                        stream,
                        config.response_timeout,
                        config.keep_alive,
                    );
                }
                Err(err) => {
                    log::debug!("Failed to connect to {addr}: {err}");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("could not resolve {}:{}", config.host, config.port),
            )
        }))
    }
}

/// A TCP socket with buffered input and output halves.
///
/// `SO_KEEPALIVE` follows [`TcpConfig::keep_alive`].
#[derive(Debug)]
pub struct BufferedTcpStream {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl BufferedTcpStream {
    fn new(stream: TcpStream, timeout: Duration, keep_alive: bool) -> io::Result<Self> {
        SockRef::from(&stream).set_keepalive(keep_alive)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let writer = BufWriter::new(stream.try_clone()?);
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }
}

impl Read for BufferedTcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Write for BufferedTcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Connection for BufferedTcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        self.reader.get_ref().shutdown(Shutdown::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TcpConfig::new("localhost");
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 502);
        assert!(!config.keep_alive);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.response_timeout, Duration::from_secs(1));
        assert_eq!(config.max_adu_len, 260);
    }

    #[test]
    fn build_config() {
        let config = TcpConfig::new("10.0.0.1")
            .with_port(1502)
            .with_keep_alive(true)
            .with_connect_timeout(Duration::from_millis(100))
            .with_response_timeout(Duration::from_millis(200))
            .with_max_adu_len(128);
        assert_eq!(config.port, 1502);
        assert!(config.keep_alive);
        assert_eq!(config.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.response_timeout, Duration::from_millis(200));
        assert_eq!(config.max_adu_len, 128);
    }

    #[test]
    fn socket_keep_alive_follows_config() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        for keep_alive in [true, false] {
            let config = TcpConfig::new("127.0.0.1")
                .with_port(port)
                .with_keep_alive(keep_alive);
            let stream = TcpConnector.connect(&config).unwrap();
            let socket = SockRef::from(stream.reader.get_ref());
            assert_eq!(socket.keepalive().unwrap(), keep_alive);
            assert!(socket.nodelay().unwrap());
        }
    }

    #[test]
    fn connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let config = TcpConfig::new("127.0.0.1")
            .with_port(port)
            .with_connect_timeout(Duration::from_millis(200));
        assert!(TcpConnector.connect(&config).is_err());
    }
}
