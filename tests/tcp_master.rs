// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    sync::Arc,
    thread,
    time::Duration,
};

use modbus_master::{
    Client, ConnectionState, Error, Exception, TcpConfig, TcpTransport, TransportError,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serve `requests` Read Holding Registers requests on one connection.
///
/// Every reply is written byte by byte.
fn serve(stream: &mut TcpStream, requests: usize, registers: &[u16]) {
    stream.set_nodelay(true).unwrap();
    for _ in 0..requests {
        let mut req = [0; 12];
        stream.read_exact(&mut req).unwrap();
        assert_eq!(&req[2..6], &[0x00, 0x00, 0x00, 0x06]);
        let unit_id = req[6];
        assert_eq!(&req[7..], &[0x03, 0x00, 0x00, 0x00, registers.len() as u8]);

        let byte_count = registers.len() * 2;
        let mut rsp = vec![req[0], req[1], 0x00, 0x00, 0x00, 3 + byte_count as u8];
        rsp.extend_from_slice(&[unit_id, 0x03, byte_count as u8]);
        for r in registers {
            rsp.extend_from_slice(&r.to_be_bytes());
        }
        for b in rsp {
            stream.write_all(&[b]).unwrap();
            stream.flush().unwrap();
        }
    }
}

fn device() -> (TcpListener, TcpConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = TcpConfig::new("127.0.0.1")
        .with_port(port)
        .with_response_timeout(Duration::from_secs(2));
    (listener, config)
}

#[test]
fn read_holding_registers_from_device() {
    init_logger();
    let (listener, config) = device();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        serve(&mut stream, 1, &[1, 2, 300]);
    });

    let transport = TcpTransport::new(config);
    let client = Client::new(transport, 1);
    assert_eq!(client.read_holding_registers(0, 3).unwrap(), &[1, 2, 300]);
    assert_eq!(
        client.transport().connection_state(),
        ConnectionState::Closed
    );
    handle.join().unwrap();
}

#[test]
fn connect_per_request_without_keep_alive() {
    init_logger();
    let (listener, config) = device();
    let handle = thread::spawn(move || {
        for _ in 0..2 {
            let (mut stream, _) = listener.accept().unwrap();
            serve(&mut stream, 1, &[0xABCD]);
        }
    });

    let client = Client::new(TcpTransport::new(config), 7);
    for _ in 0..2 {
        assert_eq!(client.read_holding_registers(0, 1).unwrap(), &[0xABCD]);
    }
    handle.join().unwrap();
}

#[test]
fn reuse_connection_with_keep_alive() {
    init_logger();
    let (listener, config) = device();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        serve(&mut stream, 3, &[10, 20]);
    });

    let transport = TcpTransport::new(config.with_keep_alive(true));
    assert_eq!(transport.connection_state(), ConnectionState::Open);
    let client = Client::new(transport, 1);
    for _ in 0..3 {
        assert_eq!(client.read_holding_registers(0, 2).unwrap(), &[10, 20]);
    }
    assert_eq!(client.transport().connection_state(), ConnectionState::Open);
    client.transport().close().ok();
    handle.join().unwrap();
}

#[test]
fn exception_from_device() {
    init_logger();
    let (listener, config) = device();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut req = [0; 12];
        stream.read_exact(&mut req).unwrap();
        stream
            .write_all(&[req[0], req[1], 0x00, 0x00, 0x00, 0x03, req[6], 0x83, 0x02])
            .unwrap();
    });

    let client = Client::new(TcpTransport::new(config), 1);
    let err = client.read_holding_registers(0, 3).err().unwrap();
    assert!(matches!(err, Error::Exception(ex) if ex.exception == Exception::IllegalDataAddress));
    handle.join().unwrap();
}

#[test]
fn response_timeout() {
    init_logger();
    let (listener, config) = device();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut req = [0; 12];
        stream.read_exact(&mut req).unwrap();
        // Never answer, wait for the client to give up
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
    });

    let config = config.with_response_timeout(Duration::from_millis(100));
    let client = Client::new(TcpTransport::new(config), 1);
    let err = client.read_holding_registers(0, 3).err().unwrap();
    assert!(matches!(err, Error::Transport(TransportError::Io(_))));
    assert_eq!(
        client.transport().connection_state(),
        ConnectionState::Closed
    );
    handle.join().unwrap();
}

/// Answer every request with its start address as the register value.
fn serve_address_echo(stream: &mut TcpStream, requests: usize) {
    stream.set_nodelay(true).unwrap();
    for _ in 0..requests {
        let mut req = [0; 12];
        if stream.read_exact(&mut req).is_err() {
            return;
        }
        let rsp = [
            req[0], req[1], 0x00, 0x00, 0x00, 0x05, req[6], 0x03, 0x02, req[8], req[9],
        ];
        stream.write_all(&rsp[..7]).unwrap();
        stream.write_all(&rsp[7..]).unwrap();
    }
}

fn read_address_echo_concurrently(client: Arc<Client<TcpTransport>>) {
    let workers: Vec<_> = [1, 2]
        .into_iter()
        .map(|address| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for _ in 0..CALLS_PER_THREAD {
                    assert_eq!(
                        client.read_holding_registers(address, 1).unwrap(),
                        &[address]
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

const CALLS_PER_THREAD: usize = 200;

#[test]
fn concurrent_callers_with_keep_alive() {
    init_logger();
    let (listener, config) = device();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        serve_address_echo(&mut stream, 2 * CALLS_PER_THREAD);
    });

    let transport = TcpTransport::new(config.with_keep_alive(true));
    read_address_echo_concurrently(Arc::new(Client::new(transport, 1)));
    handle.join().unwrap();
}

#[test]
fn concurrent_callers_without_keep_alive() {
    init_logger();
    let (listener, config) = device();
    let handle = thread::spawn(move || {
        for _ in 0..2 * CALLS_PER_THREAD {
            let (mut stream, _) = listener.accept().unwrap();
            serve_address_echo(&mut stream, 1);
        }
    });

    let transport = TcpTransport::new(config);
    read_address_echo_concurrently(Arc::new(Client::new(transport, 1)));
    handle.join().unwrap();
}
