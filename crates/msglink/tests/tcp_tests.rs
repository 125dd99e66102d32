//! Loopback TCP tests for msglink connections

use anyhow::{Context, Result};
use msglink::proto::{decode_header, FrameDecoder, HEADER_LEN};
use msglink::{
    Connection, ConnectionConfig, ConnectionState, DisconnectReason, LinkError, LinkEvent,
    StateChange,
};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

/// Bind a loopback listener and run `peer` on the first accepted stream
fn spawn_peer<F, R>(peer: F) -> Result<(u16, thread::JoinHandle<R>)>
where
    F: FnOnce(TcpStream) -> R + Send + 'static,
    R: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").context("Failed to bind listener")?;
    let port = listener.local_addr()?.port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept failed");
        peer(stream)
    });
    Ok((port, handle))
}

fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig::new(&format!("127.0.0.1:{}", port)).expect("valid target")
}

/// Read one raw frame, header included
fn read_raw_frame(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; HEADER_LEN];
    match stream.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let mut frame = header.to_vec();
    frame.resize(HEADER_LEN + decode_header(header) as usize, 0);
    stream.read_exact(&mut frame[HEADER_LEN..])?;
    Ok(Some(frame))
}

fn next(rx: &mpsc::Receiver<LinkEvent<Value>>) -> LinkEvent<Value> {
    rx.recv_timeout(WAIT).expect("no event within timeout")
}

fn expect_connected(rx: &mpsc::Receiver<LinkEvent<Value>>) {
    match next(rx) {
        LinkEvent::State(StateChange::Connected { .. }) => {}
        other => panic!("expected connect, got {:?}", other),
    }
}

fn expect_message(rx: &mpsc::Receiver<LinkEvent<Value>>) -> Value {
    match next(rx) {
        LinkEvent::Message(Ok(value)) => value,
        other => panic!("expected message, got {:?}", other),
    }
}

fn expect_disconnect(rx: &mpsc::Receiver<LinkEvent<Value>>) -> DisconnectReason {
    match next(rx) {
        LinkEvent::State(StateChange::Disconnected(reason)) => reason,
        other => panic!("expected disconnect, got {:?}", other),
    }
}

#[test]
fn test_ping_echo_scenario() -> Result<()> {
    let (port, peer) = spawn_peer(|mut stream| {
        let frame = read_raw_frame(&mut stream).unwrap().expect("frame");
        stream.write_all(&frame).unwrap();
        frame
    })?;

    let (conn, rx) = Connection::<Value>::channel(config(port));
    conn.connect()?;
    expect_connected(&rx);

    conn.send(&json!({"type": "ping"}))?;
    assert_eq!(expect_message(&rx), json!({"type": "ping"}));

    let wire = peer.join().expect("peer panicked");
    let payload = br#"{"type":"ping"}"#;
    assert_eq!(&wire[..HEADER_LEN], &[0x00, 0x00, 0x00, payload.len() as u8]);
    assert_eq!(&wire[HEADER_LEN..], &payload[..]);
    Ok(())
}

#[test]
fn test_concurrent_sends_stay_whole() -> Result<()> {
    const SENDERS: usize = 8;
    const PER_SENDER: usize = 50;

    let (port, peer) = spawn_peer(|mut stream| {
        let mut frames = Vec::new();
        while let Some(frame) = read_raw_frame(&mut stream).unwrap() {
            let value: Value = serde_json::from_slice(&frame[HEADER_LEN..]).expect("well-formed frame");
            frames.push(value);
        }
        frames
    })?;

    let (conn, rx) = Connection::<Value>::channel(config(port));
    conn.connect()?;
    expect_connected(&rx);

    let conn = Arc::new(conn);
    let senders: Vec<_> = (0..SENDERS)
        .map(|sender| {
            let conn = conn.clone();
            thread::spawn(move || {
                for seq in 0..PER_SENDER {
                    let body = "x".repeat(seq * 7);
                    conn.send(&json!({"sender": sender, "seq": seq, "body": body}))
                        .expect("send failed");
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().expect("sender panicked");
    }
    conn.disconnect();

    let frames = peer.join().expect("peer panicked");
    assert_eq!(frames.len(), SENDERS * PER_SENDER);

    // Per-sender order is preserved by each sender's own sequencing
    for sender in 0..SENDERS {
        let seqs: Vec<u64> = frames
            .iter()
            .filter(|f| f["sender"] == json!(sender))
            .map(|f| f["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, (0..PER_SENDER as u64).collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn test_byte_by_byte_delivery() -> Result<()> {
    let messages = vec![json!({"type": "ping"}), json!({"type": "chat", "text": "héllo"})];
    let codec = msglink::proto::FrameCodec::new(msglink::Json);
    let mut wire = Vec::new();
    for m in &messages {
        wire.extend_from_slice(&codec.encode(m)?);
    }

    let (port, peer) = spawn_peer(move |mut stream| {
        stream.set_nodelay(true).unwrap();
        for byte in wire {
            stream.write_all(&[byte]).unwrap();
            stream.flush().unwrap();
            thread::sleep(Duration::from_millis(1));
        }
        // Hold the stream until the client is done
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
    })?;

    let (conn, rx) = Connection::<Value>::channel(config(port));
    conn.connect()?;
    expect_connected(&rx);

    for m in &messages {
        assert_eq!(&expect_message(&rx), m);
    }
    conn.disconnect();
    assert!(matches!(expect_disconnect(&rx), DisconnectReason::Requested));
    peer.join().expect("peer panicked");
    Ok(())
}

#[test]
fn test_frames_then_clean_close() -> Result<()> {
    let (port, peer) = spawn_peer(|mut stream| {
        let codec = msglink::proto::FrameCodec::new(msglink::Json);
        let mut burst = Vec::new();
        for n in 0..3 {
            burst.extend_from_slice(&codec.encode(&json!(n)).unwrap());
        }
        stream.write_all(&burst).unwrap();
    })?;

    let (conn, rx) = Connection::<Value>::channel(config(port));
    conn.connect()?;
    expect_connected(&rx);

    for n in 0..3 {
        assert_eq!(expect_message(&rx), json!(n));
    }
    assert!(matches!(expect_disconnect(&rx), DisconnectReason::PeerClosed));
    peer.join().expect("peer panicked");

    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(matches!(conn.send(&json!("late")), Err(LinkError::NotConnected)));
    Ok(())
}

#[test]
fn test_truncated_frame_reported() -> Result<()> {
    let (port, peer) = spawn_peer(|mut stream| {
        stream.write_all(&[0, 0, 0, 100]).unwrap();
        stream.write_all(&[b'{'; 10]).unwrap();
    })?;

    let (conn, rx) = Connection::<Value>::channel(config(port));
    conn.connect()?;
    expect_connected(&rx);

    match expect_disconnect(&rx) {
        DisconnectReason::Failed(LinkError::TruncatedFrame { expected, received }) => {
            assert_eq!(expected, 104);
            assert_eq!(received, 14);
        }
        other => panic!("unexpected reason: {:?}", other),
    }
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    peer.join().expect("peer panicked");
    Ok(())
}

#[test]
fn test_garbage_payload_then_valid_frame() -> Result<()> {
    let (port, peer) = spawn_peer(|mut stream| {
        stream.write_all(&[0, 0, 0, 4]).unwrap();
        stream.write_all(b"}{}{").unwrap();
        let codec = msglink::proto::FrameCodec::new(msglink::Json);
        stream.write_all(&codec.encode(&json!("still here")).unwrap()).unwrap();
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
    })?;

    let (conn, rx) = Connection::<Value>::channel(config(port));
    conn.connect()?;
    expect_connected(&rx);

    assert!(matches!(next(&rx), LinkEvent::Message(Err(LinkError::Deserialization(_)))));
    assert_eq!(expect_message(&rx), json!("still here"));
    assert!(conn.is_connected());

    conn.disconnect();
    peer.join().expect("peer panicked");
    Ok(())
}

#[test]
fn test_disconnect_unblocks_silent_peer() -> Result<()> {
    let (port, peer) = spawn_peer(|mut stream| {
        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 64];
        // Read until the client goes away
        loop {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    decoder.push(&buf[..n]).unwrap();
                }
            }
        }
        decoder.is_idle()
    })?;

    let (conn, rx) = Connection::<Value>::channel(config(port));
    conn.connect()?;
    expect_connected(&rx);
    assert_eq!(conn.state(), ConnectionState::Connected);

    conn.disconnect();
    assert!(matches!(expect_disconnect(&rx), DisconnectReason::Requested));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(peer.join().expect("peer panicked"));
    Ok(())
}

#[test]
fn test_connection_refused() -> Result<()> {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };

    let (conn, rx) = Connection::<Value>::channel(
        config(port).with_connect_timeout(Duration::from_secs(2)),
    );
    assert!(matches!(conn.connect(), Err(LinkError::Connection { .. })));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
fn test_read_timeout_closes_connection() -> Result<()> {
    let (port, peer) = spawn_peer(|mut stream| {
        let mut sink = [0u8; 1];
        let _ = stream.read(&mut sink);
    })?;

    let (conn, rx) = Connection::<Value>::channel(
        config(port).with_read_timeout(Duration::from_millis(100)),
    );
    conn.connect()?;
    expect_connected(&rx);

    assert!(matches!(
        expect_disconnect(&rx),
        DisconnectReason::Failed(LinkError::Receive(_))
    ));
    assert!(matches!(conn.send(&json!("late")), Err(LinkError::NotConnected)));

    drop(conn);
    peer.join().expect("peer panicked");
    Ok(())
}
