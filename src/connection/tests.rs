//! Tests for the Graylog connection state machine against loopback servers.

use std::{
    io::{self, Read},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::bounded;
use rstest::{fixture, rstest};

use super::{ConnectionConfig, ConnectionStatus, GraylogConnection};

const WAIT: Duration = Duration::from_secs(5);

#[fixture]
fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

fn fast_config(addr: SocketAddr) -> ConnectionConfig {
    ConnectionConfig::new(addr.ip().to_string(), addr.port())
        .with_retry_delays(Duration::from_millis(200), Duration::from_millis(20))
        .with_connect_timeout(Duration::from_secs(1))
}

fn unresolvable_config(max_queue_length: usize) -> ConnectionConfig {
    let failing = |host: &str, _: u16| -> io::Result<Vec<SocketAddr>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{host} does not resolve"),
        ))
    };
    ConnectionConfig::new("nowhere.invalid", 12201)
        .with_max_queue_length(max_queue_length)
        .with_retry_delays(Duration::from_millis(20), Duration::from_millis(20))
        .with_resolver(Arc::new(failing))
}

fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Read from `stream` until `count` NUL-terminated frames have arrived.
fn read_frames(stream: &mut TcpStream, count: usize) -> Vec<Vec<u8>> {
    stream
        .set_read_timeout(Some(WAIT))
        .expect("set read timeout");
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];
    while raw.iter().filter(|b| **b == 0).count() < count {
        let n = stream.read(&mut chunk).expect("read frames");
        assert!(n > 0, "client closed before {count} frames arrived");
        raw.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(raw.last(), Some(&0), "trailing bytes after final frame");
    raw.split(|b| *b == 0)
        .take(count)
        .map(<[u8]>::to_vec)
        .collect()
}

/// Accept one connection on a background thread and report the first
/// `count` frames it receives.
fn spawn_frame_server(listener: TcpListener, count: usize) -> mpsc::Receiver<Vec<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let frames = read_frames(&mut stream, count);
        let _ = tx.send(frames);
        // Hold the connection open until the client goes away.
        let mut sink = [0u8; 64];
        while matches!(stream.read(&mut sink), Ok(n) if n > 0) {}
    });
    rx
}

/// Accept one connection and discard whatever arrives until the client leaves.
fn spawn_sink_server(listener: TcpListener) {
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let _ = io::copy(&mut stream, &mut io::sink());
        }
    });
}

#[rstest]
fn delivers_nul_terminated_message(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().unwrap();
    let connection = GraylogConnection::with_config(fast_config(addr));
    let (mut stream, _) = tcp_listener.accept().expect("accept connection");

    connection.send_message("hello");

    stream.set_read_timeout(Some(WAIT)).unwrap();
    let mut received = [0u8; 6];
    stream.read_exact(&mut received).expect("read frame");
    assert_eq!(&received, b"hello\0");
    assert!(wait_for(
        || connection.connection_status() == ConnectionStatus::SendLoop,
        WAIT
    ));
}

#[rstest]
fn preserves_single_producer_order(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().unwrap();
    let frames_rx = spawn_frame_server(tcp_listener, 200);
    let connection = GraylogConnection::with_config(fast_config(addr).with_max_queue_length(500));

    // Mixed sizes push the outbound buffer past the high-water mark.
    let expected: Vec<String> = (0..200)
        .map(|i| format!("message-{i}-{}", "x".repeat((i % 7) * 400)))
        .collect();
    for message in &expected {
        connection.send_message(message.clone());
    }

    let frames = frames_rx.recv_timeout(WAIT).expect("frames received");
    let received: Vec<String> = frames
        .into_iter()
        .map(|f| String::from_utf8(f).expect("utf8 frame"))
        .collect();
    assert_eq!(received, expected);
}

#[rstest]
fn messages_queued_before_connect_are_sent(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().unwrap();
    let connection = GraylogConnection::with_config(fast_config(addr));
    for i in 0..3 {
        connection.send_message(format!("early-{i}"));
    }
    let frames_rx = spawn_frame_server(tcp_listener, 3);
    let frames = frames_rx.recv_timeout(WAIT).expect("frames received");
    assert_eq!(frames, vec![b"early-0".to_vec(), b"early-1".to_vec(), b"early-2".to_vec()]);
}

#[rstest]
fn unresolvable_host_never_sends_and_never_blocks() {
    let connection = GraylogConnection::with_config(unresolvable_config(10));
    let start = Instant::now();
    for i in 0..1_000 {
        connection.send_message(format!("lost-{i}"));
        assert_ne!(connection.connection_status(), ConnectionStatus::SendLoop);
    }
    assert!(start.elapsed() < Duration::from_secs(1));
    thread::sleep(Duration::from_millis(100));
    assert_ne!(connection.connection_status(), ConnectionStatus::SendLoop);
    assert!(wait_for(
        || connection.connection_status() == ConnectionStatus::AddressRetryWait,
        WAIT
    ));
}

#[rstest]
#[case(1, 5)]
#[case(5, 8)]
#[case(20, 20)]
fn disconnected_queue_keeps_oldest_up_to_limit(#[case] limit: usize, #[case] sent: usize) {
    let connection = GraylogConnection::with_config(unresolvable_config(limit));
    let accepted = (0..sent)
        .filter(|i| connection.try_send_message(format!("m{i}")))
        .count();
    assert_eq!(accepted, limit.min(sent));
    assert_eq!(connection.queue_size(), limit.min(sent));
    assert!(!connection.queue_empty());
}

#[rstest]
fn flush_succeeds_on_idle_live_connection(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().unwrap();
    spawn_sink_server(tcp_listener);
    let connection = GraylogConnection::with_config(fast_config(addr));
    assert!(wait_for(
        || connection.connection_status() == ConnectionStatus::SendLoop,
        WAIT
    ));
    assert!(connection.flush(Duration::from_secs(2)));
    assert!(connection.queue_empty());
}

#[rstest]
fn flush_times_out_when_executor_is_blocked(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().unwrap();
    spawn_sink_server(tcp_listener);
    let connection = GraylogConnection::with_config(fast_config(addr));
    assert!(wait_for(
        || connection.connection_status() == ConnectionStatus::SendLoop,
        WAIT
    ));

    let (release_tx, release_rx) = bounded::<()>(0);
    connection.executor().submit(move || {
        let _ = release_rx.recv();
    });
    let start = Instant::now();
    assert!(!connection.flush(Duration::from_millis(100)));
    assert!(start.elapsed() >= Duration::from_millis(100));

    release_tx.send(()).expect("release executor");
    assert!(connection.flush(Duration::from_secs(2)));
}

#[rstest]
fn flush_times_out_while_disconnected() {
    let connection = GraylogConnection::with_config(unresolvable_config(10));
    connection.send_message("pending");
    assert!(!connection.flush(Duration::from_millis(50)));
}

#[rstest]
fn tries_remaining_candidates_before_backing_off(tcp_listener: TcpListener) {
    let live = tcp_listener.local_addr().unwrap();
    let dead = {
        let probe = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        probe.local_addr().unwrap()
    };
    let resolver =
        move |_: &str, _: u16| -> io::Result<Vec<SocketAddr>> { Ok(vec![dead, live]) };
    let config = fast_config(live)
        .with_retry_delays(Duration::from_secs(60), Duration::from_secs(60))
        .with_resolver(Arc::new(resolver));
    let frames_rx = spawn_frame_server(tcp_listener, 1);
    let connection = GraylogConnection::with_config(config);
    connection.send_message("second candidate");
    let frames = frames_rx.recv_timeout(WAIT).expect("frame via second endpoint");
    assert_eq!(frames, vec![b"second candidate".to_vec()]);
}

#[rstest]
fn reconnects_after_server_restart(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().unwrap();
    let connection = GraylogConnection::with_config(fast_config(addr));

    let (mut stream, _) = tcp_listener.accept().expect("accept first connection");
    connection.send_message("hello");
    assert_eq!(read_frames(&mut stream, 1), vec![b"hello".to_vec()]);
    assert!(wait_for(
        || connection.connection_status() == ConnectionStatus::SendLoop,
        WAIT
    ));

    drop(stream);
    drop(tcp_listener);
    assert!(
        wait_for(
            || connection.connection_status() != ConnectionStatus::SendLoop,
            WAIT
        ),
        "connection should notice the server went away"
    );

    connection.send_message("during outage");

    let listener = TcpListener::bind(addr).expect("rebind listener");
    let frames_rx = spawn_frame_server(listener, 1);
    let frames = frames_rx
        .recv_timeout(WAIT)
        .expect("reconnect within a few seconds");
    assert_eq!(frames, vec![b"during outage".to_vec()]);
    assert!(wait_for(
        || connection.connection_status() == ConnectionStatus::SendLoop,
        WAIT
    ));
}

#[rstest]
fn drop_stops_io_thread_promptly() {
    let connection = GraylogConnection::with_config(
        unresolvable_config(10).with_retry_delays(Duration::from_secs(60), Duration::from_secs(60)),
    );
    assert!(wait_for(
        || connection.connection_status() == ConnectionStatus::AddressRetryWait,
        WAIT
    ));
    let start = Instant::now();
    drop(connection);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[rstest]
fn repeated_flushes_while_disconnected_keep_queue_bounded() {
    let connection = GraylogConnection::with_config(unresolvable_config(3));
    for _ in 0..500 {
        assert!(!connection.flush(Duration::from_millis(1)));
    }
    assert!(connection.queue_empty());

    let accepted = (0..5)
        .filter(|i| connection.try_send_message(format!("after flushes {i}")))
        .count();
    assert_eq!(accepted, 3);
    assert_eq!(connection.queue_size(), 3);

    for _ in 0..100 {
        assert!(!connection.flush(Duration::from_millis(1)));
    }
    assert_eq!(connection.queue_size(), 3);
    assert!(!connection.try_send_message("still full"));
}

#[rstest]
fn shared_barrier_releases_every_waiting_flush(tcp_listener: TcpListener) {
    let addr = tcp_listener.local_addr().unwrap();
    spawn_sink_server(tcp_listener);
    let connection = GraylogConnection::with_config(fast_config(addr));
    let (release_tx, release_rx) = bounded::<()>(0);
    connection.executor().submit(move || {
        let _ = release_rx.recv();
    });
    for _ in 0..10 {
        assert!(!connection.flush(Duration::from_millis(5)));
    }
    release_tx.send(()).expect("release executor");
    assert!(connection.flush(WAIT));
    assert!(connection.flush(WAIT));
}

#[rstest]
fn prefers_ipv4_endpoint_over_earlier_ipv6_endpoint(tcp_listener: TcpListener) {
    // Hosts without IPv6 loopback cannot exercise the ordering.
    let Ok(ipv6_listener) = TcpListener::bind(("::1", 0)) else {
        return;
    };
    ipv6_listener
        .set_nonblocking(true)
        .expect("nonblocking ipv6 listener");
    let ipv6 = ipv6_listener.local_addr().unwrap();
    let ipv4 = tcp_listener.local_addr().unwrap();
    let resolver = move |_: &str, _: u16| -> io::Result<Vec<SocketAddr>> { Ok(vec![ipv6, ipv4]) };
    let config = fast_config(ipv4)
        .with_retry_delays(Duration::from_secs(60), Duration::from_secs(60))
        .with_resolver(Arc::new(resolver));
    let frames_rx = spawn_frame_server(tcp_listener, 1);
    let connection = GraylogConnection::with_config(config);
    connection.send_message("over ipv4");

    let frames = frames_rx.recv_timeout(WAIT).expect("frame via IPv4 endpoint");
    assert_eq!(frames, vec![b"over ipv4".to_vec()]);
    assert!(matches!(
        ipv6_listener.accept(),
        Err(err) if err.kind() == io::ErrorKind::WouldBlock
    ));
}
