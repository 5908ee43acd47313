//! End-to-end coordinator tests over loopback TCP.
//!
//! The test client plays the environment subprocess: it connects, reads the
//! handshake, sends `step`/`reset` frames and inspects the replies.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::time::Duration;

use crate::engine::{Engine, EngineConfig, SpaceDescription, StepReply};
use crate::error::Error;
use crate::protocol::{self, channel, Frame};
use crate::space::{Enumeration, StateSpace};

fn test_space() -> StateSpace {
    StateSpace::new(
        vec![
            Enumeration::new("TEMP", [("COLD", 0.0), ("WARM", 1.0), ("HOT", 2.0)]),
            Enumeration::new("LOAD", [("IDLE", 0.0), ("BUSY", 1.0), ("FULL", 2.0)]),
        ],
        vec![Enumeration::new(
            "FAN",
            [("OFF", 0.0), ("SLOW", 1.0), ("FAST", 2.0), ("MAX", 3.0)],
        )],
    )
}

struct TestClient {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl TestClient {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self { stream, reader }
    }

    fn send(&mut self, channel: &str, payload: Option<&str>) {
        let line = protocol::encode(channel, payload);
        self.stream.write_all(line.as_bytes()).unwrap();
        self.stream.flush().unwrap();
    }

    fn read_frame(&mut self) -> Frame {
        let mut line = String::new();
        self.reader.read_line(&mut line).expect("read line");
        protocol::decode(&line).expect("decode frame")
    }

    /// Read past `$CONNECT` and the `state_space` advert, returning the
    /// advert's payload.
    fn read_handshake(&mut self) -> SpaceDescription {
        let connect = self.read_frame();
        assert_eq!(connect.channel, channel::CONNECT);
        assert_eq!(connect.payload, None);
        let advert = self.read_frame();
        assert_eq!(advert.channel, channel::STATE_SPACE);
        serde_json::from_str(advert.payload_str()).expect("space description parses")
    }

    /// Assert that no frame arrives within a short window.
    fn expect_silence(&mut self) {
        self.stream
            .set_read_timeout(Some(Duration::from_millis(300)))
            .unwrap();
        let mut line = String::new();
        let err = self.reader.read_line(&mut line).unwrap_err();
        assert!(
            matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            "expected silence, got {err:?} (line {line:?})"
        );
        self.stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
    }
}

fn bound_engine(save_dir: &std::path::Path) -> (Engine, SocketAddr) {
    let config = EngineConfig::default().with_save_dir(save_dir).with_seed(7);
    let mut engine = Engine::new(test_space(), config);
    engine.bind().unwrap();
    let addr = engine.local_addr().unwrap();
    (engine, addr)
}

#[test]
fn test_handshake_advertises_the_space() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, addr) = bound_engine(dir.path());

    let handle = std::thread::spawn(move || {
        let result = engine.select_next_state();
        (engine, result)
    });

    let mut client = TestClient::connect(addr);
    let advert = client.read_handshake();
    assert_eq!(advert.num_of_states, 9);
    assert_eq!(advert.num_of_actions, 4);
    assert_eq!(advert.shape_of_states, vec![3, 3]);
    assert_eq!(advert.shape_of_actions, vec![4]);
    assert_eq!(advert.state_bounds, vec![(0.0, 2.0), (0.0, 2.0)]);

    client.send(channel::STEP, Some("2"));
    let (_engine, result) = handle.join().unwrap();
    assert_eq!(result.unwrap(), (0, 2));
}

#[test]
fn test_exactly_one_reply_per_step() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, addr) = bound_engine(dir.path());

    let (processed_tx, processed_rx) = mpsc::channel();
    let (checked_tx, checked_rx) = mpsc::channel();
    let handle = std::thread::spawn(move || {
        let (state, action) = engine.select_next_state().unwrap();
        assert_eq!((state, action), (0, 2));
        // Two reports for the same step; only the first may answer.
        engine
            .process_results(&[0, 0], &[2], &[1, 0], 1.0, 5.0)
            .unwrap();
        engine
            .process_results(&[0, 0], &[2], &[2, 0], 1.0, 3.0)
            .unwrap();
        assert_eq!(engine.steps(), 1);
        processed_tx.send(()).unwrap();
        checked_rx.recv().unwrap();
        engine.finish_optimization().unwrap();
        engine.get_results().unwrap()
    });

    let mut client = TestClient::connect(addr);
    client.read_handshake();
    client.send(channel::STEP, Some("2"));

    let frame = client.read_frame();
    assert_eq!(frame.channel, channel::STEP);
    let reply: StepReply = serde_json::from_str(frame.payload_str()).unwrap();
    assert_eq!(reply.reward, 5.0);
    assert_eq!(reply.obs, vec![1.0, 0.0]);
    assert!(!reply.done);

    processed_rx.recv().unwrap();
    client.expect_silence();
    checked_tx.send(()).unwrap();

    let results = handle.join().unwrap();
    assert_eq!(results.len(), 9);
    // The drawn transition left its score in the value table.
    assert_eq!(results[&0], (2, 5.0));
    assert!(dir.path().join("qtable.csv").exists());
    assert!(dir.path().join("history.csv").exists());
}

#[test]
fn test_out_of_range_action_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, addr) = bound_engine(dir.path());

    let handle = std::thread::spawn(move || engine.select_next_state());

    let mut client = TestClient::connect(addr);
    client.read_handshake();
    client.send(channel::STEP, Some("9"));

    let err = handle.join().unwrap().unwrap_err();
    assert!(matches!(err, Error::MalformedFrame(_)));
}

#[test]
fn test_disconnect_flags_termination() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, addr) = bound_engine(dir.path());

    let handle = std::thread::spawn(move || {
        let err = engine.select_next_state().unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert!(!engine.continue_iterating());
        engine.finish_optimization().unwrap();
        engine.get_results().unwrap()
    });

    {
        let mut client = TestClient::connect(addr);
        client.read_handshake();
        // Dropping the stream closes the socket uncleanly from our side.
    }

    let results = handle.join().unwrap();
    assert_eq!(results.len(), 9);
    assert!(dir.path().join("qtable.csv").exists());
    assert!(dir.path().join("history.csv").exists());
}

#[test]
fn test_stalled_peer_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default()
        .with_save_dir(dir.path())
        .with_step_timeout(Duration::from_millis(100));
    let mut engine = Engine::new(test_space(), config);
    engine.bind().unwrap();
    let addr = engine.local_addr().unwrap();

    let handle = std::thread::spawn(move || engine.select_next_state());

    let mut client = TestClient::connect(addr);
    client.read_handshake();
    // Never send a step.
    let err = handle.join().unwrap().unwrap_err();
    assert!(matches!(err, Error::StepTimeout));
}

#[test]
fn test_reset_channel_replies_default_state_and_counts_episodes() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, addr) = bound_engine(dir.path());

    let handle = std::thread::spawn(move || {
        let result = engine.select_next_state();
        (engine, result)
    });

    let mut client = TestClient::connect(addr);
    client.read_handshake();
    client.send(channel::RESET, None);
    let frame = client.read_frame();
    assert_eq!(frame.channel, channel::RESET);
    let values: Vec<f64> = serde_json::from_str(frame.payload_str()).unwrap();
    assert_eq!(values, vec![0.0, 0.0]);

    client.send(channel::STEP, Some("0"));
    let (engine, result) = handle.join().unwrap();
    assert_eq!(result.unwrap(), (0, 0));
    assert_eq!(engine.episodes(), 1);
}

#[test]
fn test_issue_report_does_not_terminate() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, addr) = bound_engine(dir.path());

    let handle = std::thread::spawn(move || {
        let result = engine.select_next_state();
        (engine, result)
    });

    let mut client = TestClient::connect(addr);
    client.read_handshake();
    // A reported issue is diagnostic only; the run keeps going.
    client.send(channel::ISSUE, Some("Traceback: something fell over"));
    client.send(channel::STEP, Some("1"));

    let (engine, result) = handle.join().unwrap();
    assert_eq!(result.unwrap(), (0, 1));
    assert!(engine.continue_iterating());
}

#[test]
fn test_reset_survives_stale_worker_disconnect() {
    let dir = tempfile::tempdir().unwrap();
    let (mut engine, addr) = bound_engine(dir.path());

    let handle = std::thread::spawn(move || {
        let (state, action) = engine.select_next_state().unwrap();
        assert_eq!((state, action), (0, 2));
        engine
            .process_results(&[0, 0], &[2], &[1, 0], 1.0, 5.0)
            .unwrap();
        engine.reset().unwrap();
        // The old worker notices the shutdown on its own thread and may
        // dispatch a late $DISCONNECT; give it time to land before checking.
        std::thread::sleep(Duration::from_millis(300));
        (
            engine.continue_iterating(),
            engine.episodes(),
            engine.steps(),
        )
    });

    let mut client = TestClient::connect(addr);
    client.read_handshake();
    client.send(channel::RESET, None);
    let frame = client.read_frame();
    assert_eq!(frame.channel, channel::RESET);
    client.send(channel::STEP, Some("2"));
    let reply = client.read_frame();
    assert_eq!(reply.channel, channel::STEP);

    let (iterating, episodes, steps) = handle.join().unwrap();
    assert!(
        iterating,
        "a stale worker's disconnect must not terminate the new run"
    );
    assert_eq!(episodes, 0);
    assert_eq!(steps, 0);
}

#[test]
fn test_get_results_before_finish_is_premature() {
    let engine = Engine::new(test_space(), EngineConfig::default());
    let err = engine.get_results().unwrap_err();
    assert!(matches!(err, Error::PrematureInvocation));
}

#[test]
fn test_reset_discards_termination_and_rebinds() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().with_save_dir(dir.path());
    let mut engine = Engine::new(test_space(), config);

    engine.finish_optimization().unwrap();
    assert!(!engine.continue_iterating());
    assert!(engine.get_results().is_ok());

    engine.reset().unwrap();
    assert!(engine.continue_iterating());
    assert!(matches!(
        engine.get_results().unwrap_err(),
        Error::PrematureInvocation
    ));
    assert_eq!(engine.steps(), 0);
    assert_eq!(engine.episodes(), 0);
    // The server is already rebound and waiting.
    assert!(engine.local_addr().is_ok());
}
