use emu_host::{ConsoleChannel, ConsoleDest, EventLog, HostEvent};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn full_ring_blocks_writer_until_read() {
    let channel = Arc::new(ConsoleChannel::new(16).unwrap());
    channel.write(ConsoleDest::Normal, "HELLO");
    channel.write(ConsoleDest::Normal, "WORLD!!!!!!");
    assert_eq!(channel.writable_count(), 0);
    assert_eq!(channel.readable_count(), 16);

    let writer = Arc::clone(&channel);
    let handle = thread::spawn(move || writer.write(ConsoleDest::Normal, "?"));
    thread::sleep(Duration::from_millis(30));
    assert!(!handle.is_finished(), "writer should block on a full ring");

    assert_eq!(channel.read(), b"HELLOWORLD!!!!!!");
    handle.join().unwrap();
    assert_eq!(channel.read(), b"?");
}

#[test]
fn message_larger_than_capacity_streams_through() {
    let log = Arc::new(EventLog::new());
    let channel = Arc::new(ConsoleChannel::with_events(8, log.clone()).unwrap());
    let message: String = (0..100).map(|i| char::from(b'a' + (i % 26) as u8)).collect();

    let writer = Arc::clone(&channel);
    let expected = message.clone();
    let handle = thread::spawn(move || {
        writer.write_args(ConsoleDest::Error, format_args!("{}", message));
    });

    let mut received = Vec::new();
    while received.len() < expected.len() {
        if let Some(bytes) = channel.read_timeout(Duration::from_secs(5)) {
            assert!(bytes.len() <= channel.capacity());
            received.extend_from_slice(&bytes);
        } else {
            panic!("reader starved after {} bytes", received.len());
        }
    }
    handle.join().unwrap();

    assert_eq!(received, expected.as_bytes());
    assert!(log.count(&HostEvent::ConsoleReady(ConsoleDest::Error)) >= 100 / 8);
    assert_eq!(channel.writable_count(), 8);
}

#[test]
fn contended_writes_stay_ordered_and_whole() {
    let channel = Arc::new(ConsoleChannel::new(32).unwrap());

    let writer = Arc::clone(&channel);
    let handle = thread::spawn(move || {
        for i in 0..200 {
            writer.write_args(ConsoleDest::Normal, format_args!("<{i:03}>"));
        }
    });

    let mut received = Vec::new();
    while received.len() < 200 * 5 {
        let bytes = channel
            .read_timeout(Duration::from_secs(5))
            .expect("producer stalled");
        received.extend_from_slice(&bytes);
        let used = channel.readable_count() + channel.writable_count();
        assert!(used <= channel.capacity());
    }
    handle.join().unwrap();

    let expected: String = (0..200).map(|i| format!("<{i:03}>")).collect();
    assert_eq!(String::from_utf8(received).unwrap(), expected);
}

#[test]
fn counts_sum_to_capacity_when_idle() {
    let channel = ConsoleChannel::new(10).unwrap();
    for text in ["abc", "defgh", "ij"] {
        channel.write(ConsoleDest::Normal, text);
        assert_eq!(channel.readable_count() + channel.writable_count(), 10);
    }
    assert_eq!(channel.try_read().unwrap(), b"abcdefghij");

    channel.write(ConsoleDest::Normal, "wrapped");
    assert_eq!(channel.readable_count(), 7);
    assert_eq!(channel.writable_count(), 3);
    assert_eq!(channel.try_read().unwrap(), b"wrapped");
    assert!(channel.try_read().is_none());
}
