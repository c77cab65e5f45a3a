//! Fixed-capacity console ring
//!
//! # Thread Safety
//! - One producer (the emulation thread) calls [`ConsoleChannel::write`] and
//!   [`ConsoleChannel::write_args`]
//! - One consumer (the UI thread) calls the `read` family
//! - Producers are serialized by a producer lock and consumers by a consumer
//!   lock, so extra callers on either side wait their turn rather than race
//! - `writable` counts free bytes and `readable` counts filled bytes; their
//!   sum equals the capacity whenever no operation is in flight
//!
//! # Write paths
//! A write first renders straight into the contiguous free tail of the ring,
//! measuring as it goes. If the whole message landed there it is committed
//! in one segment with no allocation. Otherwise the message is rendered into
//! a separate scratch buffer and copied into the ring in segments bounded by
//! the tail, wrapping the cursor to zero as each tail is filled. Space is
//! only reserved after the rendered length is known, so a formatting error
//! commits nothing.

use super::bounded::BoundedWriter;
use super::semaphore::Semaphore;
use super::ConsoleDest;
use crate::cancel::CancelToken;
use crate::events::{HostEvent, HostEvents, NullEvents};
use crate::{EmuHostError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bounded, blocking byte channel for console output
pub struct ConsoleChannel {
    /// Ring storage; locked only while bytes are rendered or copied
    storage: Mutex<Box<[u8]>>,
    /// Producer cursor (next byte to write)
    write_pos: Mutex<usize>,
    /// Consumer cursor (next byte to read)
    read_pos: Mutex<usize>,
    /// Free bytes
    writable: Semaphore,
    /// Filled bytes
    readable: Semaphore,
    capacity: usize,
    events: Arc<dyn HostEvents>,
    cancel: Arc<CancelToken>,
}

impl ConsoleChannel {
    /// Create a channel that emits no notifications
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is 0.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_events(capacity, Arc::new(NullEvents))
    }

    /// Create a channel that emits [`HostEvent::ConsoleReady`] once per
    /// committed segment
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is 0.
    pub fn with_events(capacity: usize, events: Arc<dyn HostEvents>) -> Result<Self> {
        Self::with_parts(capacity, events, Arc::new(CancelToken::new()))
    }

    pub(crate) fn with_parts(
        capacity: usize,
        events: Arc<dyn HostEvents>,
        cancel: Arc<CancelToken>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(EmuHostError::config(
                "console capacity must be greater than 0",
            ));
        }

        Ok(ConsoleChannel {
            storage: Mutex::new(vec![0u8; capacity].into_boxed_slice()),
            write_pos: Mutex::new(0),
            read_pos: Mutex::new(0),
            writable: Semaphore::new(capacity),
            readable: Semaphore::new(0),
            capacity,
            events,
            cancel,
        })
    }

    /// Ring size in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes a producer can write right now without blocking
    pub fn writable_count(&self) -> usize {
        self.writable.available()
    }

    /// Bytes a consumer can read right now without blocking
    pub fn readable_count(&self) -> usize {
        self.readable.available()
    }

    /// Write pre-rendered text, blocking while the ring lacks space
    pub fn write(&self, dest: ConsoleDest, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut cursor = self.write_pos.lock();
        self.commit(&mut cursor, dest, text.as_bytes());
    }

    /// Render `args` and write the result, blocking while the ring lacks space
    ///
    /// A formatting error drops the message silently: no bytes are
    /// committed and no notification is sent.
    pub fn write_args(&self, dest: ConsoleDest, args: fmt::Arguments<'_>) {
        let mut cursor = self.write_pos.lock();
        let start = *cursor;

        // The free region always begins at the write cursor, and only this
        // producer can shrink it.
        let space = self.writable.available().min(self.capacity - start);
        let size = {
            let mut storage = self.storage.lock();
            let mut sink = BoundedWriter::new(&mut storage[start..start + space]);
            if fmt::write(&mut sink, args).is_err() {
                return;
            }
            if sink.fits() {
                let size = sink.len();
                drop(storage);
                if size > 0 {
                    self.writable.acquire(size, &self.cancel);
                    *cursor = (start + size) % self.capacity;
                    self.readable.release(size);
                    self.events.emit(HostEvent::ConsoleReady(dest));
                }
                return;
            }
            sink.len()
        };

        let mut scratch = String::with_capacity(size);
        if fmt::write(&mut scratch, args).is_err() {
            return;
        }
        self.commit(&mut cursor, dest, scratch.as_bytes());
    }

    /// Copy `bytes` into the ring in tail-bounded segments
    fn commit(&self, cursor: &mut usize, dest: ConsoleDest, mut bytes: &[u8]) {
        let mut tail = self.capacity - *cursor;
        while bytes.len() >= tail {
            let (chunk, rest) = bytes.split_at(tail);
            self.writable.acquire(tail, &self.cancel);
            self.storage.lock()[*cursor..].copy_from_slice(chunk);
            *cursor = 0;
            self.readable.release(tail);
            self.events.emit(HostEvent::ConsoleReady(dest));
            bytes = rest;
            tail = self.capacity;
        }

        if !bytes.is_empty() {
            let len = bytes.len();
            self.writable.acquire(len, &self.cancel);
            self.storage.lock()[*cursor..*cursor + len].copy_from_slice(bytes);
            *cursor += len;
            self.readable.release(len);
            self.events.emit(HostEvent::ConsoleReady(dest));
        }
    }

    /// Take every readable byte, blocking until at least one exists
    pub fn read(&self) -> Vec<u8> {
        let mut cursor = self.read_pos.lock();
        let n = self.readable.acquire_all(1);
        self.take(&mut cursor, n)
    }

    /// Take every readable byte without blocking
    pub fn try_read(&self) -> Option<Vec<u8>> {
        let mut cursor = self.read_pos.lock();
        match self.readable.try_acquire_all() {
            0 => None,
            n => Some(self.take(&mut cursor, n)),
        }
    }

    /// Take every readable byte, waiting at most `timeout` for the first one
    pub fn read_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut cursor = self.read_pos.lock();
        match self.readable.acquire_all_until(1, deadline) {
            0 => None,
            n => Some(self.take(&mut cursor, n)),
        }
    }

    /// Copy out `n` reserved bytes and hand their space back to the producer
    fn take(&self, cursor: &mut usize, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        {
            let storage = self.storage.lock();
            let first = n.min(self.capacity - *cursor);
            out.extend_from_slice(&storage[*cursor..*cursor + first]);
            out.extend_from_slice(&storage[..n - first]);
        }
        *cursor = (*cursor + n) % self.capacity;
        self.writable.release(n);
        out
    }
}

impl fmt::Debug for ConsoleChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleChannel")
            .field("capacity", &self.capacity)
            .field("writable", &self.writable_count())
            .field("readable", &self.readable_count())
            .finish()
    }
}
