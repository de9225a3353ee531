//! Bounded in-memory pipe carrying a request body from the serve loop to a
//! handler thread.
//!
//! The loop is the producer and never blocks: with the default inbound
//! window of 65535 bytes a conforming peer can never overrun the 64 KiB
//! ring, so a full ring means the peer ignored flow control and the write
//! fails. The handler is the consumer and blocks on the condvar until bytes
//! arrive or the pipe is closed. Close carries either clean EOF or a
//! terminal failure; reads drain buffered bytes first, then report it.

use std::collections::VecDeque;
use std::io;
use std::sync::{Condvar, Mutex};

/// Ring capacity, matching the inbound flow control window rounded up.
const CAPACITY: usize = 64 * 1024;

/// Terminal status of a closed pipe.
#[derive(Debug, Clone)]
pub(crate) enum PipeEnd {
    /// Body complete.
    Eof,
    /// Body failed; the message reaches the handler as an I/O error.
    Failed(String),
}

struct PipeState {
    buf: VecDeque<u8>,
    end: Option<PipeEnd>,
}

pub(crate) struct Pipe {
    state: Mutex<PipeState>,
    readable: Condvar,
}

impl Pipe {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PipeState {
                buf: VecDeque::new(),
                end: None,
            }),
            readable: Condvar::new(),
        }
    }

    /// Append `data`. Fails when the pipe is closed or the ring is full.
    pub fn write(&self, data: &[u8]) -> Result<(), ()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.end.is_some() || state.buf.len() + data.len() > CAPACITY {
            return Err(());
        }
        state.buf.extend(data);
        self.readable.notify_one();
        Ok(())
    }

    /// Close with a terminal status. The first close wins.
    pub fn close(&self, end: PipeEnd) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.end.is_none() {
            state.end = Some(end);
        }
        self.readable.notify_one();
    }

    /// Blocking read. Returns `Ok(0)` at clean EOF; a terminal failure is
    /// reported once all buffered bytes have been drained.
    pub fn read(&self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if !state.buf.is_empty() {
                let n = state.buf.len().min(out.len());
                for slot in out.iter_mut().take(n) {
                    *slot = state.buf.pop_front().unwrap_or_default();
                }
                return Ok(n);
            }
            match &state.end {
                Some(PipeEnd::Eof) => return Ok(0),
                Some(PipeEnd::Failed(msg)) => return Err(io::Error::other(msg.clone())),
                None => {
                    state = self
                        .readable
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }
}
