//! Per-stream server state (RFC 7540 Section 5.1).

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::Sender;

use crate::flowcontrol::FlowControl;
use crate::pipe::Pipe;

/// Stream state. Idle and Closed streams are never stored in the stream
/// table; they exist only as conceptual endpoints of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub(crate) enum StreamState {
    Idle,
    Open,
    /// Peer sent END_STREAM; no more inbound data.
    HalfClosedRemote,
    /// We sent END_STREAM; no more outbound data.
    HalfClosedLocal,
    Closed,
}

/// A body write that ran out of flow control credit. The unwritten tail
/// stays parked on the stream until WINDOW_UPDATE (or a window-growing
/// SETTINGS change) lets the loop resume it; the handler stays blocked on
/// `done` the whole time.
pub(crate) struct ParkedWrite {
    pub data: Bytes,
    pub end_stream: bool,
    pub done: Sender<io::Result<()>>,
}

pub(crate) struct Stream {
    pub id: u32,
    pub state: StreamState,
    /// Outbound credit for DATA written to the peer.
    pub flow: FlowControl,
    /// Present iff a request body is expected.
    pub body: Option<Arc<Pipe>>,
    /// DATA payload bytes received so far.
    pub bytes_seen: i64,
    /// Content-Length value, or -1 when undeclared.
    pub declared_body_bytes: i64,
    pub parked: Option<ParkedWrite>,
}

impl Stream {
    pub fn new(id: u32, state: StreamState, initial_window: i32) -> Self {
        Self {
            id,
            state,
            flow: FlowControl::new(i64::from(initial_window)),
            body: None,
            bytes_seen: 0,
            declared_body_bytes: -1,
            parked: None,
        }
    }
}
