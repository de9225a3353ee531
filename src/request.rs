//! The request view handed to handlers.

use std::io::{self, Read};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::connection::WindowUpdateReq;
use crate::headers::HeaderMap;
use crate::pipe::{Pipe, PipeEnd};

/// TLS connection details for requests that arrived over an encrypted
/// stream. Negotiation happens outside this crate, so this is a stub the
/// surrounding TLS server may grow.
#[derive(Debug, Clone, Default)]
pub struct TlsState {
    /// Negotiated ALPN protocol, when known.
    pub alpn_protocol: Option<String>,
}

/// One decoded HTTP/2 request.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub scheme: String,
    pub authority: String,
    /// Canonically-keyed headers with cookie values coalesced.
    pub headers: HeaderMap,
    /// Declared Content-Length, or -1 when undeclared.
    pub content_length: i64,
    /// Present when the request scheme is https.
    pub tls: Option<TlsState>,
    pub body: RequestBody,
}

impl Request {
    /// Protocol string, always "HTTP/2.0".
    pub fn protocol(&self) -> &'static str {
        "HTTP/2.0"
    }
}

/// Streaming request body reader.
///
/// Reads block until DATA arrives from the peer or the body ends. Consumed
/// bytes are reported to the serve loop, which returns the flow control
/// credit to the peer as WINDOW_UPDATE frames on both the connection and
/// the stream.
pub struct RequestBody {
    stream_id: u32,
    pipe: Option<Arc<Pipe>>,
    window_update: Sender<WindowUpdateReq>,
    closed: bool,
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBody")
            .field("stream_id", &self.stream_id)
            .field("has_body", &self.pipe.is_some())
            .finish()
    }
}

impl RequestBody {
    pub(crate) fn new(
        stream_id: u32,
        pipe: Option<Arc<Pipe>>,
        window_update: Sender<WindowUpdateReq>,
    ) -> Self {
        Self {
            stream_id,
            pipe,
            window_update,
            closed: false,
        }
    }

    /// Give up on the rest of the body. Later loop writes into the pipe
    /// fail, which resets the stream.
    pub fn close(&mut self) {
        if let Some(pipe) = &self.pipe {
            pipe.close(PipeEnd::Failed("body closed by handler".into()));
        }
        self.closed = true;
    }

    /// Ask the loop to return `n` bytes of credit, split into increments no
    /// larger than 2^31 - 1.
    fn replenish(&self, n: usize) {
        const MAX_INCREMENT: usize = 0x7fff_ffff;
        let mut rest = n;
        while rest > 0 {
            let inc = rest.min(MAX_INCREMENT);
            rest -= inc;
            let req = WindowUpdateReq {
                stream_id: self.stream_id,
                n: inc as u32,
            };
            // A closed loop means the connection is gone; credit no longer
            // matters.
            if self.window_update.send(req).is_err() {
                return;
            }
        }
    }
}

impl Read for RequestBody {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let Some(pipe) = &self.pipe else {
            return Ok(0); // no body expected: immediate EOF
        };
        if self.closed {
            return Err(io::Error::other("body closed by handler"));
        }
        let n = pipe.read(out)?;
        if n > 0 {
            self.replenish(n);
        }
        Ok(n)
    }
}
