//! Server entry points and the handler interface.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use log::debug;

use crate::connection;
use crate::request::Request;
use crate::response::ResponseWriter;

/// ALPN protocol identifier the surrounding TLS server must advertise so
/// clients negotiate HTTP/2.
pub const ALPN_H2: &[u8] = b"h2";

/// Per-server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Cap on concurrently open streams per connection; 0 means unlimited.
    /// Streams beyond the cap are refused with REFUSED_STREAM.
    pub max_streams: usize,
}

/// Application entry point, invoked once per request on its own thread.
///
/// The response writer and request body are safe to use for the whole call;
/// writes after the connection dies report broken-pipe errors. A panicking
/// handler is contained to its own stream.
pub trait Handler: Send + Sync {
    fn serve(&self, response: &mut ResponseWriter, request: &mut Request);
}

impl<F> Handler for F
where
    F: Fn(&mut ResponseWriter, &mut Request) + Send + Sync,
{
    fn serve(&self, response: &mut ResponseWriter, request: &mut Request) {
        self(response, request)
    }
}

/// An HTTP/2 server: configuration plus the connection entry points.
///
/// Listening, accepting, and TLS all happen outside; this type is handed
/// already-negotiated byte streams.
#[derive(Debug, Clone, Default)]
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Serve a connection whose byte stream is already split into reader
    /// and writer halves. Returns when the connection is done; the caller
    /// owns transport cleanup.
    pub fn serve_connection<R, W>(&self, reader: R, writer: W, handler: Arc<dyn Handler>)
    where
        R: Read + Send + 'static,
        W: Write,
    {
        connection::serve(reader, writer, handler, self.config.clone());
    }

    /// Serve a plaintext TCP connection, closing the socket when the serve
    /// loop exits so the reader thread unblocks.
    pub fn serve_tcp(&self, stream: TcpStream, handler: Arc<dyn Handler>) -> io::Result<()> {
        let peer = stream.peer_addr()?;
        debug!("HTTP/2 connection from {peer}");
        let reader = stream.try_clone()?;
        let writer = stream.try_clone()?;
        connection::serve(reader, writer, handler, self.config.clone());
        let _ = stream.shutdown(Shutdown::Both);
        debug!("HTTP/2 connection from {peer} done");
        Ok(())
    }
}
