//! HTTP/2 server connection engine.
//!
//! The crate serves the server side of the HTTP/2 wire protocol over an
//! already-negotiated byte stream: it multiplexes concurrent request and
//! response exchanges, dispatches each request to an application
//! [`Handler`], and serializes responses back onto the same stream.
//!
//! # Architecture
//!
//! ```text
//!   TCP (+ TLS, negotiated elsewhere with ALPN "h2")
//!        |
//!   +----v--------------------------------------+
//!   | h2serve                                   |
//!   |  reader thread -> serve loop -> handlers  |
//!   |  frames + HPACK + flow control            |
//!   +-------------------------------------------+
//! ```
//!
//! One serve loop per connection owns every piece of protocol state and is
//! the only writer of outbound frames; a dedicated reader thread feeds it
//! parsed frames one at a time, and each request runs its handler on its
//! own thread, talking back to the loop over channels.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use h2serve::{Handler, Request, ResponseWriter, Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::default());
//! let handler: Arc<dyn Handler> = Arc::new(|rw: &mut ResponseWriter, req: &mut Request| {
//!     rw.headers().add("content-type", "text/plain");
//!     rw.write_body(format!("hello, {}\n", req.path).as_bytes()).unwrap();
//! });
//!
//! let listener = std::net::TcpListener::bind("127.0.0.1:8080")?;
//! for stream in listener.incoming() {
//!     let (server, handler) = (server.clone(), Arc::clone(&handler));
//!     std::thread::spawn(move || server.serve_tcp(stream?, handler));
//! }
//! ```

mod connection;
pub mod error;
pub mod flowcontrol;
pub mod frame;
pub mod headers;
pub mod hpack;
mod huffman;
mod pipe;
pub mod request;
pub mod response;
pub mod server;
pub mod settings;
mod stream;

pub use error::{Error, ErrorCode};
pub use frame::{Frame, FrameReader, FrameWriter, CLIENT_PREFACE};
pub use headers::HeaderMap;
pub use request::{Request, RequestBody, TlsState};
pub use response::ResponseWriter;
pub use server::{Handler, Server, ServerConfig, ALPN_H2};
pub use settings::Setting;
