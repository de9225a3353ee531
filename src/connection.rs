//! The per-connection serve loop.
//!
//! Three kinds of thread cooperate over one connection:
//!
//! ```text
//!   transport bytes
//!        |
//!   +----v---------+   read_frame (cap 1)    +--------------------+
//!   | reader thread|------------------------->                    |
//!   |  FrameReader |<---- done signal -------|     serve loop     |
//!   +--------------+                         |  owns ALL protocol |
//!                                            |  state + FrameWriter|
//!   +--------------+   header_write (cap 0)  |                    |
//!   | handler      |------------------------->                    |
//!   | threads      |   data_write   (cap 0)  |                    |
//!   | (one/stream) |------------------------->                    |
//!   |              |   window_update (cap 8) |                    |
//!   +--------------+------------------------->+-------------------+
//! ```
//!
//! The loop is the only thread that touches the stream table, the flow
//! control windows, the HPACK contexts, or the outbound framer. Handlers
//! reach the wire exclusively through the channels above; the reader parses
//! at most one frame ahead of the loop because its scratch buffer is reused
//! and the single-slot handoff makes it wait for the done signal.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, trace};

use crate::error::{Error, ErrorCode};
use crate::flowcontrol::{FlowControl, DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE};
use crate::frame::{Frame, FrameReader, FrameWriter, HeadersParam};
use crate::headers::{canonical_header_name, valid_wire_header_name, HeaderMap};
use crate::hpack;
use crate::pipe::{Pipe, PipeEnd};
use crate::request::{Request, RequestBody, TlsState};
use crate::response::ResponseWriter;
use crate::server::{Handler, ServerConfig};
use crate::settings::{
    Setting, SETTINGS_ENABLE_PUSH, SETTINGS_INITIAL_WINDOW_SIZE, SETTINGS_MAX_FRAME_SIZE,
};
use crate::stream::{ParkedWrite, Stream, StreamState};

/// Initial stream/connection window size before any SETTINGS.
const INITIAL_WINDOW_SIZE: i32 = DEFAULT_WINDOW_SIZE as i32;

/// Largest frame payload we accept or emit before SETTINGS changes it.
const INITIAL_MAX_FRAME_SIZE: u32 = 16384;

/// Initial HPACK dynamic table size (RFC 7540 Section 6.5.2).
const INITIAL_HEADER_TABLE_SIZE: usize = 4096;

/// A frame plus the signal that lets the reader parse the next one.
struct FrameAndDone {
    frame: Frame,
    done: Sender<()>,
}

/// A handler's committed response headers.
pub(crate) struct HeaderWriteReq {
    pub stream_id: u32,
    pub status: u16,
    pub headers: HeaderMap,
    pub end_stream: bool,
}

/// A handler's body bytes; `done` fires once every byte is on the wire.
pub(crate) struct DataWriteReq {
    pub stream_id: u32,
    pub data: Bytes,
    pub end_stream: bool,
    pub done: Sender<io::Result<()>>,
}

/// Flow control credit to hand back to the peer.
pub(crate) struct WindowUpdateReq {
    pub stream_id: u32,
    pub n: u32,
}

/// Transient state while a header block (HEADERS + CONTINUATIONs) is read.
struct HeaderAssembly {
    stream_id: u32,
    block: Vec<u8>,
    headers: HeaderMap,
    method: String,
    path: String,
    scheme: String,
    authority: String,
    saw_regular: bool,
    invalid: bool,
}

impl HeaderAssembly {
    fn new(stream_id: u32) -> Self {
        Self {
            stream_id,
            block: Vec::new(),
            headers: HeaderMap::new(),
            method: String::new(),
            path: String::new(),
            scheme: String::new(),
            authority: String::new(),
            saw_regular: false,
            invalid: false,
        }
    }
}

/// Everything the serve loop owns. No other thread sees these fields.
struct ServerConn<W: Write> {
    framer: FrameWriter<W>,
    handler: Arc<dyn Handler>,
    config: ServerConfig,

    // Sender sides, cloned into request bodies and response writers.
    header_write_tx: Sender<HeaderWriteReq>,
    data_write_tx: Sender<DataWriteReq>,
    window_update_tx: Sender<WindowUpdateReq>,

    /// Largest client stream id ever observed.
    max_stream_id: u32,
    streams: HashMap<u32, Stream>,
    initial_window_size: i32,
    max_write_frame_size: u32,
    /// Connection-wide outbound window.
    conn_flow: FlowControl,
    sent_goaway: bool,
    assembly: Option<HeaderAssembly>,
    /// Lowercase wire name -> canonical display name.
    canon_header: HashMap<String, String>,
    hpack_dec: hpack::Decoder,
    hpack_enc: hpack::Encoder,
    /// Reused buffer for encoded response header blocks.
    encode_buf: Vec<u8>,
}

/// Serve one connection until the peer goes away or a connection error
/// terminates it. All outcomes are logged rather than returned: once the
/// handshake is done there is nobody left to hand an error to.
pub(crate) fn serve<R, W>(reader: R, writer: W, handler: Arc<dyn Handler>, config: ServerConfig)
where
    R: Read + Send + 'static,
    W: Write,
{
    let mut frame_reader = FrameReader::new(reader);
    if let Err(e) = frame_reader.read_client_preface() {
        error!("error reading client preface: {e}");
        return;
    }

    let (header_write_tx, header_write_rx) = bounded(0);
    let (data_write_tx, data_write_rx) = bounded(0);
    let (window_update_tx, window_update_rx) = bounded(8);
    let mut conn = ServerConn {
        framer: FrameWriter::new(writer),
        handler,
        config,
        header_write_tx,
        data_write_tx,
        window_update_tx,
        max_stream_id: 0,
        streams: HashMap::new(),
        initial_window_size: INITIAL_WINDOW_SIZE,
        max_write_frame_size: INITIAL_MAX_FRAME_SIZE,
        conn_flow: FlowControl::default(),
        sent_goaway: false,
        assembly: None,
        canon_header: HashMap::new(),
        hpack_dec: hpack::Decoder::new(INITIAL_HEADER_TABLE_SIZE),
        hpack_enc: hpack::Encoder::new(INITIAL_HEADER_TABLE_SIZE),
        encode_buf: Vec::new(),
    };

    // The prologue: exactly one SETTINGS frame, then our SETTINGS + ACK.
    let first = match frame_reader.read_frame(INITIAL_MAX_FRAME_SIZE) {
        Ok(f) => f,
        Err(e) => {
            error!("error reading initial frame: {e}");
            return;
        }
    };
    let Frame::Settings { settings, .. } = first else {
        error!("invalid initial frame from client, expected SETTINGS");
        return;
    };
    if let Err(e) = conn.apply_settings(&settings) {
        error!("initial settings error: {e}");
        return;
    }
    if let Err(e) = conn.framer.write_settings(&[]) {
        error!("error writing server settings: {e}");
        return;
    }
    if let Err(e) = conn.framer.write_settings_ack() {
        error!("error writing settings ack: {e}");
        return;
    }

    let (frame_tx, frame_rx) = bounded(1);
    let (read_err_tx, read_err_rx) = bounded(1);
    thread::spawn(move || read_frames(frame_reader, frame_tx, read_err_tx));

    conn.run(frame_rx, read_err_rx, header_write_rx, data_write_rx, window_update_rx);
}

/// Reader thread body: parse a frame, hand it to the loop, wait for the
/// done signal before parsing the next (the reader's scratch buffer allows
/// only one outstanding frame).
fn read_frames<R: Read>(
    mut reader: FrameReader<R>,
    frames: Sender<FrameAndDone>,
    read_err: Sender<Error>,
) {
    let (done_tx, done_rx) = bounded(1);
    loop {
        match reader.read_frame(INITIAL_MAX_FRAME_SIZE) {
            Ok(frame) => {
                let handoff = FrameAndDone {
                    frame,
                    done: done_tx.clone(),
                };
                if frames.send(handoff).is_err() {
                    return; // loop exited
                }
                if done_rx.recv().is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = read_err.send(e);
                return; // dropping `frames` tells the loop we are done
            }
        }
    }
}

impl<W: Write> ServerConn<W> {
    fn run(
        mut self,
        frame_rx: Receiver<FrameAndDone>,
        read_err_rx: Receiver<Error>,
        header_write_rx: Receiver<HeaderWriteReq>,
        data_write_rx: Receiver<DataWriteReq>,
        window_update_rx: Receiver<WindowUpdateReq>,
    ) {
        loop {
            crossbeam_channel::select! {
                recv(header_write_rx) -> req => {
                    let Ok(req) = req else { return };
                    if let Err(e) = self.write_headers_in_loop(req) {
                        self.log_terminal(&e, "error writing response headers");
                        self.teardown();
                        return;
                    }
                }
                recv(data_write_rx) -> req => {
                    let Ok(req) = req else { return };
                    if let Err(e) = self.write_data_in_loop(req) {
                        self.log_terminal(&e, "error writing response data");
                        self.teardown();
                        return;
                    }
                }
                recv(window_update_rx) -> req => {
                    let Ok(req) = req else { return };
                    if let Err(e) = self.write_window_update_in_loop(req) {
                        self.log_terminal(&e, "error writing window update");
                        self.teardown();
                        return;
                    }
                }
                recv(frame_rx) -> handoff => {
                    let Ok(FrameAndDone { frame, done }) = handoff else {
                        // Reader is gone; it left its reason on the error
                        // channel.
                        if let Ok(e) = read_err_rx.recv() {
                            self.log_terminal(&e, "client stopped sending frames");
                        }
                        self.teardown();
                        return;
                    };
                    trace!("got frame: {frame:?}");
                    let result = self.process_frame(frame);
                    let _ = done.send(()); // let the reader parse the next frame
                    match result {
                        Ok(()) => {}
                        Err(Error::Stream { id, code }) => {
                            if let Err(e) = self.reset_stream(id, code) {
                                self.log_terminal(&e, "error writing RST_STREAM");
                                self.teardown();
                                return;
                            }
                        }
                        Err(Error::GoAwayFlow) => {
                            self.sent_goaway = true;
                            if let Err(e) = self.framer.write_goaway(
                                self.max_stream_id,
                                ErrorCode::FlowControlError,
                                &[],
                            ) {
                                error!("failed to write GOAWAY: {e}");
                            }
                            self.teardown();
                            return;
                        }
                        Err(e) => {
                            self.log_terminal(&e, "disconnecting");
                            self.teardown();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Closed-transport errors are routine and logged quietly.
    fn log_terminal(&self, e: &Error, what: &str) {
        if e.is_closed_transport() {
            debug!("{what}: {e}");
        } else {
            error!("{what}: {e}");
        }
    }

    /// Unblock every handler before the loop exits: close body pipes and
    /// fail parked writes.
    fn teardown(&mut self) {
        for (_, stream) in self.streams.drain() {
            if let Some(body) = &stream.body {
                body.close(PipeEnd::Failed("connection closed".into()));
            }
            if let Some(parked) = stream.parked {
                let _ = parked.done.send(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection closed",
                )));
            }
        }
    }

    // -- Inbound frame dispatch --

    fn process_frame(&mut self, frame: Frame) -> Result<(), Error> {
        // While a header block is being assembled, only CONTINUATION frames
        // on that same stream are legal.
        if let Some(assembly) = &self.assembly {
            let expected = assembly.stream_id;
            match &frame {
                Frame::Continuation { stream_id, .. } if *stream_id == expected => {}
                _ => return Err(Error::Connection(ErrorCode::ProtocolError)),
            }
        }

        match frame {
            Frame::Settings { ack, settings } => {
                if ack {
                    return Ok(());
                }
                self.apply_settings(&settings)?;
                self.framer.write_settings_ack()?;
                Ok(())
            }
            Frame::Headers {
                stream_id,
                fragment,
                end_stream,
                end_headers,
            } => self.process_headers(stream_id, fragment, end_stream, end_headers),
            Frame::Continuation {
                stream_id,
                fragment,
                end_headers,
            } => self.process_continuation(stream_id, fragment, end_headers),
            Frame::Data {
                stream_id,
                payload,
                end_stream,
            } => self.process_data(stream_id, &payload, end_stream),
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => self.process_window_update(stream_id, increment),
            Frame::Ping {
                stream_id,
                ack,
                payload,
            } => {
                if ack {
                    return Ok(());
                }
                if stream_id != 0 {
                    return Err(Error::Connection(ErrorCode::ProtocolError));
                }
                self.framer.write_ping(true, payload)?;
                Ok(())
            }
            Frame::RstStream { .. }
            | Frame::Priority { .. }
            | Frame::PushPromise { .. }
            | Frame::GoAway { .. }
            | Frame::Unknown { .. } => {
                debug!("ignoring frame: {frame:?}");
                Ok(())
            }
        }
    }

    fn process_headers(
        &mut self,
        id: u32,
        fragment: Vec<u8>,
        end_stream: bool,
        end_headers: bool,
    ) -> Result<(), Error> {
        if self.sent_goaway {
            return Ok(());
        }
        // Client streams are odd and strictly increasing; a new HEADERS
        // while another header block is open is equally fatal.
        if id % 2 != 1 || id <= self.max_stream_id || self.assembly.is_some() {
            return Err(Error::Connection(ErrorCode::ProtocolError));
        }
        self.max_stream_id = id;
        let state = if end_stream {
            StreamState::HalfClosedRemote
        } else {
            StreamState::Open
        };
        self.streams
            .insert(id, Stream::new(id, state, self.initial_window_size));
        self.assembly = Some(HeaderAssembly::new(id));
        self.append_header_fragment(fragment, end_headers)
    }

    fn process_continuation(
        &mut self,
        id: u32,
        fragment: Vec<u8>,
        end_headers: bool,
    ) -> Result<(), Error> {
        let in_assembly = self.assembly.as_ref().map(|a| a.stream_id);
        if in_assembly != Some(id) || !self.streams.contains_key(&id) {
            return Err(Error::Connection(ErrorCode::ProtocolError));
        }
        self.append_header_fragment(fragment, end_headers)
    }

    fn append_header_fragment(&mut self, fragment: Vec<u8>, end: bool) -> Result<(), Error> {
        let Some(assembly) = self.assembly.as_mut() else {
            return Err(Error::Connection(ErrorCode::InternalError));
        };
        assembly.block.extend_from_slice(&fragment);
        if !end {
            return Ok(());
        }
        self.finish_header_block()
    }

    /// End of the header block: run the HPACK decoder over the accumulated
    /// fragments, classifying each field into the assembly record, then
    /// validate and spawn the handler.
    fn finish_header_block(&mut self) -> Result<(), Error> {
        let Some(mut assembly) = self.assembly.take() else {
            return Err(Error::Connection(ErrorCode::InternalError));
        };
        let block = std::mem::take(&mut assembly.block);
        let decoded = self.hpack_dec.decode_with(&block, |field| {
            on_header_field(&mut assembly, &mut self.canon_header, field);
        });
        if decoded.is_err() {
            // The dynamic table is out of sync with the peer; no further
            // block can be trusted.
            return Err(Error::Connection(ErrorCode::CompressionError));
        }

        let id = assembly.stream_id;
        if assembly.invalid
            || assembly.method.is_empty()
            || assembly.path.is_empty()
            || (assembly.scheme != "http" && assembly.scheme != "https")
        {
            // 8.1.2.6: malformed requests are a stream error.
            return Err(Error::Stream {
                id,
                code: ErrorCode::ProtocolError,
            });
        }
        if self.config.max_streams != 0 && self.streams.len() > self.config.max_streams {
            // The block was still decoded above: HPACK state must advance
            // even for streams we refuse.
            return Err(Error::Stream {
                id,
                code: ErrorCode::RefusedStream,
            });
        }

        let mut authority = assembly.authority;
        if authority.is_empty() {
            authority = assembly.headers.get("Host").unwrap_or_default().to_string();
        }

        let body_expected = self
            .streams
            .get(&id)
            .is_some_and(|st| st.state == StreamState::Open);
        let mut content_length = -1;
        let mut pipe = None;
        if body_expected {
            content_length = assembly
                .headers
                .get("Content-Length")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|&n| n >= 0)
                .unwrap_or(-1);
            let shared = Arc::new(Pipe::new());
            if let Some(st) = self.streams.get_mut(&id) {
                st.body = Some(Arc::clone(&shared));
                st.declared_body_bytes = content_length;
            }
            pipe = Some(shared);
        }

        let tls = (assembly.scheme == "https").then(TlsState::default);
        let request = Request {
            method: assembly.method,
            path: assembly.path,
            scheme: assembly.scheme,
            authority,
            headers: assembly.headers,
            content_length,
            tls,
            body: RequestBody::new(id, pipe, self.window_update_tx.clone()),
        };
        let response = ResponseWriter::new(
            id,
            self.header_write_tx.clone(),
            self.data_write_tx.clone(),
        );
        let handler = Arc::clone(&self.handler);
        thread::spawn(move || run_handler(handler, response, request));
        Ok(())
    }

    fn process_data(&mut self, id: u32, payload: &[u8], end_stream: bool) -> Result<(), Error> {
        let stream_closed = Error::Stream {
            id,
            code: ErrorCode::StreamClosed,
        };
        let Some(st) = self.streams.get_mut(&id) else {
            return Err(stream_closed);
        };
        if st.state != StreamState::Open && st.state != StreamState::HalfClosedLocal {
            return Err(stream_closed);
        }
        let Some(body) = st.body.as_ref() else {
            return Err(stream_closed);
        };

        let len = payload.len() as i64;
        if st.declared_body_bytes != -1 && st.bytes_seen + len > st.declared_body_bytes {
            body.close(PipeEnd::Failed(format!(
                "sender tried to send more than declared content-length of {} bytes",
                st.declared_body_bytes
            )));
            return Err(stream_closed);
        }
        if !payload.is_empty() {
            if body.write(payload).is_err() {
                return Err(stream_closed);
            }
            st.bytes_seen += len;
        }
        if end_stream {
            if st.declared_body_bytes != -1 && st.declared_body_bytes != st.bytes_seen {
                body.close(PipeEnd::Failed(format!(
                    "request declared a content-length of {} but sent {} bytes",
                    st.declared_body_bytes, st.bytes_seen
                )));
            } else {
                body.close(PipeEnd::Eof);
            }
            self.close_remote(id);
        }
        Ok(())
    }

    fn process_window_update(&mut self, id: u32, increment: u32) -> Result<(), Error> {
        if id == 0 {
            self.conn_flow
                .increase(increment)
                .map_err(|_| Error::GoAwayFlow)?;
            return self.resume_parked_writes();
        }
        let Some(st) = self.streams.get_mut(&id) else {
            // WINDOW_UPDATE can legitimately arrive for a stream we already
            // closed; not an error.
            return Ok(());
        };
        st.flow.increase(increment).map_err(|_| Error::Stream {
            id,
            code: ErrorCode::FlowControlError,
        })?;
        self.resume_parked_write(id)
    }

    // -- Settings --

    fn apply_settings(&mut self, settings: &[Setting]) -> Result<(), Error> {
        for s in settings {
            trace!("processing setting {} = {}", s.name(), s.value);
            match s.id {
                SETTINGS_INITIAL_WINDOW_SIZE => self.apply_initial_window_size(s.value)?,
                SETTINGS_MAX_FRAME_SIZE => {
                    if !(16384..=16_777_215).contains(&s.value) {
                        return Err(Error::Connection(ErrorCode::ProtocolError));
                    }
                    self.max_write_frame_size = s.value;
                }
                SETTINGS_ENABLE_PUSH => {
                    if s.value > 1 {
                        return Err(Error::Connection(ErrorCode::ProtocolError));
                    }
                }
                _ => debug!("ignoring setting {} = {}", s.name(), s.value),
            }
        }
        Ok(())
    }

    fn apply_initial_window_size(&mut self, value: u32) -> Result<(), Error> {
        if i64::from(value) > MAX_WINDOW_SIZE {
            // 6.5.2: values above 2^31-1 are a connection flow control
            // error.
            return Err(Error::Connection(ErrorCode::FlowControlError));
        }
        let old = self.initial_window_size;
        self.initial_window_size = value as i32;
        let delta = i64::from(self.initial_window_size) - i64::from(old);
        for st in self.streams.values_mut() {
            // 6.9.2: the delta applies to every stream window; overflow is
            // a connection error.
            st.flow
                .adjust(delta)
                .map_err(|_| Error::Connection(ErrorCode::FlowControlError))?;
        }
        if delta > 0 {
            self.resume_parked_writes()?;
        }
        Ok(())
    }

    // -- Outbound writes requested by handlers --

    fn write_headers_in_loop(&mut self, req: HeaderWriteReq) -> Result<(), Error> {
        let mut fields = Vec::with_capacity(1 + req.headers.len());
        fields.push(hpack::HeaderField::new(
            b":status".as_slice(),
            req.status.to_string().into_bytes(),
        ));
        for (name, values) in req.headers.iter() {
            let wire_name = name.to_ascii_lowercase().into_bytes();
            for value in values {
                fields.push(hpack::HeaderField::new(
                    wire_name.clone(),
                    value.clone().into_bytes(),
                ));
            }
        }
        self.encode_buf.clear();
        self.hpack_enc.encode(&fields, &mut self.encode_buf);

        let max = self.max_write_frame_size as usize;
        if self.encode_buf.len() <= max {
            self.framer.write_headers(HeadersParam {
                stream_id: req.stream_id,
                fragment: &self.encode_buf,
                end_stream: req.end_stream,
                end_headers: true,
            })?;
        } else {
            self.framer.write_headers(HeadersParam {
                stream_id: req.stream_id,
                fragment: &self.encode_buf[..max],
                end_stream: req.end_stream,
                end_headers: false,
            })?;
            let mut offset = max;
            while offset < self.encode_buf.len() {
                let end = (offset + max).min(self.encode_buf.len());
                self.framer.write_continuation(
                    req.stream_id,
                    &self.encode_buf[offset..end],
                    end == self.encode_buf.len(),
                )?;
                offset = end;
            }
        }
        if req.end_stream {
            self.close_local(req.stream_id);
        }
        Ok(())
    }

    fn write_data_in_loop(&mut self, req: DataWriteReq) -> Result<(), Error> {
        if !self.streams.contains_key(&req.stream_id) {
            let _ = req
                .done
                .send(Err(io::Error::other("stream closed")));
            return Ok(());
        }
        match self.push_data(req.stream_id, req.data, req.end_stream) {
            Ok(None) => {
                let _ = req.done.send(Ok(()));
                Ok(())
            }
            Ok(Some(rest)) => {
                if let Some(st) = self.streams.get_mut(&req.stream_id) {
                    st.parked = Some(ParkedWrite {
                        data: rest,
                        end_stream: req.end_stream,
                        done: req.done,
                    });
                }
                Ok(())
            }
            Err(e) => {
                let _ = req.done.send(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection closed",
                )));
                Err(e)
            }
        }
    }

    /// Write as much of `data` as the connection and stream windows allow,
    /// in frames no larger than `max_write_frame_size`. Returns the
    /// unwritten remainder when credit runs out.
    fn push_data(
        &mut self,
        id: u32,
        mut data: Bytes,
        end_stream: bool,
    ) -> Result<Option<Bytes>, Error> {
        loop {
            if data.is_empty() {
                if end_stream {
                    self.framer.write_data(id, &[], true)?;
                    self.close_local(id);
                }
                return Ok(None);
            }
            let allow = {
                let Some(st) = self.streams.get(&id) else {
                    return Ok(None); // stream died with bytes in flight
                };
                data.len()
                    .min(self.conn_flow.available())
                    .min(st.flow.available())
                    .min(self.max_write_frame_size as usize)
            };
            if allow == 0 {
                return Ok(Some(data));
            }
            let chunk = data.split_to(allow);
            let last = data.is_empty();
            self.conn_flow.consume(chunk.len())?;
            if let Some(st) = self.streams.get_mut(&id) {
                st.flow.consume(chunk.len())?;
            }
            self.framer
                .write_data(id, &chunk, end_stream && last)?;
            if end_stream && last {
                self.close_local(id);
                return Ok(None);
            }
        }
    }

    /// Retry the parked write of one stream after its window grew.
    fn resume_parked_write(&mut self, id: u32) -> Result<(), Error> {
        let Some(parked) = self.streams.get_mut(&id).and_then(|st| st.parked.take()) else {
            return Ok(());
        };
        match self.push_data(id, parked.data, parked.end_stream) {
            Ok(None) => {
                let _ = parked.done.send(Ok(()));
                Ok(())
            }
            Ok(Some(rest)) => {
                if let Some(st) = self.streams.get_mut(&id) {
                    st.parked = Some(ParkedWrite {
                        data: rest,
                        end_stream: parked.end_stream,
                        done: parked.done,
                    });
                }
                Ok(())
            }
            Err(e) => {
                let _ = parked.done.send(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection closed",
                )));
                Err(e)
            }
        }
    }

    /// Retry every parked write after the connection window grew.
    fn resume_parked_writes(&mut self) -> Result<(), Error> {
        let waiting: Vec<u32> = self
            .streams
            .values()
            .filter(|st| st.parked.is_some())
            .map(|st| st.id)
            .collect();
        for id in waiting {
            self.resume_parked_write(id)?;
            if self.conn_flow.available() == 0 {
                break;
            }
        }
        Ok(())
    }

    fn write_window_update_in_loop(&mut self, req: WindowUpdateReq) -> Result<(), Error> {
        self.framer.write_window_update(0, req.n)?;
        self.framer.write_window_update(req.stream_id, req.n)?;
        Ok(())
    }

    // -- Stream lifecycle --

    fn reset_stream(&mut self, id: u32, code: ErrorCode) -> Result<(), Error> {
        self.framer.write_rst_stream(id, code)?;
        self.remove_stream(id);
        Ok(())
    }

    /// Our side sent END_STREAM on this stream.
    fn close_local(&mut self, id: u32) {
        let Some(state) = self.streams.get(&id).map(|st| st.state) else {
            return;
        };
        if state == StreamState::HalfClosedRemote {
            self.remove_stream(id);
        } else if let Some(st) = self.streams.get_mut(&id) {
            st.state = StreamState::HalfClosedLocal;
        }
    }

    /// The peer sent END_STREAM on this stream.
    fn close_remote(&mut self, id: u32) {
        let Some(state) = self.streams.get(&id).map(|st| st.state) else {
            return;
        };
        if state == StreamState::HalfClosedLocal {
            self.remove_stream(id);
        } else if let Some(st) = self.streams.get_mut(&id) {
            st.state = StreamState::HalfClosedRemote;
        }
    }

    fn remove_stream(&mut self, id: u32) {
        let Some(stream) = self.streams.remove(&id) else {
            return;
        };
        if let Some(body) = &stream.body {
            // No-op when the body already ended cleanly.
            body.close(PipeEnd::Failed("stream closed".into()));
        }
        if let Some(parked) = stream.parked {
            let _ = parked
                .done
                .send(Err(io::Error::other("stream closed")));
        }
    }
}

/// Classify one decoded header field into the assembly record. Runs inside
/// the HPACK decode of the serve loop.
fn on_header_field(
    assembly: &mut HeaderAssembly,
    canon_cache: &mut HashMap<String, String>,
    field: hpack::HeaderField,
) {
    let (Ok(name), Ok(value)) = (String::from_utf8(field.name), String::from_utf8(field.value))
    else {
        assembly.invalid = true;
        return;
    };
    if !valid_wire_header_name(&name) {
        debug!("invalid header field name {name:?}");
        assembly.invalid = true;
        return;
    }
    if let Some(pseudo) = name.strip_prefix(':') {
        if assembly.saw_regular {
            debug!("pseudo-header {name} after regular header");
            assembly.invalid = true;
            return;
        }
        let slot = match pseudo {
            "method" => &mut assembly.method,
            "path" => &mut assembly.path,
            "scheme" => &mut assembly.scheme,
            "authority" => &mut assembly.authority,
            _ => {
                // 8.1.2.1: unknown pseudo-headers make the request
                // malformed.
                debug!("invalid pseudo-header {name:?}");
                assembly.invalid = true;
                return;
            }
        };
        if !slot.is_empty() {
            debug!("duplicate pseudo-header {name:?}");
            assembly.invalid = true;
            return;
        }
        *slot = value;
    } else if name == "cookie" {
        // 8.1.2.5: cookie crumbs are rejoined with "; " into one header.
        assembly.saw_regular = true;
        match assembly.headers.single_mut("Cookie") {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(&value);
            }
            None => assembly.headers.add_canonical("Cookie".to_string(), value),
        }
    } else {
        assembly.saw_regular = true;
        let canon = canonical_header_name(canon_cache, &name);
        assembly.headers.add_canonical(canon, value);
    }
}

/// Handler thread body. The fault barrier keeps a panicking handler from
/// taking the connection down: the response is finished either way.
fn run_handler(handler: Arc<dyn Handler>, mut response: ResponseWriter, mut request: Request) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.serve(&mut response, &mut request);
    }));
    match outcome {
        Ok(()) => response.finish(),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("handler panicked: {msg}");
            response.abort();
        }
    }
}
