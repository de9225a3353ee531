//! HTTP/2 frame layer (RFC 7540 Section 4).
//!
//! Every frame starts with a fixed 9-byte header:
//! ```text
//! +-----------------------------------------------+
//! |                 Length (24)                    |
//! +---------------+---------------+---------------+
//! |   Type (8)    |   Flags (8)   |
//! +-+-------------+---------------+------...------+
//! |R|                 Stream Identifier (31)       |
//! +-+---------------------------------------------+
//! |                   Frame Payload ...            |
//! +-----------------------------------------------+
//! ```
//!
//! The layer is split to match the connection's concurrency model: a
//! [`FrameReader`] owned by the reader thread and a [`FrameWriter`] owned by
//! the serve loop, the connection's only writer.

use std::io::{self, Read, Write};

use crate::error::{Error, ErrorCode};
use crate::settings::{decode_settings, encode_settings, Setting};

/// Frame header size in bytes.
pub const FRAME_HEADER_LEN: usize = 9;

/// The fixed 24-byte client connection preface (RFC 7540 Section 3.5).
pub const CLIENT_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

// Frame type identifiers (RFC 7540 Section 6).
pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_PRIORITY: u8 = 0x2;
pub const FRAME_RST_STREAM: u8 = 0x3;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_PUSH_PROMISE: u8 = 0x5;
pub const FRAME_PING: u8 = 0x6;
pub const FRAME_GOAWAY: u8 = 0x7;
pub const FRAME_WINDOW_UPDATE: u8 = 0x8;
pub const FRAME_CONTINUATION: u8 = 0x9;

// Flag bits.
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

/// A parsed HTTP/2 frame.
///
/// Frame types the server only logs and ignores (RST_STREAM, PRIORITY,
/// PUSH_PROMISE, GOAWAY, unknown) keep just enough payload for the log line.
#[derive(Debug, Clone)]
pub enum Frame {
    /// DATA (0x0): request body bytes.
    Data {
        stream_id: u32,
        payload: Vec<u8>,
        end_stream: bool,
    },
    /// HEADERS (0x1): first fragment of a request header block. Priority
    /// fields, when present, are stripped during parsing.
    Headers {
        stream_id: u32,
        fragment: Vec<u8>,
        end_stream: bool,
        end_headers: bool,
    },
    /// PRIORITY (0x2).
    Priority { stream_id: u32 },
    /// RST_STREAM (0x3).
    RstStream {
        stream_id: u32,
        error_code: ErrorCode,
    },
    /// SETTINGS (0x4): raw parameter pairs, empty when ACK.
    Settings { ack: bool, settings: Vec<Setting> },
    /// PUSH_PROMISE (0x5): never legal from a client.
    PushPromise { stream_id: u32 },
    /// PING (0x6). The stream id is kept so the serve loop can reject
    /// non-zero ids as a connection error.
    Ping {
        stream_id: u32,
        ack: bool,
        payload: [u8; 8],
    },
    /// GOAWAY (0x7).
    GoAway {
        last_stream_id: u32,
        error_code: ErrorCode,
    },
    /// WINDOW_UPDATE (0x8).
    WindowUpdate { stream_id: u32, increment: u32 },
    /// CONTINUATION (0x9): further header block fragments.
    Continuation {
        stream_id: u32,
        fragment: Vec<u8>,
        end_headers: bool,
    },
    /// Any unrecognized frame type, ignored per RFC 7540 Section 4.1.
    Unknown { frame_type: u8, stream_id: u32 },
}

/// Decoded 9-byte frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

/// Append a 9-byte frame header to `buf`.
pub fn encode_frame_header(
    buf: &mut Vec<u8>,
    payload_len: u32,
    frame_type: u8,
    flags: u8,
    stream_id: u32,
) {
    buf.push((payload_len >> 16) as u8);
    buf.push((payload_len >> 8) as u8);
    buf.push(payload_len as u8);
    buf.push(frame_type);
    buf.push(flags);
    let sid = stream_id & 0x7fff_ffff; // reserved bit cleared
    buf.extend_from_slice(&sid.to_be_bytes());
}

/// Decode a frame header from exactly 9 bytes.
pub fn decode_frame_header(buf: &[u8; FRAME_HEADER_LEN]) -> FrameHeader {
    let length = (u32::from(buf[0]) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]);
    let stream_id = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & 0x7fff_ffff;
    FrameHeader {
        length,
        frame_type: buf[3],
        flags: buf[4],
        stream_id,
    }
}

fn read_u32(payload: &[u8]) -> u32 {
    u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])
}

/// Strip PADDED framing from a payload.
fn strip_padding(payload: &[u8], flags: u8) -> Result<&[u8], Error> {
    if flags & FLAG_PADDED == 0 {
        return Ok(payload);
    }
    let pad_len = *payload.first().ok_or(Error::FrameSize)? as usize;
    if pad_len >= payload.len() {
        return Err(Error::Protocol("padding exceeds payload".into()));
    }
    Ok(&payload[1..payload.len() - pad_len])
}

/// Parse a frame from its header and complete payload.
pub fn parse_frame(header: &FrameHeader, payload: &[u8]) -> Result<Frame, Error> {
    let flags = header.flags;
    let stream_id = header.stream_id;
    match header.frame_type {
        FRAME_DATA => {
            if stream_id == 0 {
                return Err(Error::Protocol("DATA on stream 0".into()));
            }
            let data = strip_padding(payload, flags)?;
            Ok(Frame::Data {
                stream_id,
                payload: data.to_vec(),
                end_stream: flags & FLAG_END_STREAM != 0,
            })
        }
        FRAME_HEADERS => {
            if stream_id == 0 {
                return Err(Error::Protocol("HEADERS on stream 0".into()));
            }
            let mut data = strip_padding(payload, flags)?;
            if flags & FLAG_PRIORITY != 0 {
                // Exclusive bit, 31-bit dependency, weight: advisory, skipped.
                if data.len() < 5 {
                    return Err(Error::FrameSize);
                }
                data = &data[5..];
            }
            Ok(Frame::Headers {
                stream_id,
                fragment: data.to_vec(),
                end_stream: flags & FLAG_END_STREAM != 0,
                end_headers: flags & FLAG_END_HEADERS != 0,
            })
        }
        FRAME_PRIORITY => {
            if stream_id == 0 {
                return Err(Error::Protocol("PRIORITY on stream 0".into()));
            }
            if payload.len() != 5 {
                return Err(Error::FrameSize);
            }
            Ok(Frame::Priority { stream_id })
        }
        FRAME_RST_STREAM => {
            if stream_id == 0 {
                return Err(Error::Protocol("RST_STREAM on stream 0".into()));
            }
            if payload.len() != 4 {
                return Err(Error::FrameSize);
            }
            Ok(Frame::RstStream {
                stream_id,
                error_code: ErrorCode::from_u32(read_u32(payload)),
            })
        }
        FRAME_SETTINGS => {
            if stream_id != 0 {
                return Err(Error::Protocol("SETTINGS on non-zero stream".into()));
            }
            if flags & FLAG_ACK != 0 {
                if !payload.is_empty() {
                    return Err(Error::FrameSize);
                }
                return Ok(Frame::Settings {
                    ack: true,
                    settings: Vec::new(),
                });
            }
            Ok(Frame::Settings {
                ack: false,
                settings: decode_settings(payload)?,
            })
        }
        FRAME_PUSH_PROMISE => {
            if stream_id == 0 {
                return Err(Error::Protocol("PUSH_PROMISE on stream 0".into()));
            }
            Ok(Frame::PushPromise { stream_id })
        }
        FRAME_PING => {
            if payload.len() != 8 {
                return Err(Error::FrameSize);
            }
            let mut data = [0u8; 8];
            data.copy_from_slice(payload);
            Ok(Frame::Ping {
                stream_id,
                ack: flags & FLAG_ACK != 0,
                payload: data,
            })
        }
        FRAME_GOAWAY => {
            if stream_id != 0 {
                return Err(Error::Protocol("GOAWAY on non-zero stream".into()));
            }
            if payload.len() < 8 {
                return Err(Error::FrameSize);
            }
            Ok(Frame::GoAway {
                last_stream_id: read_u32(payload) & 0x7fff_ffff,
                error_code: ErrorCode::from_u32(read_u32(&payload[4..])),
            })
        }
        FRAME_WINDOW_UPDATE => {
            if payload.len() != 4 {
                return Err(Error::FrameSize);
            }
            let increment = read_u32(payload) & 0x7fff_ffff;
            if increment == 0 {
                return Err(Error::Protocol("WINDOW_UPDATE with zero increment".into()));
            }
            Ok(Frame::WindowUpdate {
                stream_id,
                increment,
            })
        }
        FRAME_CONTINUATION => {
            if stream_id == 0 {
                return Err(Error::Protocol("CONTINUATION on stream 0".into()));
            }
            Ok(Frame::Continuation {
                stream_id,
                fragment: payload.to_vec(),
                end_headers: flags & FLAG_END_HEADERS != 0,
            })
        }
        other => Ok(Frame::Unknown {
            frame_type: other,
            stream_id,
        }),
    }
}

// -- Reader half --

/// Reads frames from the inbound byte stream.
///
/// The payload scratch buffer is reused across reads, so at most one parsed
/// frame may be outstanding at a time; the reader/loop handoff protocol in
/// the connection module enforces this.
pub struct FrameReader<R> {
    inner: R,
    scratch: Vec<u8>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scratch: Vec::new(),
        }
    }

    /// Read and verify the exact 24-byte client connection preface.
    pub fn read_client_preface(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; CLIENT_PREFACE.len()];
        self.inner.read_exact(&mut buf)?;
        if buf != CLIENT_PREFACE {
            return Err(Error::Protocol("bogus client preface".into()));
        }
        Ok(())
    }

    /// Read the next frame. Payloads longer than `max_frame_size` are a
    /// frame size error.
    pub fn read_frame(&mut self, max_frame_size: u32) -> Result<Frame, Error> {
        let mut header_buf = [0u8; FRAME_HEADER_LEN];
        self.inner.read_exact(&mut header_buf)?;
        let header = decode_frame_header(&header_buf);
        if header.length > max_frame_size {
            return Err(Error::FrameSize);
        }
        self.scratch.resize(header.length as usize, 0);
        self.inner.read_exact(&mut self.scratch)?;
        parse_frame(&header, &self.scratch)
    }
}

// -- Writer half --

/// Parameters for writing a HEADERS frame.
#[derive(Debug)]
pub struct HeadersParam<'a> {
    pub stream_id: u32,
    pub fragment: &'a [u8],
    pub end_stream: bool,
    pub end_headers: bool,
}

/// Writes frames to the outbound byte stream. Owned exclusively by the
/// serve loop.
pub struct FrameWriter<W> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    fn flush_frame(&mut self) -> io::Result<()> {
        self.inner.write_all(&self.buf)?;
        self.inner.flush()
    }

    pub fn write_settings(&mut self, settings: &[Setting]) -> io::Result<()> {
        self.buf.clear();
        let mut payload = Vec::new();
        encode_settings(settings, &mut payload);
        encode_frame_header(&mut self.buf, payload.len() as u32, FRAME_SETTINGS, 0, 0);
        self.buf.extend_from_slice(&payload);
        self.flush_frame()
    }

    pub fn write_settings_ack(&mut self) -> io::Result<()> {
        self.buf.clear();
        encode_frame_header(&mut self.buf, 0, FRAME_SETTINGS, FLAG_ACK, 0);
        self.flush_frame()
    }

    pub fn write_ping(&mut self, ack: bool, payload: [u8; 8]) -> io::Result<()> {
        self.buf.clear();
        let flags = if ack { FLAG_ACK } else { 0 };
        encode_frame_header(&mut self.buf, 8, FRAME_PING, flags, 0);
        self.buf.extend_from_slice(&payload);
        self.flush_frame()
    }

    pub fn write_window_update(&mut self, stream_id: u32, increment: u32) -> io::Result<()> {
        self.buf.clear();
        encode_frame_header(&mut self.buf, 4, FRAME_WINDOW_UPDATE, 0, stream_id);
        self.buf
            .extend_from_slice(&(increment & 0x7fff_ffff).to_be_bytes());
        self.flush_frame()
    }

    pub fn write_rst_stream(&mut self, stream_id: u32, error_code: ErrorCode) -> io::Result<()> {
        self.buf.clear();
        encode_frame_header(&mut self.buf, 4, FRAME_RST_STREAM, 0, stream_id);
        self.buf.extend_from_slice(&(error_code as u32).to_be_bytes());
        self.flush_frame()
    }

    pub fn write_goaway(
        &mut self,
        last_stream_id: u32,
        error_code: ErrorCode,
        debug_data: &[u8],
    ) -> io::Result<()> {
        self.buf.clear();
        encode_frame_header(
            &mut self.buf,
            8 + debug_data.len() as u32,
            FRAME_GOAWAY,
            0,
            0,
        );
        self.buf
            .extend_from_slice(&(last_stream_id & 0x7fff_ffff).to_be_bytes());
        self.buf.extend_from_slice(&(error_code as u32).to_be_bytes());
        self.buf.extend_from_slice(debug_data);
        self.flush_frame()
    }

    pub fn write_headers(&mut self, param: HeadersParam<'_>) -> io::Result<()> {
        self.buf.clear();
        let mut flags = 0u8;
        if param.end_stream {
            flags |= FLAG_END_STREAM;
        }
        if param.end_headers {
            flags |= FLAG_END_HEADERS;
        }
        encode_frame_header(
            &mut self.buf,
            param.fragment.len() as u32,
            FRAME_HEADERS,
            flags,
            param.stream_id,
        );
        self.buf.extend_from_slice(param.fragment);
        self.flush_frame()
    }

    pub fn write_continuation(
        &mut self,
        stream_id: u32,
        fragment: &[u8],
        end_headers: bool,
    ) -> io::Result<()> {
        self.buf.clear();
        let flags = if end_headers { FLAG_END_HEADERS } else { 0 };
        encode_frame_header(
            &mut self.buf,
            fragment.len() as u32,
            FRAME_CONTINUATION,
            flags,
            stream_id,
        );
        self.buf.extend_from_slice(fragment);
        self.flush_frame()
    }

    pub fn write_data(&mut self, stream_id: u32, data: &[u8], end_stream: bool) -> io::Result<()> {
        self.buf.clear();
        let flags = if end_stream { FLAG_END_STREAM } else { 0 };
        encode_frame_header(&mut self.buf, data.len() as u32, FRAME_DATA, flags, stream_id);
        self.buf.extend_from_slice(data);
        self.flush_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SETTINGS_INITIAL_WINDOW_SIZE;

    fn parse_one(bytes: &[u8]) -> Result<Frame, Error> {
        let mut reader = FrameReader::new(bytes);
        reader.read_frame(16384)
    }

    #[test]
    fn frame_header_round_trip() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 100, FRAME_DATA, FLAG_END_STREAM, 1);
        assert_eq!(buf.len(), FRAME_HEADER_LEN);
        let mut fixed = [0u8; FRAME_HEADER_LEN];
        fixed.copy_from_slice(&buf);
        let header = decode_frame_header(&fixed);
        assert_eq!(header.length, 100);
        assert_eq!(header.frame_type, FRAME_DATA);
        assert_eq!(header.flags, FLAG_END_STREAM);
        assert_eq!(header.stream_id, 1);
    }

    #[test]
    fn data_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_data(1, b"hello", true).unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::Data {
                stream_id,
                payload,
                end_stream,
            } => {
                assert_eq!(stream_id, 1);
                assert_eq!(payload, b"hello");
                assert!(end_stream);
            }
            f => panic!("expected Data, got {f:?}"),
        }
    }

    #[test]
    fn headers_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer
            .write_headers(HeadersParam {
                stream_id: 3,
                fragment: &[0x82, 0x86, 0x84],
                end_stream: false,
                end_headers: true,
            })
            .unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::Headers {
                stream_id,
                fragment,
                end_stream,
                end_headers,
            } => {
                assert_eq!(stream_id, 3);
                assert_eq!(fragment, [0x82, 0x86, 0x84]);
                assert!(!end_stream);
                assert!(end_headers);
            }
            f => panic!("expected Headers, got {f:?}"),
        }
    }

    #[test]
    fn headers_priority_fields_stripped() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 8, FRAME_HEADERS, FLAG_END_HEADERS | FLAG_PRIORITY, 1);
        buf.extend_from_slice(&[0x80, 0x00, 0x00, 0x00, 0xff]); // dependency + weight
        buf.extend_from_slice(&[0x82, 0x86, 0x84]);
        match parse_one(&buf).unwrap() {
            Frame::Headers { fragment, .. } => assert_eq!(fragment, [0x82, 0x86, 0x84]),
            f => panic!("expected Headers, got {f:?}"),
        }
    }

    #[test]
    fn settings_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer
            .write_settings(&[Setting::new(SETTINGS_INITIAL_WINDOW_SIZE, 1 << 20)])
            .unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::Settings { ack, settings } => {
                assert!(!ack);
                assert_eq!(settings, [Setting::new(SETTINGS_INITIAL_WINDOW_SIZE, 1 << 20)]);
            }
            f => panic!("expected Settings, got {f:?}"),
        }
    }

    #[test]
    fn empty_settings_frame() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_settings(&[]).unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::Settings { ack, settings } => {
                assert!(!ack);
                assert!(settings.is_empty());
            }
            f => panic!("expected Settings, got {f:?}"),
        }
    }

    #[test]
    fn settings_ack_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_settings_ack().unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::Settings { ack, .. } => assert!(ack),
            f => panic!("expected Settings, got {f:?}"),
        }
    }

    #[test]
    fn ping_round_trip_keeps_stream_id() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 8, FRAME_PING, 0, 7);
        buf.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        match parse_one(&buf).unwrap() {
            Frame::Ping {
                stream_id,
                ack,
                payload,
            } => {
                assert_eq!(stream_id, 7);
                assert!(!ack);
                assert_eq!(payload, [1, 2, 3, 4, 5, 6, 7, 8]);
            }
            f => panic!("expected Ping, got {f:?}"),
        }
    }

    #[test]
    fn goaway_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer
            .write_goaway(5, ErrorCode::FlowControlError, b"bye")
            .unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::GoAway {
                last_stream_id,
                error_code,
            } => {
                assert_eq!(last_stream_id, 5);
                assert_eq!(error_code, ErrorCode::FlowControlError);
            }
            f => panic!("expected GoAway, got {f:?}"),
        }
    }

    #[test]
    fn window_update_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_window_update(1, 1000).unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                assert_eq!(stream_id, 1);
                assert_eq!(increment, 1000);
            }
            f => panic!("expected WindowUpdate, got {f:?}"),
        }
    }

    #[test]
    fn rst_stream_round_trip() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_rst_stream(1, ErrorCode::Cancel).unwrap();
        match parse_one(&writer.inner).unwrap() {
            Frame::RstStream {
                stream_id,
                error_code,
            } => {
                assert_eq!(stream_id, 1);
                assert_eq!(error_code, ErrorCode::Cancel);
            }
            f => panic!("expected RstStream, got {f:?}"),
        }
    }

    #[test]
    fn unknown_type_parsed_as_unknown() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 3, 0xfe, 0x42, 7);
        buf.extend_from_slice(b"abc");
        match parse_one(&buf).unwrap() {
            Frame::Unknown {
                frame_type,
                stream_id,
            } => {
                assert_eq!(frame_type, 0xfe);
                assert_eq!(stream_id, 7);
            }
            f => panic!("expected Unknown, got {f:?}"),
        }
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 20000, FRAME_DATA, 0, 1);
        buf.extend_from_slice(&vec![0u8; 20000]);
        assert!(matches!(parse_one(&buf), Err(Error::FrameSize)));
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 5, FRAME_DATA, 0, 1);
        buf.extend_from_slice(b"he");
        assert!(matches!(parse_one(&buf), Err(Error::Io(_))));
    }

    #[test]
    fn data_on_stream_zero_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 0, FRAME_DATA, 0, 0);
        assert!(matches!(parse_one(&buf), Err(Error::Protocol(_))));
    }

    #[test]
    fn window_update_zero_increment_rejected() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 4, FRAME_WINDOW_UPDATE, 0, 1);
        buf.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(parse_one(&buf), Err(Error::Protocol(_))));
    }

    #[test]
    fn padded_data_stripped() {
        let mut buf = Vec::new();
        encode_frame_header(&mut buf, 9, FRAME_DATA, FLAG_PADDED | FLAG_END_STREAM, 1);
        buf.push(3); // pad length
        buf.extend_from_slice(b"hello");
        buf.extend_from_slice(&[0, 0, 0]);
        match parse_one(&buf).unwrap() {
            Frame::Data { payload, .. } => assert_eq!(payload, b"hello"),
            f => panic!("expected Data, got {f:?}"),
        }
    }

    #[test]
    fn preface_accepted_then_frame_readable() {
        let mut bytes = CLIENT_PREFACE.to_vec();
        encode_frame_header(&mut bytes, 0, FRAME_SETTINGS, 0, 0);
        let mut reader = FrameReader::new(bytes.as_slice());
        reader.read_client_preface().unwrap();
        assert!(matches!(
            reader.read_frame(16384).unwrap(),
            Frame::Settings { ack: false, .. }
        ));
    }

    #[test]
    fn bad_preface_rejected() {
        let mut reader = FrameReader::new(&b"GET / HTTP/1.1\r\nHost: x\r\n\r\nabc"[..]);
        assert!(matches!(
            reader.read_client_preface(),
            Err(Error::Protocol(_))
        ));
    }
}
