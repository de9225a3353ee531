//! The response writer handed to handlers.

use std::io::{self, Write};

use bytes::Bytes;
use crossbeam_channel::{bounded, Sender};

use crate::connection::{DataWriteReq, HeaderWriteReq};
use crate::headers::HeaderMap;

fn sink_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "connection closed")
}

/// Writes one stream's response.
///
/// The writer never touches the framer. Header commits travel over an
/// unbuffered channel: the send returns only once the serve loop has
/// serialized the HEADERS frame, so body bytes can never overtake it. Body
/// bytes travel over an equally unbuffered data channel, with the writer
/// blocked until the loop has pushed every byte through the flow control
/// windows.
pub struct ResponseWriter {
    stream_id: u32,
    status: u16,
    headers: HeaderMap,
    wrote_headers: bool,
    header_write: Sender<HeaderWriteReq>,
    data_write: Sender<DataWriteReq>,
}

impl ResponseWriter {
    pub(crate) fn new(
        stream_id: u32,
        header_write: Sender<HeaderWriteReq>,
        data_write: Sender<DataWriteReq>,
    ) -> Self {
        Self {
            stream_id,
            status: 200,
            headers: HeaderMap::new(),
            wrote_headers: false,
            header_write,
            data_write,
        }
    }

    /// Response headers, mutable until the first body write or status
    /// commit. Changes afterwards are ignored.
    pub fn headers(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set the status and commit the response headers. The first call wins;
    /// later calls are no-ops, as is any call after a body write already
    /// committed an implicit 200.
    pub fn set_status(&mut self, status: u16) {
        if self.wrote_headers {
            return;
        }
        self.status = status;
        let _ = self.commit_headers(false);
    }

    /// Write body bytes. Commits headers (status 200) first when the
    /// handler never set a status. Blocks until the serve loop has written
    /// the bytes to the wire, which may wait on peer flow control credit.
    pub fn write_body(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.wrote_headers {
            self.commit_headers(false)?;
        }
        if data.is_empty() {
            return Ok(0);
        }
        self.send_data(Bytes::copy_from_slice(data), false)?;
        Ok(data.len())
    }

    /// Called once the handler returns: make sure the response ends.
    pub(crate) fn finish(&mut self) {
        if self.wrote_headers {
            let _ = self.send_data(Bytes::new(), true);
        } else {
            let _ = self.commit_headers(true);
        }
    }

    /// Fault barrier path: the handler panicked. An uncommitted response
    /// becomes a 500; a committed one is cut short at the current body.
    pub(crate) fn abort(&mut self) {
        if !self.wrote_headers {
            self.status = 500;
        }
        self.finish();
    }

    fn commit_headers(&mut self, end_stream: bool) -> io::Result<()> {
        self.wrote_headers = true;
        let req = HeaderWriteReq {
            stream_id: self.stream_id,
            status: self.status,
            headers: std::mem::take(&mut self.headers),
            end_stream,
        };
        self.header_write.send(req).map_err(|_| sink_closed())
    }

    fn send_data(&mut self, data: Bytes, end_stream: bool) -> io::Result<()> {
        let (done_tx, done_rx) = bounded(1);
        let req = DataWriteReq {
            stream_id: self.stream_id,
            data,
            end_stream,
            done: done_tx,
        };
        self.data_write.send(req).map_err(|_| sink_closed())?;
        done_rx.recv().map_err(|_| sink_closed())?
    }
}

impl Write for ResponseWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_body(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;

    fn writer_with_channels() -> (
        ResponseWriter,
        crossbeam_channel::Receiver<HeaderWriteReq>,
        crossbeam_channel::Receiver<DataWriteReq>,
    ) {
        // Tests use buffered channels so single-threaded assertions work;
        // the connection wires these up as rendezvous channels.
        let (header_tx, header_rx) = unbounded();
        let (data_tx, data_rx) = unbounded();
        (ResponseWriter::new(1, header_tx, data_tx), header_rx, data_rx)
    }

    #[test]
    fn finish_without_writes_sends_200_end_stream() {
        let (mut rw, header_rx, _data_rx) = writer_with_channels();
        rw.finish();
        let req = header_rx.try_recv().unwrap();
        assert_eq!(req.status, 200);
        assert!(req.end_stream);
    }

    #[test]
    fn first_status_wins() {
        let (mut rw, header_rx, _data_rx) = writer_with_channels();
        rw.set_status(404);
        rw.set_status(500);
        let req = header_rx.try_recv().unwrap();
        assert_eq!(req.status, 404);
        assert!(!req.end_stream);
        assert!(header_rx.try_recv().is_err());
    }

    #[test]
    fn body_write_commits_implicit_200() {
        let (rw, header_rx, data_rx) = writer_with_channels();
        let writer = thread::spawn(move || {
            let mut rw = rw;
            rw.write_body(b"hi").unwrap();
            rw
        });
        let header = header_rx.recv().unwrap();
        assert_eq!(header.status, 200);
        let data = data_rx.recv().unwrap();
        assert_eq!(&data.data[..], b"hi");
        assert!(!data.end_stream);
        data.done.send(Ok(())).unwrap();
        writer.join().unwrap();
    }

    #[test]
    fn abort_before_commit_is_500() {
        let (mut rw, header_rx, _data_rx) = writer_with_channels();
        rw.abort();
        let req = header_rx.try_recv().unwrap();
        assert_eq!(req.status, 500);
        assert!(req.end_stream);
    }

    #[test]
    fn headers_frozen_after_commit() {
        let (mut rw, header_rx, _data_rx) = writer_with_channels();
        rw.headers().add("content-type", "text/plain");
        rw.set_status(204);
        rw.headers().add("x-late", "ignored");
        let req = header_rx.try_recv().unwrap();
        assert_eq!(req.headers.get("Content-Type"), Some("text/plain"));
        assert!(!req.headers.contains("x-late"));
    }
}
