use crate::errors::{Error, Result};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::warn;

const READ_CHUNK: usize = 4096;

/// One observation from the generator socket.
#[derive(Debug)]
pub enum ReadEvent {
    /// A complete newline-terminated frame, delimiter stripped.
    Frame(String),
    /// A bare newline; the peer is degraded but alive.
    EmptyFrame,
    /// No bytes arrived within the idle window.
    IdleTimeout,
    /// Orderly close by the peer.
    Closed,
}

/// Reassembles newline-delimited frames from a raw byte stream. TCP is free
/// to split one frame across reads or pack several into one, so bytes are
/// buffered until a delimiter arrives.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(READ_CHUNK),
        }
    }

    pub async fn next_event(&mut self, idle: Duration) -> Result<ReadEvent> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let mut frame: Vec<u8> = self.buf.drain(..=pos).collect();
                frame.pop();
                if frame.last() == Some(&b'\r') {
                    frame.pop();
                }
                if frame.is_empty() {
                    return Ok(ReadEvent::EmptyFrame);
                }
                return Ok(ReadEvent::Frame(
                    String::from_utf8_lossy(&frame).into_owned(),
                ));
            }

            let mut chunk = [0u8; READ_CHUNK];
            match timeout(idle, self.inner.read(&mut chunk)).await {
                Err(_) => return Ok(ReadEvent::IdleTimeout),
                Ok(Ok(0)) => {
                    if !self.buf.is_empty() {
                        warn!("Discarding {} unterminated bytes at close", self.buf.len());
                    }
                    return Ok(ReadEvent::Closed);
                }
                Ok(Ok(n)) => self.buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) if e.kind() == ErrorKind::ConnectionReset => {
                    return Err(Error::ConnectionReset)
                }
                Ok(Err(e)) => return Err(Error::Io(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const IDLE: Duration = Duration::from_secs(1);

    #[test]
    fn reassembles_frame_split_across_reads() {
        tokio_test::block_on(async {
            let mock = Builder::new()
                .read(b"[{\"Device_Id\":1")
                .read(b"}]\n")
                .build();
            let mut frames = FrameReader::new(mock);

            match frames.next_event(IDLE).await.unwrap() {
                ReadEvent::Frame(text) => assert_eq!(text, "[{\"Device_Id\":1}]"),
                other => panic!("unexpected event: {other:?}"),
            }
            assert!(matches!(
                frames.next_event(IDLE).await.unwrap(),
                ReadEvent::Closed
            ));
        });
    }

    #[test]
    fn separates_frames_coalesced_into_one_read() {
        tokio_test::block_on(async {
            let mock = Builder::new().read(b"{\"a\":1}\n{\"b\":2}\n").build();
            let mut frames = FrameReader::new(mock);

            match frames.next_event(IDLE).await.unwrap() {
                ReadEvent::Frame(text) => assert_eq!(text, "{\"a\":1}"),
                other => panic!("unexpected event: {other:?}"),
            }
            match frames.next_event(IDLE).await.unwrap() {
                ReadEvent::Frame(text) => assert_eq!(text, "{\"b\":2}"),
                other => panic!("unexpected event: {other:?}"),
            }
        });
    }

    #[test]
    fn bare_newline_is_an_empty_frame() {
        tokio_test::block_on(async {
            let mock = Builder::new().read(b"\n").build();
            let mut frames = FrameReader::new(mock);
            assert!(matches!(
                frames.next_event(IDLE).await.unwrap(),
                ReadEvent::EmptyFrame
            ));
        });
    }

    #[test]
    fn eof_reports_closed() {
        tokio_test::block_on(async {
            let mock = Builder::new().build();
            let mut frames = FrameReader::new(mock);
            assert!(matches!(
                frames.next_event(IDLE).await.unwrap(),
                ReadEvent::Closed
            ));
        });
    }

    #[test]
    fn connection_reset_is_fatal() {
        tokio_test::block_on(async {
            let mock = Builder::new()
                .read_error(std::io::Error::new(ErrorKind::ConnectionReset, "reset"))
                .build();
            let mut frames = FrameReader::new(mock);
            assert!(matches!(
                frames.next_event(IDLE).await,
                Err(Error::ConnectionReset)
            ));
        });
    }
}
