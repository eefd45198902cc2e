//! Lazily connecting binary content.

use std::io::{self, Cursor, Read};

use bytes::Bytes;
use remount_http::Transport;
use tracing::debug;

enum Source {
    Remote { transport: Transport, url: String },
    Inline(Bytes),
}

enum State {
    NotConnected,
    Connected(Cursor<Bytes>),
    Closed,
}

/// Readable binary property content.
///
/// Remote content is requested on the first read, so enumerating binary
/// properties never opens a connection.
pub struct BinaryStream {
    source: Source,
    state: State,
}

impl BinaryStream {
    pub(crate) fn remote(transport: Transport, url: String) -> Self {
        Self {
            source: Source::Remote { transport, url },
            state: State::NotConnected,
        }
    }

    pub(crate) fn inline(data: Bytes) -> Self {
        Self {
            source: Source::Inline(data),
            state: State::NotConnected,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Release the content. Closing twice is harmless.
    pub fn close(&mut self) {
        self.state = State::Closed;
    }

    /// Read all remaining content.
    pub fn into_bytes(mut self) -> io::Result<Bytes> {
        self.connect()?;
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Connected(cursor) => {
                let position = cursor.position() as usize;
                let data = cursor.into_inner();
                Ok(data.slice(position.min(data.len())..))
            }
            _ => Err(closed()),
        }
    }

    fn connect(&mut self) -> io::Result<()> {
        match self.state {
            State::Connected(_) => return Ok(()),
            State::Closed => return Err(closed()),
            State::NotConnected => {}
        }

        let data = match &self.source {
            Source::Inline(data) => data.clone(),
            Source::Remote { transport, url } => {
                debug!(url = %url, "Opening binary stream");
                let response = transport.get_url(url).map_err(io::Error::other)?;
                if !response.is_success() {
                    let kind = if response.status == 404 {
                        io::ErrorKind::NotFound
                    } else {
                        io::ErrorKind::Other
                    };
                    return Err(io::Error::new(
                        kind,
                        format!("GET {} returned {}", url, response.status),
                    ));
                }
                response.body
            }
        };

        self.state = State::Connected(Cursor::new(data));
        Ok(())
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "binary stream is closed")
}

impl Read for BinaryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connect()?;
        match &mut self.state {
            State::Connected(cursor) => cursor.read(buf),
            _ => Err(closed()),
        }
    }
}

impl std::fmt::Debug for BinaryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            Source::Remote { url, .. } => url.as_str(),
            Source::Inline(_) => "<inline>",
        };
        f.debug_struct("BinaryStream")
            .field("source", &source)
            .field("connected", &self.is_connected())
            .field("closed", &self.is_closed())
            .finish()
    }
}
