//! Transport-level byte sink/source
//!
//! A thin deadline-aware wrapper over a TCP connection (or any duplex
//! stream in tests). The handshake runs over the whole transport; once it
//! completes, the transport is split into a read half for the inbound
//! chunk reader task and a write half owned exclusively by the session task.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::time::timeout;

use bytes::BytesMut;

use crate::error::{Error, Result};

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Byte transport with bounded read/write deadlines
pub struct Transport<S> {
    stream: S,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl Transport<TcpStream> {
    /// Open a TCP connection to `host:port` within `connect_timeout`.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::Io)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Transport<S> {
    /// Wrap an already-open duplex stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }

    /// Override the per-operation deadlines.
    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    /// Read exactly `buf.len()` bytes or fail within the read deadline.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match timeout(self.read_timeout, self.stream.read_exact(buf)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(Error::ConnectionClosed)
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Write all of `buf` or fail within the write deadline.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match timeout(self.write_timeout, async {
            self.stream.write_all(buf).await?;
            self.stream.flush().await
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Split into buffered read/write halves for the reader and session tasks.
    pub fn into_split(self) -> (TransportReader<S>, TransportWriter<S>) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            TransportReader {
                inner: BufReader::with_capacity(IO_BUFFER_SIZE, read_half),
            },
            TransportWriter {
                inner: BufWriter::with_capacity(IO_BUFFER_SIZE, write_half),
                write_timeout: self.write_timeout,
            },
        )
    }
}

/// Read half, owned by the inbound reader task
pub struct TransportReader<S> {
    inner: BufReader<tokio::io::ReadHalf<S>>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TransportReader<S> {
    /// Read whatever is available into `buf`.
    ///
    /// Returns the number of bytes read; `ConnectionClosed` on EOF. No
    /// deadline here: while streaming the socket may legitimately stay
    /// quiet, and liveness is enforced by the keepalive pings.
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = self.inner.read_buf(buf).await?;
        if n == 0 {
            return Err(Error::ConnectionClosed);
        }
        Ok(n)
    }
}

/// Write half, owned exclusively by the session task
pub struct TransportWriter<S> {
    inner: BufWriter<tokio::io::WriteHalf<S>>,
    write_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> TransportWriter<S> {
    /// Write and flush all of `buf` within the write deadline.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match timeout(self.write_timeout, async {
            self.inner.write_all(buf).await?;
            self.inner.flush().await
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Flush and shut down the write direction within the write deadline.
    pub async fn shutdown(&mut self) -> Result<()> {
        match timeout(self.write_timeout, self.inner.shutdown()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::Timeout),
        }
    }
}
