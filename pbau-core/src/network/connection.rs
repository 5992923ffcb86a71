use std::fmt;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::PbauCodec;
use crate::error::PbauError;
use crate::packet::Frame;

/// Default TCP port of the automation server.
pub const DEFAULT_PORT: u16 = 6211;

const CHANNEL_CAPACITY: usize = 100;

pub type Connection = PbauConnection;

/// Inbound items: decoded frames, then at most one terminal error.
pub type Inbound = Result<Frame, PbauError>;

/// A framed PBAU connection to one server socket.
///
/// Reading and writing run in background tasks; both stop when the
/// connection is dropped.
#[derive(Debug)]
pub struct PbauConnection {
    // Channel to send frames to background writer task
    tx: mpsc::Sender<Frame>,
    // Channel to receive frames from background reader task
    rx: mpsc::Receiver<Inbound>,
    domain: i32,
    guard: ConnectionGuard,
}

impl PbauConnection {
    pub fn new<S>(stream: S, domain: i32) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut net_writer, mut net_reader) = Framed::new(stream, PbauCodec::new(domain)).split();

        // User -> Network
        let (user_tx, mut network_rx) = mpsc::channel::<Frame>(CHANNEL_CAPACITY);

        // Network -> User
        let (network_tx, user_rx) = mpsc::channel::<Inbound>(CHANNEL_CAPACITY);

        let writer_err_tx = network_tx.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = network_rx.recv().await {
                if let Err(e) = net_writer.send(frame).await {
                    warn!("network write error: {e}");
                    let _ = writer_err_tx.send(Err(e)).await;
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            loop {
                match net_reader.next().await {
                    Some(Ok(frame)) => {
                        if network_tx.send(Ok(frame)).await.is_err() {
                            // user_rx was dropped, stop reading
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("network read error: {e}");
                        let _ = network_tx.send(Err(e)).await;
                        break;
                    }
                    None => {
                        debug!("peer closed the connection");
                        let _ = network_tx.send(Err(PbauError::ConnectionClosed)).await;
                        break;
                    }
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
            domain,
            guard: ConnectionGuard { reader, writer },
        }
    }

    pub async fn connect(conn_info: &ConnectionInfo) -> Result<Self, PbauError> {
        let stream = TcpStream::connect(conn_info.socket_addr()).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, conn_info.domain()))
    }

    pub fn domain(&self) -> i32 {
        self.domain
    }

    pub async fn send(&self, frame: Frame) -> Result<(), PbauError> {
        Ok(self.tx.send(frame).await?)
    }

    pub async fn recv(&mut self) -> Option<Inbound> {
        self.rx.recv().await
    }

    pub fn sender(&self) -> ConnectionSender {
        self.tx.clone()
    }

    /// Split into the outbound sender and the inbound receiver. The
    /// background tasks are aborted when the returned guard drops.
    pub fn into_parts(self) -> (ConnectionSender, mpsc::Receiver<Inbound>, ConnectionGuard) {
        (self.tx, self.rx, self.guard)
    }
}

pub type ConnectionSender = mpsc::Sender<Frame>;

/// Keeps the socket tasks of a split connection alive.
#[derive(Debug)]
pub struct ConnectionGuard {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ConnectionGuard {
    /// Give the writer up to `grace` to flush queued frames, then stop
    /// both tasks. The writer only drains once every sender is dropped.
    pub async fn close(mut self, grace: Duration) {
        if tokio::time::timeout(grace, &mut self.writer).await.is_err() {
            debug!("writer still busy after {grace:?}, aborting");
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Where and in which domain to reach the automation server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    host: String,
    port: u16,
    domain: i32,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16, domain: i32) -> Self {
        Self {
            host: host.into(),
            port,
            domain,
        }
    }

    /// Host on the default port.
    pub fn with_default_port(host: impl Into<String>, domain: i32) -> Self {
        Self::new(host, DEFAULT_PORT, domain)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn domain(&self) -> i32 {
        self.domain
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (domain {})", self.host, self.port, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Command;

    #[tokio::test]
    async fn frames_cross_a_duplex_pipe() {
        let (a, b) = tokio::io::duplex(1024);
        let left = PbauConnection::new(a, 3);
        let mut right = PbauConnection::new(b, 3);

        left.send(Frame::bare(3, Command::SaveProject)).await.unwrap();
        let got = tokio::time::timeout(Duration::from_secs(2), right.recv())
            .await
            .expect("timeout")
            .expect("channel open")
            .expect("frame");
        assert_eq!(got.command().unwrap(), Command::SaveProject);
    }

    #[tokio::test]
    async fn reads_through_noise_from_mock_stream() {
        let frame = Frame::bare(2, Command::SaveProject).to_bytes();
        let stream = tokio_test::io::Builder::new()
            .read(b"garbage")
            .read(&frame[..5])
            .read(&frame[5..])
            .build();
        let mut conn = PbauConnection::new(stream, 2);

        let got = tokio::time::timeout(Duration::from_secs(2), conn.recv())
            .await
            .expect("timeout")
            .expect("channel open")
            .expect("frame");
        assert_eq!(got.command().unwrap(), Command::SaveProject);

        let end = tokio::time::timeout(Duration::from_secs(2), conn.recv())
            .await
            .expect("timeout")
            .expect("channel open");
        assert!(matches!(end, Err(PbauError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn peer_close_is_reported() {
        let (a, b) = tokio::io::duplex(64);
        let mut conn = PbauConnection::new(a, 0);
        drop(b);
        let item = tokio::time::timeout(Duration::from_secs(2), conn.recv())
            .await
            .expect("timeout")
            .expect("channel open");
        assert!(matches!(item, Err(PbauError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn close_flushes_queued_frames() {
        let (a, b) = tokio::io::duplex(1024);
        let left = PbauConnection::new(a, 1);
        let mut right = PbauConnection::new(b, 1);

        let (tx, _rx, guard) = left.into_parts();
        tx.send(Frame::bare(1, Command::ResetAll)).await.unwrap();
        drop(tx);
        guard.close(Duration::from_secs(1)).await;

        let got = tokio::time::timeout(Duration::from_secs(2), right.recv())
            .await
            .expect("timeout")
            .expect("channel open")
            .expect("frame");
        assert_eq!(got.command().unwrap(), Command::ResetAll);
    }

    #[test]
    fn connection_info_formats() {
        let info = ConnectionInfo::with_default_port("10.0.0.2", 1);
        assert_eq!(info.socket_addr(), "10.0.0.2:6211");
        assert_eq!(info.to_string(), "10.0.0.2:6211 (domain 1)");
    }
}
