use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{Result, RouterError};
use crate::protocol::{Packet, PacketKind};

/// One peer connection carrying newline-delimited JSON packets. Dropping it
/// closes the socket.
pub struct PeerConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    addr: String,
    timeout: Duration,
}

impl PeerConnection {
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = with_timeout(&addr, timeout, async {
            TcpStream::connect((host, port))
                .await
                .map_err(|e| RouterError::transport(addr.clone(), e))
        })
        .await?;
        debug!("Connected to {}", addr);
        Ok(Self::from_stream(stream, addr, timeout))
    }

    pub fn from_stream(stream: TcpStream, addr: String, timeout: Duration) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
            addr,
            timeout,
        }
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<()> {
        let line = packet
            .to_line()
            .map_err(|e| RouterError::malformed(self.addr.clone(), e.to_string()))?;
        let addr = self.addr.clone();
        let writer = &mut self.writer;
        with_timeout(&addr, self.timeout, async {
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| RouterError::transport(addr.clone(), e))?;
            writer
                .flush()
                .await
                .map_err(|e| RouterError::transport(addr.clone(), e))
        })
        .await
    }

    pub async fn recv(&mut self) -> Result<Packet> {
        let mut line = String::new();
        let addr = self.addr.clone();
        let reader = &mut self.reader;
        let read = with_timeout(&addr, self.timeout, async {
            reader
                .read_line(&mut line)
                .await
                .map_err(|e| RouterError::transport(addr.clone(), e))
        })
        .await?;
        if read == 0 {
            return Err(RouterError::transport(
                addr,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed by peer"),
            ));
        }
        Packet::from_line(&line).map_err(|e| RouterError::malformed(addr, e.to_string()))
    }

    /// Receives one packet and checks it is of the expected kind.
    pub async fn recv_kind(&mut self, expected: &[PacketKind]) -> Result<Packet> {
        let packet = self.recv().await?;
        if expected.contains(&packet.kind) {
            Ok(packet)
        } else {
            Err(RouterError::malformed(
                self.addr.clone(),
                format!("expected one of {:?}, got {:?}", expected, packet.kind),
            ))
        }
    }

    /// Sends `packet` and waits for a reply of one of the `expected` kinds.
    pub async fn request(&mut self, packet: &Packet, expected: &[PacketKind]) -> Result<Packet> {
        self.send(packet).await?;
        self.recv_kind(expected).await
    }
}

/// Opens a connection, writes one packet and closes.
pub async fn deliver(host: &str, port: u16, packet: &Packet, timeout: Duration) -> Result<()> {
    let mut conn = PeerConnection::connect(host, port, timeout).await?;
    conn.send(packet).await
}

async fn with_timeout<T>(
    addr: &str,
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(RouterError::Timeout {
            addr: addr.to_string(),
            timeout,
        }),
    }
}
