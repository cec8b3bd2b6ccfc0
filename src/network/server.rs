use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::error::{Result, RouterError};
use crate::network::transport::PeerConnection;
use crate::protocol::PacketKind;
use crate::router::Router;

/// Accepts peer connections and hands each one to a bounded pool of workers.
/// A connection carries exactly one request (and its replies).
pub struct RouterServer {
    listener: TcpListener,
    workers: Arc<Semaphore>,
}

impl RouterServer {
    pub async fn bind(host: &str, port: u16, worker_pool_size: usize) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| RouterError::transport(addr, e))?;
        Ok(Self {
            listener,
            workers: Arc::new(Semaphore::new(worker_pool_size.max(1))),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Waits for a free worker before accepting, so a burst of
    /// peers queues in the listen backlog rather than spawning without limit.
    pub async fn run(self, router: Arc<Router>) {
        if let Ok(addr) = self.local_addr() {
            info!("Listening for peers on {}", addr);
        }
        loop {
            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let router = Arc::clone(&router);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(router, stream, addr).await {
                            error!("Connection from {} failed: {}", addr, e);
                        }
                        drop(permit);
                    });
                }
                Err(e) => error!("Failed to accept peer connection: {}", e),
            }
        }
    }

    pub fn spawn(self, router: Arc<Router>) -> JoinHandle<()> {
        tokio::spawn(self.run(router))
    }
}

async fn handle_connection(router: Arc<Router>, stream: TcpStream, addr: SocketAddr) -> Result<()> {
    let mut conn = PeerConnection::from_stream(stream, addr.to_string(), router.settings().io_timeout());
    let packet = conn.recv().await?;
    debug!("{:?} from {} ({})", packet.kind, packet.src_simulated_addr, addr);

    match packet.kind {
        PacketKind::Attach => router.handle_attach(&mut conn, packet).await,
        PacketKind::Hello => router.handle_hello(&mut conn, packet).await,
        PacketKind::LsUpdate => {
            router.handle_ls_update(packet).await;
            Ok(())
        }
        PacketKind::Disconnect => router.handle_disconnect(packet).await,
        PacketKind::Exit => router.handle_exit(packet).await,
        PacketKind::AttachAck | PacketKind::AttachReject => Err(RouterError::malformed(
            addr.to_string(),
            format!("unsolicited {:?}", packet.kind),
        )),
    }
}
