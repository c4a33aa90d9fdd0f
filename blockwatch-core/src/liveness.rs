//! Keep-alive listener for hosting platforms that require a bound port.
//!
//! Every connection gets a fixed `200 OK` and is closed. The listener shares
//! nothing with the check loop.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::Result;

const RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 3\r\nconnection: close\r\n\r\nOK\n";
const READ_TIMEOUT: Duration = Duration::from_secs(2);

pub struct LivenessStub {
    listener: TcpListener,
}

impl LivenessStub {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn serve(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "Liveness listener started");
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tokio::spawn(async move {
                        if let Err(e) = answer(stream).await {
                            debug!(%peer, error = %e, "Liveness connection ended early");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Liveness accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn answer(mut stream: TcpStream) -> std::io::Result<()> {
    // Drain whatever the health check sent; plain TCP checks send nothing.
    let mut buf = [0u8; 1024];
    let _ = timeout(READ_TIMEOUT, stream.read(&mut buf)).await;

    stream.write_all(RESPONSE).await?;
    stream.shutdown().await
}
