use crate::config::Config;
use crate::reading;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpSocket;
use tokio::time::interval;
use tracing::{error, info, warn};

const LISTEN_BACKLOG: u32 = 3;

/// Accepts sessions one at a time, up to the configured limit, then exits.
/// Additional connection attempts wait in the listen backlog until the
/// active session ends.
pub async fn serve(cfg: &Config) -> std::io::Result<()> {
    let addr = SocketAddr::new(cfg.bind_addr, cfg.port);
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(LISTEN_BACKLOG)?;

    info!("Listening on {} (backlog {})", addr, LISTEN_BACKLOG);

    for session in 1..=cfg.max_sessions {
        let (stream, peer) = listener.accept().await?;
        info!("Session {}/{}: connected with {}", session, cfg.max_sessions, peer);
        run_session(stream, cfg.tick()).await;
        info!("Session {} ended", session);
    }

    info!("Served {} session(s), exiting", cfg.max_sessions);
    Ok(())
}

/// Emits one batch per tick until the peer goes away. The first batch is
/// written immediately on connect.
pub async fn run_session<W: AsyncWrite + Unpin>(mut sink: W, tick: Duration) {
    let mut ticker = interval(tick);

    loop {
        ticker.tick().await;

        let batch = reading::generate_batch(&mut rand::thread_rng());
        let mut frame = match serde_json::to_vec(&batch) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize batch: {}", e);
                continue;
            }
        };
        frame.push(b'\n');

        if let Err(e) = sink.write_all(&frame).await {
            warn!("Peer disconnected: {}", e);
            break;
        }
        if let Err(e) = sink.flush().await {
            warn!("Peer disconnected: {}", e);
            break;
        }

        info!("Sent batch of {} readings", batch.len());
    }
}
