//! Southbound transport sessions
//!
//! Cells connect over TCP; each frame is a 4-byte big-endian length
//! prefix followed by one encoded PDU. Only addresses named in the
//! configuration are accepted, and the address determines which cell
//! identity the session is bound to.
//!
//! Each session runs a reader task (frame, decode, dispatch, in
//! arrival order) and a writer task draining the cell's outbound
//! channel. A decode failure rejects the single message and the
//! session continues; an I/O failure ends the session and removes the
//! cell.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ranctl_common::{log_xran_message, CtrlConfig, Direction, Ecgi};
use ranctl_xran::{decode, encode, XranPdu};

use crate::controller::Controller;

/// Upper bound on one frame's payload.
const MAX_FRAME: usize = 1 << 20;

/// Outbound channel depth per cell.
const SESSION_QUEUE: usize = 64;

/// The southbound listener: accepts authorized cells and runs their
/// sessions until the process shuts down.
pub struct SouthboundListener {
    controller: Arc<Controller>,
    config: Arc<CtrlConfig>,
}

impl SouthboundListener {
    /// Creates the listener over the shared controller and config.
    pub fn new(controller: Arc<Controller>, config: Arc<CtrlConfig>) -> Self {
        Self { controller, config }
    }

    /// Binds and serves until the task is cancelled.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener =
            TcpListener::bind((self.config.bind_address, self.config.bind_port)).await?;
        info!(
            address = %self.config.bind_address,
            port = self.config.bind_port,
            "southbound listener ready"
        );

        loop {
            let (stream, peer) = listener.accept().await?;
            let Some(ecgi) = self.config.cell_for_address(peer.ip()) else {
                warn!(%peer, "connection from unauthorized address, closing");
                continue;
            };
            info!(%peer, %ecgi, "cell session accepted");
            let controller = Arc::clone(&self.controller);
            tokio::spawn(async move {
                run_session(controller, ecgi, stream).await;
            });
        }
    }
}

/// Runs one cell session to completion.
async fn run_session(controller: Arc<Controller>, ecgi: Ecgi, stream: TcpStream) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<XranPdu>(SESSION_QUEUE);
    controller.cell_connected(ecgi, tx);

    let writer_task = tokio::spawn(async move {
        while let Some(pdu) = rx.recv().await {
            let msg_type = pdu.message_type();
            let data = encode(&pdu);
            log_xran_message(Direction::Tx, &msg_type.to_string(), &data);
            let len = (data.len() as u32).to_be_bytes();
            if writer.write_all(&len).await.is_err() || writer.write_all(&data).await.is_err() {
                debug!(%ecgi, "session write failed");
                break;
            }
        }
    });

    loop {
        let mut len_buf = [0u8; 4];
        if reader.read_exact(&mut len_buf).await.is_err() {
            debug!(%ecgi, "session closed by peer");
            break;
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        if len == 0 || len > MAX_FRAME {
            warn!(%ecgi, len, "frame length out of bounds, closing session");
            break;
        }
        let mut frame = vec![0u8; len];
        if reader.read_exact(&mut frame).await.is_err() {
            debug!(%ecgi, "session closed mid-frame");
            break;
        }

        match decode(&frame) {
            Ok(pdu) => {
                log_xran_message(Direction::Rx, &pdu.message_type().to_string(), &frame);
                controller.handle(ecgi, pdu).await;
            }
            Err(e) => {
                // One bad message does not end the session.
                warn!(%ecgi, error = %e, "undecodable message, rejecting");
            }
        }
    }

    controller.remove_cell(ecgi);
    writer_task.abort();
    info!(%ecgi, "cell session ended");
}
