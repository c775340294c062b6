// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket listener serving the IPC protocol.

use crate::lifecycle::Daemon;
use crate::protocol::{Request, Response};
use crate::wire::{self, ProtocolError};
use cf_core::ErrorClass;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Bind the daemon socket and serve until the daemon's token cancels.
pub async fn serve(daemon: Arc<Daemon>) -> Result<(), std::io::Error> {
    let socket_path = daemon.env.socket_path.clone();
    // A previous unclean shutdown leaves a stale socket file; the lock
    // file already guarantees single ownership
    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)?;
    info!(socket = %socket_path.display(), "listening");

    let cancel = daemon.cancel_token();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let daemon = Arc::clone(&daemon);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(daemon, stream).await {
                                match e {
                                    ProtocolError::ConnectionClosed => {}
                                    other => debug!(error = %other, "connection error"),
                                }
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
            _ = cancel.cancelled() => {
                let _ = std::fs::remove_file(&socket_path);
                return Ok(());
            }
        }
    }
}

async fn handle_connection(
    daemon: Arc<Daemon>,
    mut stream: UnixStream,
) -> Result<(), ProtocolError> {
    loop {
        let bytes = wire::read_message(&mut stream).await?;
        let response = match wire::decode::<Request>(&bytes) {
            Ok(request) => daemon.handle_request(request).await,
            Err(e) => Response::error(ErrorClass::Payload, format!("bad request: {e}")),
        };
        let encoded = wire::encode(&response)?;
        wire::write_message(&mut stream, &encoded).await?;

        if response == Response::ShuttingDown {
            return Ok(());
        }
    }
}
