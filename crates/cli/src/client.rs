// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket client for talking to casefiled.

use cf_daemon::wire;
use cf_daemon::{Request, Response};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Daemon not running or socket unreachable. Transient.
    #[error("cannot reach casefiled at {socket}: {source}")]
    Unreachable {
        socket: String,
        #[source]
        source: std::io::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(#[from] wire::ProtocolError),
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: &Path) -> Self {
        Self {
            socket_path: socket_path.to_owned(),
        }
    }

    /// Send one request and wait for the response.
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let mut stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|source| ClientError::Unreachable {
                    socket: self.socket_path.display().to_string(),
                    source,
                })?;

        let encoded = wire::encode(&request)?;
        wire::write_message(&mut stream, &encoded).await?;
        let bytes = wire::read_message(&mut stream).await?;
        Ok(wire::decode(&bytes)?)
    }
}
