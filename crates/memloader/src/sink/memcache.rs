//! memcached backend speaking the text protocol.
//!
//! One connection per store, opened lazily and dropped after any transport
//! failure so the next write reconnects. Writes are never retried.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use snafu::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use super::traits::Store;
use crate::error::{
    ConnectSnafu, ConnectionClosedSnafu, InvalidKeySnafu, IoSnafu, RejectedSnafu, TimeoutSnafu,
    WriteError,
};

/// Longest key memcached accepts.
const MAX_KEY_LEN: usize = 250;

type Connection = BufStream<TcpStream>;

/// A single memcached server.
pub struct MemcacheStore {
    address: String,
    timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl MemcacheStore {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            connection: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<Connection, WriteError> {
        let stream = TcpStream::connect(&self.address)
            .await
            .context(ConnectSnafu {
                address: &self.address,
            })?;
        stream.set_nodelay(true).context(IoSnafu {
            address: &self.address,
        })?;
        debug!(address = %self.address, "Connected to memcached");
        Ok(BufStream::new(stream))
    }

    async fn set(
        &self,
        slot: &mut Option<Connection>,
        key: &str,
        value: &[u8],
    ) -> Result<(), WriteError> {
        if slot.is_none() {
            *slot = Some(self.connect().await?);
        }
        let Some(conn) = slot.as_mut() else {
            return ConnectionClosedSnafu {
                address: &self.address,
            }
            .fail();
        };

        let io = IoSnafu {
            address: &self.address,
        };
        let header = format!("set {key} 0 0 {}\r\n", value.len());
        conn.write_all(header.as_bytes()).await.context(io)?;
        conn.write_all(value).await.context(io)?;
        conn.write_all(b"\r\n").await.context(io)?;
        conn.flush().await.context(io)?;

        let mut reply = String::new();
        let read = conn.read_line(&mut reply).await.context(io)?;
        ensure!(
            read > 0,
            ConnectionClosedSnafu {
                address: &self.address
            }
        );

        match reply.trim_end() {
            "STORED" => Ok(()),
            other => RejectedSnafu {
                address: &self.address,
                reply: other,
            }
            .fail(),
        }
    }
}

#[async_trait]
impl Store for MemcacheStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), WriteError> {
        ensure!(is_valid_key(key), InvalidKeySnafu { key });

        let mut slot = self.connection.lock().await;
        let result = tokio::time::timeout(self.timeout, self.set(&mut slot, key, &value)).await;

        let result = match result {
            Ok(inner) => inner,
            Err(_) => TimeoutSnafu {
                address: &self.address,
                timeout_ms: self.timeout.as_millis() as u64,
            }
            .fail(),
        };

        // A rejected write leaves the protocol in sync; anything else may not.
        if let Err(e) = &result
            && !matches!(e, WriteError::Rejected { .. })
        {
            *slot = None;
        }
        result
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// Keys must fit the text protocol: bounded length, no whitespace or control
/// characters.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.bytes().all(|b| b > b' ' && b != 0x7f)
}
