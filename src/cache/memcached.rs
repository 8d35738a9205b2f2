//! Memcached text-protocol client.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use super::CacheStore;
use crate::error::{Error, Result};

/// One client against a set of memcached servers.
///
/// Keys are sharded across servers by hash. The connection is established
/// lazily and dropped on any protocol or I/O error, so the next operation
/// redials and a restarted backend recovers without restarting the gateway.
pub struct MemcachedStore {
    servers: Vec<String>,
    conn: Mutex<Option<Connection>>,
}

struct Connection {
    server: String,
    stream: BufStream<TcpStream>,
}

fn unavailable(err: impl std::fmt::Display) -> Error {
    Error::CacheUnavailable(err.to_string())
}

impl MemcachedStore {
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers,
            conn: Mutex::new(None),
        }
    }

    fn server_for(&self, key: &str) -> &str {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.servers[(hasher.finish() as usize) % self.servers.len()]
    }

    /// Dial the server for `key` unless the held connection already points
    /// at it.
    async fn ensure<'a>(
        guard: &'a mut Option<Connection>,
        server: &str,
    ) -> Result<&'a mut BufStream<TcpStream>> {
        let needs_dial = match guard.as_ref() {
            Some(conn) => conn.server != server,
            None => true,
        };
        if needs_dial {
            let stream = TcpStream::connect(server).await.map_err(unavailable)?;
            *guard = Some(Connection {
                server: server.to_string(),
                stream: BufStream::new(stream),
            });
        }
        Ok(&mut guard.as_mut().expect("connection established above").stream)
    }

    async fn get_on(stream: &mut BufStream<TcpStream>, key: &str) -> Result<Option<Vec<u8>>> {
        stream
            .write_all(format!("get {}\r\n", key).as_bytes())
            .await
            .map_err(unavailable)?;
        stream.flush().await.map_err(unavailable)?;

        let header = read_line(stream).await?;
        if header == "END" {
            return Ok(None);
        }
        // VALUE <key> <flags> <bytes>
        let length: usize = header
            .strip_prefix("VALUE ")
            .and_then(|rest| rest.split_whitespace().nth(2))
            .and_then(|len| len.parse().ok())
            .ok_or_else(|| unavailable(format!("unexpected reply: {}", header)))?;

        let mut value = vec![0u8; length + 2];
        stream.read_exact(&mut value).await.map_err(unavailable)?;
        value.truncate(length);

        let tail = read_line(stream).await?;
        if tail != "END" {
            return Err(unavailable(format!("unexpected reply tail: {}", tail)));
        }
        Ok(Some(value))
    }

    async fn set_on(
        stream: &mut BufStream<TcpStream>,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<()> {
        let command = format!("set {} 0 {} {}\r\n", key, ttl.as_secs(), value.len());
        stream
            .write_all(command.as_bytes())
            .await
            .map_err(unavailable)?;
        stream.write_all(value).await.map_err(unavailable)?;
        stream.write_all(b"\r\n").await.map_err(unavailable)?;
        stream.flush().await.map_err(unavailable)?;

        let reply = read_line(stream).await?;
        if reply != "STORED" {
            return Err(unavailable(format!("store rejected: {}", reply)));
        }
        Ok(())
    }

    async fn delete_on(stream: &mut BufStream<TcpStream>, key: &str) -> Result<()> {
        stream
            .write_all(format!("delete {}\r\n", key).as_bytes())
            .await
            .map_err(unavailable)?;
        stream.flush().await.map_err(unavailable)?;

        let reply = read_line(stream).await?;
        match reply.as_str() {
            "DELETED" | "NOT_FOUND" => Ok(()),
            other => Err(unavailable(format!("delete rejected: {}", other))),
        }
    }
}

async fn read_line(stream: &mut BufStream<TcpStream>) -> Result<String> {
    let mut line = String::new();
    let n = stream.read_line(&mut line).await.map_err(unavailable)?;
    if n == 0 {
        return Err(unavailable("connection closed by cache server"));
    }
    Ok(line.trim_end().to_string())
}

#[async_trait]
impl CacheStore for MemcachedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let server = self.server_for(key).to_string();
        let mut guard = self.conn.lock().await;
        let stream = Self::ensure(&mut guard, &server).await?;
        let result = Self::get_on(stream, key).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let server = self.server_for(key).to_string();
        let mut guard = self.conn.lock().await;
        let stream = Self::ensure(&mut guard, &server).await?;
        let result = Self::set_on(stream, key, value, ttl).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let server = self.server_for(key).to_string();
        let mut guard = self.conn.lock().await;
        let stream = Self::ensure(&mut guard, &server).await?;
        let result = Self::delete_on(stream, key).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Single-connection scripted memcached holding one key in memory.
    async fn spawn_fake_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut stored: Option<(String, Vec<u8>)> = None;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    return;
                }
                let parts: Vec<String> =
                    line.trim_end().split_whitespace().map(String::from).collect();
                match parts[0].as_str() {
                    "set" => {
                        let length: usize = parts[4].parse().unwrap();
                        let mut value = vec![0u8; length + 2];
                        reader.read_exact(&mut value).await.unwrap();
                        value.truncate(length);
                        stored = Some((parts[1].clone(), value));
                        reader.get_mut().write_all(b"STORED\r\n").await.unwrap();
                    }
                    "get" => {
                        let reply = match &stored {
                            Some((key, value)) if *key == parts[1] => format!(
                                "VALUE {} 0 {}\r\n{}\r\nEND\r\n",
                                key,
                                value.len(),
                                String::from_utf8_lossy(value)
                            ),
                            _ => "END\r\n".to_string(),
                        };
                        reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
                    }
                    "delete" => {
                        stored = None;
                        reader.get_mut().write_all(b"DELETED\r\n").await.unwrap();
                    }
                    _ => return,
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_set_get_delete_roundtrip() {
        let addr = spawn_fake_server().await;
        let store = MemcachedStore::new(vec![addr]);

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", b"hello", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"hello".to_vec()));
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_cache_unavailable() {
        // Bind then drop to get an address nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let store = MemcachedStore::new(vec![addr]);
        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, Error::CacheUnavailable(_)));
    }
}
