//! Blocking RESP Store Client
//!
//! `RespStore` speaks RESP2 over TCP to any Redis-compatible server,
//! including this crate's own development server. It is deliberately
//! blocking: the map layer releases references from `Drop`, and a
//! synchronous client keeps that path deterministic.
//!
//! ## Request Cycle
//!
//! ```text
//! ┌─────────────┐  encode   ┌─────────────┐  write   ┌────────────┐
//! │ Store call  │──────────>│ command     │─────────>│ TCP stream │
//! └─────────────┘           │ frame       │          └──────┬─────┘
//!                           └─────────────┘                 │ read
//!                           ┌─────────────┐  parse   ┌──────▼─────┐
//!                           │ reply frame │<─────────│  BytesMut  │
//!                           └─────────────┘          │  buffer    │
//!                                                    └────────────┘
//! ```
//!
//! One connection is shared by every handle using this store; a mutex
//! serializes request/reply cycles so replies cannot interleave.

use crate::protocol::{Frame, FrameParser};
use crate::store::{Store, StoreError};
use bytes::{Buf, BytesMut};
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use tracing::trace;

/// Initial capacity of the reply buffer
const INITIAL_BUFFER_SIZE: usize = 4096;

/// A blocking RESP client implementing [`Store`].
///
/// # Example
///
/// ```no_run
/// use redmap::store::RespStore;
///
/// let store = RespStore::connect("127.0.0.1:6379").unwrap();
/// ```
pub struct RespStore {
    conn: Mutex<Connection>,
}

/// The single underlying connection: stream plus reply re-assembly state.
struct Connection {
    stream: TcpStream,
    buffer: BytesMut,
    parser: FrameParser,
}

impl std::fmt::Debug for RespStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespStore").finish_non_exhaustive()
    }
}

impl RespStore {
    /// Connects to a Redis-compatible server.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, StoreError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            conn: Mutex::new(Connection {
                stream,
                buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
                parser: FrameParser::new(),
            }),
        })
    }

    /// Sends one command and reads one reply.
    fn request<A: AsRef<[u8]>>(&self, args: &[A]) -> Result<Frame, StoreError> {
        let mut guard = self.conn.lock().unwrap();
        let conn = &mut *guard;

        let wire = Frame::command(args).encode();
        conn.stream.write_all(&wire)?;
        trace!(bytes = wire.len(), "sent command");

        loop {
            if let Some((frame, consumed)) = conn.parser.parse(&conn.buffer)? {
                conn.buffer.advance(consumed);
                trace!(consumed, "received reply");
                return match frame {
                    Frame::Error(message) => Err(StoreError::Server(message)),
                    frame => Ok(frame),
                };
            }

            let mut chunk = [0u8; 4096];
            let n = conn.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "server closed the connection mid-reply",
                )));
            }
            conn.buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

// ============================================================================
// Reply conversion helpers
// ============================================================================

fn unexpected(frame: &Frame) -> StoreError {
    StoreError::UnexpectedReply(format!("{:?}", frame))
}

/// `Bulk` -> text, `Null` -> `None`.
fn reply_text(frame: Frame) -> Result<Option<String>, StoreError> {
    match frame {
        Frame::Null => Ok(None),
        Frame::Bulk(data) => String::from_utf8(data.into())
            .map(Some)
            .map_err(|e| StoreError::Utf8(e.to_string())),
        other => Err(unexpected(&other)),
    }
}

fn reply_integer(frame: Frame) -> Result<i64, StoreError> {
    frame.as_integer().ok_or_else(|| unexpected(&frame))
}

/// Flat `Array` of bulk strings -> texts.
fn reply_texts(frame: Frame) -> Result<Vec<String>, StoreError> {
    let frames = match frame {
        Frame::Array(frames) => frames,
        other => return Err(unexpected(&other)),
    };
    frames
        .into_iter()
        .map(|frame| reply_text(frame)?.ok_or_else(|| unexpected(&Frame::Null)))
        .collect()
}

/// HGETALL reply: alternating field/value bulk strings.
fn reply_pairs(frame: Frame) -> Result<HashMap<String, String>, StoreError> {
    let items = reply_texts(frame)?;
    if items.len() % 2 != 0 {
        return Err(StoreError::UnexpectedReply(format!(
            "odd field/value reply length: {}",
            items.len()
        )));
    }

    let mut pairs = HashMap::with_capacity(items.len() / 2);
    let mut items = items.into_iter();
    while let (Some(field), Some(value)) = (items.next(), items.next()) {
        pairs.insert(field, value);
    }
    Ok(pairs)
}

impl Store for RespStore {
    fn hash_get_all(&self, name: &str) -> Result<HashMap<String, String>, StoreError> {
        reply_pairs(self.request(&[b"HGETALL", name.as_bytes()])?)
    }

    fn hash_get(&self, name: &str, field: &str) -> Result<Option<String>, StoreError> {
        reply_text(self.request(&[b"HGET", name.as_bytes(), field.as_bytes()])?)
    }

    fn hash_set(&self, name: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.request(&[b"HSET", name.as_bytes(), field.as_bytes(), value.as_bytes()])
            .and_then(reply_integer)
            .map(|_| ())
    }

    fn hash_set_many(
        &self,
        name: &str,
        entries: &HashMap<String, String>,
    ) -> Result<(), StoreError> {
        // HSET rejects an empty field/value tail, and there is nothing to do
        if entries.is_empty() {
            return Ok(());
        }

        let mut args: Vec<&[u8]> = Vec::with_capacity(2 + entries.len() * 2);
        args.push(b"HSET");
        args.push(name.as_bytes());
        for (field, value) in entries {
            args.push(field.as_bytes());
            args.push(value.as_bytes());
        }

        self.request(&args).and_then(reply_integer).map(|_| ())
    }

    fn hash_del(&self, name: &str, field: &str) -> Result<(), StoreError> {
        self.request(&[b"HDEL", name.as_bytes(), field.as_bytes()])
            .and_then(reply_integer)
            .map(|_| ())
    }

    fn hash_keys(&self, name: &str) -> Result<HashSet<String>, StoreError> {
        Ok(reply_texts(self.request(&[b"HKEYS", name.as_bytes()])?)?
            .into_iter()
            .collect())
    }

    fn hash_values(&self, name: &str) -> Result<Vec<String>, StoreError> {
        reply_texts(self.request(&[b"HVALS", name.as_bytes()])?)
    }

    fn list_push(&self, name: &str, token: &str) -> Result<(), StoreError> {
        self.request(&[b"LPUSH", name.as_bytes(), token.as_bytes()])
            .and_then(reply_integer)
            .map(|_| ())
    }

    fn list_pop(&self, name: &str) -> Result<Option<String>, StoreError> {
        reply_text(self.request(&[b"LPOP", name.as_bytes()])?)
    }

    fn list_len(&self, name: &str) -> Result<u64, StoreError> {
        self.request(&[b"LLEN", name.as_bytes()])
            .and_then(reply_integer)
            .map(|n| n.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// One-shot fake server: accepts a single connection and answers each
    /// expected request with the canned reply.
    fn canned_server(exchanges: Vec<(&'static [u8], &'static [u8])>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            for (expected, reply) in exchanges {
                let mut request = vec![0u8; expected.len()];
                stream.read_exact(&mut request).unwrap();
                assert_eq!(request, expected);
                stream.write_all(reply).unwrap();
            }
        });

        addr
    }

    #[test]
    fn test_hash_get_roundtrip() {
        let addr = canned_server(vec![(
            b"*3\r\n$4\r\nHGET\r\n$1\r\nm\r\n$1\r\nk\r\n",
            b"$5\r\nhello\r\n",
        )]);

        let store = RespStore::connect(addr).unwrap();
        assert_eq!(store.hash_get("m", "k").unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn test_hash_get_null_reply() {
        let addr = canned_server(vec![(
            b"*3\r\n$4\r\nHGET\r\n$1\r\nm\r\n$1\r\nk\r\n",
            b"$-1\r\n",
        )]);

        let store = RespStore::connect(addr).unwrap();
        assert_eq!(store.hash_get("m", "k").unwrap(), None);
    }

    #[test]
    fn test_hash_get_all_pairs() {
        let addr = canned_server(vec![(
            b"*2\r\n$7\r\nHGETALL\r\n$1\r\nm\r\n",
            b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n",
        )]);

        let store = RespStore::connect(addr).unwrap();
        let all = store.hash_get_all("m").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("a"), Some(&"1".to_string()));
        assert_eq!(all.get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn test_fragmented_reply() {
        // The reply arrives in two TCP segments; the client must reassemble
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 64];
            let _ = stream.read(&mut request).unwrap();
            stream.write_all(b"$5\r\nhe").unwrap();
            stream.flush().unwrap();
            thread::sleep(std::time::Duration::from_millis(20));
            stream.write_all(b"llo\r\n").unwrap();
        });

        let store = RespStore::connect(addr).unwrap();
        assert_eq!(store.hash_get("m", "k").unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn test_server_error_reply() {
        let addr = canned_server(vec![(
            b"*2\r\n$4\r\nLLEN\r\n$1\r\nl\r\n",
            b"-ERR wrong type\r\n",
        )]);

        let store = RespStore::connect(addr).unwrap();
        assert!(matches!(
            store.list_len("l"),
            Err(StoreError::Server(message)) if message == "ERR wrong type"
        ));
    }

    #[test]
    fn test_empty_set_many_skips_round_trip() {
        // No exchange expected: the call must not touch the wire
        let addr = canned_server(vec![]);
        let store = RespStore::connect(addr).unwrap();
        store.hash_set_many("m", &HashMap::new()).unwrap();
    }
}
