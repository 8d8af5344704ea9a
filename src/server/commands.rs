//! Command Dispatch for the Development Server
//!
//! Receives parsed command frames, executes them against the shared
//! [`MemoryStore`], and produces reply frames.
//!
//! ```text
//! ┌─────────────────┐
//! │  FrameParser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  MemoryStore    │  (store module)
//! └─────────────────┘
//! ```
//!
//! The command surface is the subset a shared-map client needs, plus the
//! usual operability commands:
//!
//! - Hash: `HSET`, `HGET`, `HGETALL`, `HDEL`, `HKEYS`, `HVALS`, `HLEN`,
//!   `HEXISTS`
//! - List: `LPUSH`, `LPOP`, `LLEN`
//! - Keys: `DEL`, `EXISTS`
//! - Server: `PING`, `ECHO`, `DBSIZE`, `FLUSHDB`/`FLUSHALL`, `INFO`,
//!   `COMMAND`, `QUIT`

use crate::protocol::Frame;
use crate::store::MemoryStore;
use bytes::Bytes;
use std::sync::Arc;

/// Executes command frames against the storage engine.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The storage engine, shared across connections
    store: Arc<MemoryStore>,
}

impl CommandHandler {
    /// Creates a new command handler over the given engine.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Executes one command and returns the reply frame.
    pub fn execute(&self, command: Frame) -> Frame {
        let args = match command {
            Frame::Array(args) => args,
            _ => return Frame::error("ERR invalid command format"),
        };

        if args.is_empty() {
            return Frame::error("ERR empty command");
        }

        let name = match args[0].as_str() {
            Some(name) => name.to_uppercase(),
            None => return Frame::error("ERR invalid command name"),
        };

        self.dispatch(&name, &args[1..])
    }

    fn dispatch(&self, command: &str, args: &[Frame]) -> Frame {
        match command {
            // Hash commands
            "HSET" => self.cmd_hset(args),
            "HGET" => self.cmd_hget(args),
            "HGETALL" => self.cmd_hgetall(args),
            "HDEL" => self.cmd_hdel(args),
            "HKEYS" => self.cmd_hkeys(args),
            "HVALS" => self.cmd_hvals(args),
            "HLEN" => self.cmd_hlen(args),
            "HEXISTS" => self.cmd_hexists(args),

            // List commands
            "LPUSH" => self.cmd_lpush(args),
            "LPOP" => self.cmd_lpop(args),
            "LLEN" => self.cmd_llen(args),

            // Key commands
            "DEL" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),

            // Server commands
            "PING" => self.cmd_ping(args),
            "ECHO" => self.cmd_echo(args),
            "DBSIZE" => self.cmd_dbsize(args),
            "FLUSHDB" | "FLUSHALL" => self.cmd_flush(args),
            "INFO" => self.cmd_info(args),
            "COMMAND" => Frame::array(vec![]),
            "QUIT" => Frame::ok(),

            _ => Frame::error(format!("ERR unknown command '{}'", command)),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    /// Extracts the payload bytes of an argument frame.
    fn arg_bytes(frame: &Frame) -> Option<Bytes> {
        match frame {
            Frame::Bulk(b) => Some(b.clone()),
            Frame::Simple(s) => Some(Bytes::from(s.clone())),
            _ => None,
        }
    }

    fn wrong_args(command: &str) -> Frame {
        Frame::error(format!(
            "ERR wrong number of arguments for '{}' command",
            command.to_lowercase()
        ))
    }

    // ========================================================================
    // Hash commands
    // ========================================================================

    /// `HSET name field value [field value ...]`
    fn cmd_hset(&self, args: &[Frame]) -> Frame {
        if args.len() < 3 || args.len() % 2 == 0 {
            return Self::wrong_args("HSET");
        }

        let Some(name) = Self::arg_bytes(&args[0]) else {
            return Frame::error("ERR invalid object name");
        };

        let mut entries = Vec::with_capacity((args.len() - 1) / 2);
        for pair in args[1..].chunks_exact(2) {
            match (Self::arg_bytes(&pair[0]), Self::arg_bytes(&pair[1])) {
                (Some(field), Some(value)) => entries.push((field, value)),
                _ => return Frame::error("ERR invalid field or value"),
            }
        }

        Frame::integer(self.store.hset_many(name, entries) as i64)
    }

    /// `HGET name field`
    fn cmd_hget(&self, args: &[Frame]) -> Frame {
        let (Some(name), Some(field)) = (
            args.first().and_then(Self::arg_bytes),
            args.get(1).and_then(Self::arg_bytes),
        ) else {
            return Self::wrong_args("HGET");
        };
        if args.len() != 2 {
            return Self::wrong_args("HGET");
        }

        match self.store.hget(&name, &field) {
            Some(value) => Frame::Bulk(value),
            None => Frame::Null,
        }
    }

    /// `HGETALL name`
    fn cmd_hgetall(&self, args: &[Frame]) -> Frame {
        let (Some(name), 1) = (args.first().and_then(Self::arg_bytes), args.len()) else {
            return Self::wrong_args("HGETALL");
        };

        let mut reply = Vec::new();
        for (field, value) in self.store.hget_all(&name) {
            reply.push(Frame::Bulk(field));
            reply.push(Frame::Bulk(value));
        }
        Frame::array(reply)
    }

    /// `HDEL name field [field ...]`
    fn cmd_hdel(&self, args: &[Frame]) -> Frame {
        if args.len() < 2 {
            return Self::wrong_args("HDEL");
        }
        let Some(name) = Self::arg_bytes(&args[0]) else {
            return Frame::error("ERR invalid object name");
        };

        let mut removed = 0i64;
        for arg in &args[1..] {
            let Some(field) = Self::arg_bytes(arg) else {
                return Frame::error("ERR invalid field");
            };
            if self.store.hdel(&name, &field) {
                removed += 1;
            }
        }
        Frame::integer(removed)
    }

    /// `HKEYS name`
    fn cmd_hkeys(&self, args: &[Frame]) -> Frame {
        let (Some(name), 1) = (args.first().and_then(Self::arg_bytes), args.len()) else {
            return Self::wrong_args("HKEYS");
        };

        Frame::array(self.store.hkeys(&name).into_iter().map(Frame::Bulk).collect())
    }

    /// `HVALS name`
    fn cmd_hvals(&self, args: &[Frame]) -> Frame {
        let (Some(name), 1) = (args.first().and_then(Self::arg_bytes), args.len()) else {
            return Self::wrong_args("HVALS");
        };

        Frame::array(self.store.hvals(&name).into_iter().map(Frame::Bulk).collect())
    }

    /// `HLEN name`
    fn cmd_hlen(&self, args: &[Frame]) -> Frame {
        let (Some(name), 1) = (args.first().and_then(Self::arg_bytes), args.len()) else {
            return Self::wrong_args("HLEN");
        };

        Frame::integer(self.store.hlen(&name) as i64)
    }

    /// `HEXISTS name field`
    fn cmd_hexists(&self, args: &[Frame]) -> Frame {
        if args.len() != 2 {
            return Self::wrong_args("HEXISTS");
        }
        let (Some(name), Some(field)) = (
            Self::arg_bytes(&args[0]),
            Self::arg_bytes(&args[1]),
        ) else {
            return Self::wrong_args("HEXISTS");
        };

        Frame::integer(self.store.hexists(&name, &field) as i64)
    }

    // ========================================================================
    // List commands
    // ========================================================================

    /// `LPUSH name value [value ...]`
    fn cmd_lpush(&self, args: &[Frame]) -> Frame {
        if args.len() < 2 {
            return Self::wrong_args("LPUSH");
        }
        let Some(name) = Self::arg_bytes(&args[0]) else {
            return Frame::error("ERR invalid object name");
        };

        let mut values = Vec::with_capacity(args.len() - 1);
        for arg in &args[1..] {
            match Self::arg_bytes(arg) {
                Some(value) => values.push(value),
                None => return Frame::error("ERR invalid value"),
            }
        }

        Frame::integer(self.store.lpush(name, values) as i64)
    }

    /// `LPOP name`
    fn cmd_lpop(&self, args: &[Frame]) -> Frame {
        let (Some(name), 1) = (args.first().and_then(Self::arg_bytes), args.len()) else {
            return Self::wrong_args("LPOP");
        };

        match self.store.lpop(&name) {
            Some(value) => Frame::Bulk(value),
            None => Frame::Null,
        }
    }

    /// `LLEN name`
    fn cmd_llen(&self, args: &[Frame]) -> Frame {
        let (Some(name), 1) = (args.first().and_then(Self::arg_bytes), args.len()) else {
            return Self::wrong_args("LLEN");
        };

        Frame::integer(self.store.llen(&name) as i64)
    }

    // ========================================================================
    // Key and server commands
    // ========================================================================

    /// `DEL name [name ...]`
    fn cmd_del(&self, args: &[Frame]) -> Frame {
        if args.is_empty() {
            return Self::wrong_args("DEL");
        }

        let mut removed = 0i64;
        for arg in args {
            let Some(name) = Self::arg_bytes(arg) else {
                return Frame::error("ERR invalid object name");
            };
            if self.store.del(&name) {
                removed += 1;
            }
        }
        Frame::integer(removed)
    }

    /// `EXISTS name [name ...]`
    fn cmd_exists(&self, args: &[Frame]) -> Frame {
        if args.is_empty() {
            return Self::wrong_args("EXISTS");
        }

        let mut found = 0i64;
        for arg in args {
            let Some(name) = Self::arg_bytes(arg) else {
                return Frame::error("ERR invalid object name");
            };
            if self.store.exists(&name) {
                found += 1;
            }
        }
        Frame::integer(found)
    }

    /// `PING [message]`
    fn cmd_ping(&self, args: &[Frame]) -> Frame {
        match args.first() {
            None => Frame::simple("PONG"),
            Some(frame) => match Self::arg_bytes(frame) {
                Some(message) => Frame::Bulk(message),
                None => Self::wrong_args("PING"),
            },
        }
    }

    /// `ECHO message`
    fn cmd_echo(&self, args: &[Frame]) -> Frame {
        let (Some(message), 1) = (args.first().and_then(Self::arg_bytes), args.len()) else {
            return Self::wrong_args("ECHO");
        };
        Frame::Bulk(message)
    }

    /// `DBSIZE`
    fn cmd_dbsize(&self, _args: &[Frame]) -> Frame {
        Frame::integer(self.store.len() as i64)
    }

    /// `FLUSHDB` / `FLUSHALL`
    fn cmd_flush(&self, _args: &[Frame]) -> Frame {
        self.store.flush();
        Frame::ok()
    }

    /// `INFO [section]`
    fn cmd_info(&self, _args: &[Frame]) -> Frame {
        let stats = self.store.stats();
        let info = format!(
            "# Server\r\nredmap_version:{}\r\n\r\n# Keyspace\r\nobjects:{}\r\nhash_ops:{}\r\nlist_ops:{}\r\n",
            env!("CARGO_PKG_VERSION"),
            stats.objects,
            stats.hash_ops,
            stats.list_ops,
        );
        Frame::bulk(info)
    }
}
