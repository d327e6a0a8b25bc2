//! Command Dispatcher
//!
//! Maps a parsed argument vector to a keyspace operation and encodes the
//! RESP reply. Command names are matched case-insensitively; every handler
//! validates its own arity and numeric arguments and answers a descriptive
//! error reply on violation, so a bad command never tears down the
//! connection.
//!
//! ## Supported Commands
//!
//! ### Strings and keys
//! - `PING`, `ECHO msg`, `QUIT`
//! - `SET key value [EX seconds | PX milliseconds]`, `GET key`
//! - `DEL|UNLINK key [key ...]`, `EXISTS key [key ...]`
//! - `FLUSHALL`, `KEYS [pattern]`, `DBSIZE`, `TYPE key`
//! - `EXPIRE key seconds`, `TTL key`, `PERSIST key`
//! - `RENAME old new`, `INCR key`
//!
//! ### Lists
//! - `LPUSH|RPUSH key value [value ...]`, `LPOP|RPOP key`
//! - `LLEN key`, `LGET key`, `LRANGE key start stop`
//! - `LREM key count value`, `LINDEX key index`, `LSET key index value`
//!
//! ### Hashes
//! - `HSET key field value`, `HGET key field`, `HDEL key field`
//! - `HEXISTS key field`, `HGETALL key`, `HKEYS key`, `HVALS key`
//! - `HLEN key`, `HMSET key field value [field value ...]`

use bytes::Bytes;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::protocol::RespValue;
use crate::storage::{Keyspace, KeyspaceError};

/// Executes commands against the shared keyspace.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    keyspace: Arc<Keyspace>,
}

impl CommandHandler {
    /// Creates a handler over the given keyspace.
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        Self { keyspace }
    }

    /// Executes one command and returns its reply.
    ///
    /// A panic inside a handler is caught and answered with a generic
    /// internal error so one faulty command cannot take the worker down.
    pub fn execute(&self, tokens: &[Bytes]) -> RespValue {
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(tokens))) {
            Ok(reply) => reply,
            Err(_) => {
                error!("Command handler panicked");
                RespValue::error("ERR internal error")
            }
        }
    }

    fn dispatch(&self, tokens: &[Bytes]) -> RespValue {
        let Some(name) = tokens.first() else {
            return RespValue::error("ERR empty command");
        };
        let Ok(name) = std::str::from_utf8(name) else {
            return RespValue::error("ERR invalid command name");
        };
        let name = name.to_ascii_uppercase();
        let args = &tokens[1..];

        match name.as_str() {
            "PING" => self.cmd_ping(args),
            "ECHO" => self.cmd_echo(args),
            "QUIT" => RespValue::ok(),

            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "DEL" | "UNLINK" => self.cmd_del(args),
            "EXISTS" => self.cmd_exists(args),
            "FLUSHALL" => self.cmd_flushall(args),
            "KEYS" => self.cmd_keys(args),
            "DBSIZE" => self.cmd_dbsize(args),
            "TYPE" => self.cmd_type(args),
            "EXPIRE" => self.cmd_expire(args),
            "TTL" => self.cmd_ttl(args),
            "PERSIST" => self.cmd_persist(args),
            "RENAME" => self.cmd_rename(args),
            "INCR" => self.cmd_incr(args),

            "LPUSH" => self.cmd_push(args, true),
            "RPUSH" => self.cmd_push(args, false),
            "LPOP" => self.cmd_pop(args, true),
            "RPOP" => self.cmd_pop(args, false),
            "LLEN" => self.cmd_llen(args),
            "LGET" => self.cmd_lget(args),
            "LRANGE" => self.cmd_lrange(args),
            "LREM" => self.cmd_lrem(args),
            "LINDEX" => self.cmd_lindex(args),
            "LSET" => self.cmd_lset(args),

            "HSET" => self.cmd_hset(args),
            "HGET" => self.cmd_hget(args),
            "HDEL" => self.cmd_hdel(args),
            "HEXISTS" => self.cmd_hexists(args),
            "HGETALL" => self.cmd_hgetall(args),
            "HKEYS" => self.cmd_hkeys(args),
            "HVALS" => self.cmd_hvals(args),
            "HLEN" => self.cmd_hlen(args),
            "HMSET" => self.cmd_hmset(args),

            _ => {
                warn!(command = %name, "Unknown command");
                RespValue::error(format!("ERR unknown command '{}'", name))
            }
        }
    }

    // ------------------------------------------------------------------
    // Connection commands
    // ------------------------------------------------------------------

    fn cmd_ping(&self, args: &[Bytes]) -> RespValue {
        match args.first() {
            None => RespValue::pong(),
            Some(msg) => RespValue::bulk_string(msg.clone()),
        }
    }

    fn cmd_echo(&self, args: &[Bytes]) -> RespValue {
        match args.first() {
            Some(msg) => RespValue::bulk_string(msg.clone()),
            None => wrong_arity("ECHO"),
        }
    }

    // ------------------------------------------------------------------
    // String and key commands
    // ------------------------------------------------------------------

    /// SET key value [EX seconds | PX milliseconds]
    fn cmd_set(&self, args: &[Bytes]) -> RespValue {
        if args.len() < 2 {
            return wrong_arity("SET");
        }

        let mut ttl: Option<Duration> = None;
        let mut i = 2;
        while i < args.len() {
            let Some(opt) = as_str(&args[i]) else {
                return RespValue::error("ERR syntax error");
            };
            match opt.to_ascii_uppercase().as_str() {
                "EX" => {
                    let Some(secs) = args.get(i + 1).and_then(parse_int).filter(|s| *s > 0) else {
                        return RespValue::error("ERR invalid expire time in 'SET' command");
                    };
                    ttl = Some(Duration::from_secs(secs as u64));
                    i += 2;
                }
                "PX" => {
                    let Some(ms) = args.get(i + 1).and_then(parse_int).filter(|m| *m > 0) else {
                        return RespValue::error("ERR invalid expire time in 'SET' command");
                    };
                    // PX resolves to whole seconds, rounded up.
                    ttl = Some(Duration::from_secs(((ms + 999) / 1000) as u64));
                    i += 2;
                }
                other => {
                    return RespValue::error(format!("ERR unknown option '{}'", other));
                }
            }
        }

        match self.keyspace.set(args[0].clone(), args[1].clone(), ttl) {
            Ok(()) => RespValue::ok(),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_get(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("GET");
        }
        match self.keyspace.get(&args[0]) {
            Ok(Some(value)) => RespValue::bulk_string(value),
            Ok(None) => RespValue::null(),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_del(&self, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return wrong_arity("DEL");
        }
        let removed = args.iter().filter(|key| self.keyspace.del(key)).count();
        RespValue::integer(removed as i64)
    }

    fn cmd_exists(&self, args: &[Bytes]) -> RespValue {
        if args.is_empty() {
            return wrong_arity("EXISTS");
        }
        let count = args.iter().filter(|key| self.keyspace.exists(key)).count();
        RespValue::integer(count as i64)
    }

    fn cmd_flushall(&self, _args: &[Bytes]) -> RespValue {
        self.keyspace.flush_all();
        RespValue::ok()
    }

    /// KEYS [pattern] — a bare KEYS lists everything.
    fn cmd_keys(&self, args: &[Bytes]) -> RespValue {
        let pattern = args.first().map(|p| &p[..]);
        let keys = self.keyspace.keys(pattern);
        RespValue::array(keys.into_iter().map(RespValue::bulk_string).collect())
    }

    fn cmd_dbsize(&self, _args: &[Bytes]) -> RespValue {
        RespValue::integer(self.keyspace.len() as i64)
    }

    fn cmd_type(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("TYPE");
        }
        RespValue::simple_string(self.keyspace.key_type(&args[0]).as_str())
    }

    fn cmd_expire(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("EXPIRE");
        }
        let Some(seconds) = parse_int(&args[1]) else {
            return not_an_integer();
        };
        RespValue::integer(self.keyspace.expire(&args[0], seconds) as i64)
    }

    fn cmd_ttl(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("TTL");
        }
        RespValue::integer(self.keyspace.ttl(&args[0]))
    }

    fn cmd_persist(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("PERSIST");
        }
        RespValue::integer(self.keyspace.persist(&args[0]) as i64)
    }

    fn cmd_rename(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("RENAME");
        }
        if self.keyspace.rename(&args[0], &args[1]) {
            RespValue::ok()
        } else {
            RespValue::error("ERR no such key")
        }
    }

    fn cmd_incr(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("INCR");
        }
        match self.keyspace.incr(&args[0]) {
            Ok(n) => RespValue::integer(n),
            Err(e) => keyspace_error(e),
        }
    }

    // ------------------------------------------------------------------
    // List commands
    // ------------------------------------------------------------------

    fn cmd_push(&self, args: &[Bytes], front: bool) -> RespValue {
        if args.len() < 2 {
            return wrong_arity(if front { "LPUSH" } else { "RPUSH" });
        }
        let key = args[0].clone();
        let values = args[1..].to_vec();

        let result = if front {
            self.keyspace.lpush(key, values)
        } else {
            self.keyspace.rpush(key, values)
        };
        match result {
            Ok(len) => RespValue::integer(len as i64),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_pop(&self, args: &[Bytes], front: bool) -> RespValue {
        if args.len() != 1 {
            return wrong_arity(if front { "LPOP" } else { "RPOP" });
        }
        let result = if front {
            self.keyspace.lpop(&args[0])
        } else {
            self.keyspace.rpop(&args[0])
        };
        match result {
            Ok(Some(value)) => RespValue::bulk_string(value),
            Ok(None) => RespValue::null(),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_llen(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("LLEN");
        }
        match self.keyspace.llen(&args[0]) {
            Ok(len) => RespValue::integer(len as i64),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_lget(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("LGET");
        }
        match self.keyspace.lget(&args[0]) {
            Ok(items) => {
                RespValue::array(items.into_iter().map(RespValue::bulk_string).collect())
            }
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_lrange(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 3 {
            return wrong_arity("LRANGE");
        }
        let (Some(start), Some(stop)) = (parse_int(&args[1]), parse_int(&args[2])) else {
            return not_an_integer();
        };
        match self.keyspace.lrange(&args[0], start, stop) {
            Ok(items) => {
                RespValue::array(items.into_iter().map(RespValue::bulk_string).collect())
            }
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_lrem(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 3 {
            return wrong_arity("LREM");
        }
        let Some(count) = parse_int(&args[1]) else {
            return not_an_integer();
        };
        match self.keyspace.lrem(&args[0], count, &args[2]) {
            Ok(removed) => RespValue::integer(removed as i64),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_lindex(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("LINDEX");
        }
        let Some(index) = parse_int(&args[1]) else {
            return not_an_integer();
        };
        match self.keyspace.lindex(&args[0], index) {
            Ok(Some(value)) => RespValue::bulk_string(value),
            Ok(None) => RespValue::null(),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_lset(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 3 {
            return wrong_arity("LSET");
        }
        let Some(index) = parse_int(&args[1]) else {
            return not_an_integer();
        };
        match self.keyspace.lset(&args[0], index, args[2].clone()) {
            Ok(()) => RespValue::ok(),
            Err(e) => keyspace_error(e),
        }
    }

    // ------------------------------------------------------------------
    // Hash commands
    // ------------------------------------------------------------------

    fn cmd_hset(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 3 {
            return wrong_arity("HSET");
        }
        match self
            .keyspace
            .hset(args[0].clone(), args[1].clone(), args[2].clone())
        {
            Ok(()) => RespValue::integer(1),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hget(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("HGET");
        }
        match self.keyspace.hget(&args[0], &args[1]) {
            Ok(Some(value)) => RespValue::bulk_string(value),
            Ok(None) => RespValue::null(),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hdel(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("HDEL");
        }
        match self.keyspace.hdel(&args[0], &args[1]) {
            Ok(removed) => RespValue::integer(removed as i64),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hexists(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 2 {
            return wrong_arity("HEXISTS");
        }
        match self.keyspace.hexists(&args[0], &args[1]) {
            Ok(found) => RespValue::integer(found as i64),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hgetall(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("HGETALL");
        }
        match self.keyspace.hgetall(&args[0]) {
            Ok(pairs) => {
                let mut values = Vec::with_capacity(pairs.len() * 2);
                for (field, value) in pairs {
                    values.push(RespValue::bulk_string(field));
                    values.push(RespValue::bulk_string(value));
                }
                RespValue::array(values)
            }
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hkeys(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("HKEYS");
        }
        match self.keyspace.hkeys(&args[0]) {
            Ok(fields) => {
                RespValue::array(fields.into_iter().map(RespValue::bulk_string).collect())
            }
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hvals(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("HVALS");
        }
        match self.keyspace.hvals(&args[0]) {
            Ok(values) => {
                RespValue::array(values.into_iter().map(RespValue::bulk_string).collect())
            }
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hlen(&self, args: &[Bytes]) -> RespValue {
        if args.len() != 1 {
            return wrong_arity("HLEN");
        }
        match self.keyspace.hlen(&args[0]) {
            Ok(len) => RespValue::integer(len as i64),
            Err(e) => keyspace_error(e),
        }
    }

    fn cmd_hmset(&self, args: &[Bytes]) -> RespValue {
        if args.len() < 3 || args.len() % 2 == 0 {
            return wrong_arity("HMSET");
        }
        let pairs = args[1..]
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        match self.keyspace.hmset(args[0].clone(), pairs) {
            Ok(()) => RespValue::ok(),
            Err(e) => keyspace_error(e),
        }
    }
}

/// Maps a keyspace error to its reply. WRONGTYPE keeps the Redis error
/// class prefix; everything else is a plain ERR.
fn keyspace_error(e: KeyspaceError) -> RespValue {
    match e {
        KeyspaceError::WrongType => RespValue::error(e.to_string()),
        other => RespValue::error(format!("ERR {}", other)),
    }
}

fn wrong_arity(command: &str) -> RespValue {
    RespValue::error(format!("ERR wrong number of arguments for '{}' command", command))
}

fn not_an_integer() -> RespValue {
    RespValue::error("ERR value is not an integer or out of range")
}

fn as_str(bytes: &Bytes) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}

fn parse_int(bytes: &Bytes) -> Option<i64> {
    as_str(bytes)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> CommandHandler {
        CommandHandler::new(Arc::new(Keyspace::new()))
    }

    fn run(handler: &CommandHandler, parts: &[&str]) -> RespValue {
        let tokens: Vec<Bytes> = parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())).collect();
        handler.execute(&tokens)
    }

    #[test]
    fn test_ping() {
        let h = handler();
        assert_eq!(run(&h, &["PING"]), RespValue::pong());
        assert_eq!(run(&h, &["ping"]), RespValue::pong());
        assert_eq!(run(&h, &["PING", "hey"]), RespValue::bulk_string("hey"));
    }

    #[test]
    fn test_echo() {
        let h = handler();
        assert_eq!(run(&h, &["ECHO", "hello"]), RespValue::bulk_string("hello"));
        assert!(run(&h, &["ECHO"]).is_error());
    }

    #[test]
    fn test_empty_command() {
        let h = handler();
        assert_eq!(h.execute(&[]), RespValue::error("ERR empty command"));
    }

    #[test]
    fn test_unknown_command() {
        let h = handler();
        assert_eq!(run(&h, &["NOPE"]), RespValue::error("ERR unknown command 'NOPE'"));
    }

    #[test]
    fn test_set_get_del() {
        let h = handler();
        assert_eq!(run(&h, &["SET", "foo", "bar"]), RespValue::ok());
        assert_eq!(run(&h, &["GET", "foo"]), RespValue::bulk_string("bar"));
        assert_eq!(run(&h, &["DEL", "foo"]), RespValue::integer(1));
        assert_eq!(run(&h, &["GET", "foo"]), RespValue::null());
        assert_eq!(run(&h, &["UNLINK", "foo"]), RespValue::integer(0));
    }

    #[test]
    fn test_set_arity_and_options() {
        let h = handler();
        assert!(run(&h, &["SET", "k"]).is_error());
        assert!(run(&h, &["SET", "k", "v", "EX"]).is_error());
        assert!(run(&h, &["SET", "k", "v", "EX", "abc"]).is_error());
        assert!(run(&h, &["SET", "k", "v", "ZZ", "1"]).is_error());

        assert_eq!(run(&h, &["SET", "k", "v", "EX", "100"]), RespValue::ok());
        match run(&h, &["TTL", "k"]) {
            RespValue::Integer(ttl) => assert!((1..=100).contains(&ttl)),
            other => panic!("unexpected reply {:?}", other),
        }

        // PX rounds up to whole seconds.
        assert_eq!(run(&h, &["SET", "j", "v", "px", "1500"]), RespValue::ok());
        match run(&h, &["TTL", "j"]) {
            RespValue::Integer(ttl) => assert!((1..=2).contains(&ttl)),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_wrongtype_reply() {
        let h = handler();
        run(&h, &["RPUSH", "l", "a"]);
        let reply = run(&h, &["GET", "l"]);
        match reply {
            RespValue::Error(msg) => assert!(msg.starts_with("WRONGTYPE")),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_keys_type_dbsize() {
        let h = handler();
        run(&h, &["SET", "s", "v"]);
        run(&h, &["RPUSH", "l", "a"]);
        run(&h, &["HSET", "h", "f", "v"]);

        assert_eq!(run(&h, &["TYPE", "s"]), RespValue::simple_string("string"));
        assert_eq!(run(&h, &["TYPE", "l"]), RespValue::simple_string("list"));
        assert_eq!(run(&h, &["TYPE", "h"]), RespValue::simple_string("hash"));
        assert_eq!(run(&h, &["TYPE", "x"]), RespValue::simple_string("none"));

        match run(&h, &["KEYS"]) {
            RespValue::Array(keys) => assert_eq!(keys.len(), 3),
            other => panic!("unexpected reply {:?}", other),
        }
        match run(&h, &["KEYS", "s*"]) {
            RespValue::Array(keys) => assert_eq!(keys.len(), 1),
            other => panic!("unexpected reply {:?}", other),
        }
        assert_eq!(run(&h, &["DBSIZE"]), RespValue::integer(3));
    }

    #[test]
    fn test_expire_ttl_persist() {
        let h = handler();
        assert_eq!(run(&h, &["EXPIRE", "nope", "10"]), RespValue::integer(0));
        assert_eq!(run(&h, &["TTL", "nope"]), RespValue::integer(-2));

        run(&h, &["SET", "k", "v"]);
        assert_eq!(run(&h, &["TTL", "k"]), RespValue::integer(-1));
        assert_eq!(run(&h, &["EXPIRE", "k", "10"]), RespValue::integer(1));
        assert_eq!(run(&h, &["PERSIST", "k"]), RespValue::integer(1));
        assert_eq!(run(&h, &["TTL", "k"]), RespValue::integer(-1));
        assert!(run(&h, &["EXPIRE", "k", "soon"]).is_error());
    }

    #[test]
    fn test_rename() {
        let h = handler();
        assert_eq!(run(&h, &["RENAME", "a", "b"]), RespValue::error("ERR no such key"));
        run(&h, &["SET", "a", "v"]);
        assert_eq!(run(&h, &["RENAME", "a", "b"]), RespValue::ok());
        assert_eq!(run(&h, &["GET", "b"]), RespValue::bulk_string("v"));
    }

    #[test]
    fn test_incr() {
        let h = handler();
        assert_eq!(run(&h, &["INCR", "c"]), RespValue::integer(1));
        assert_eq!(run(&h, &["INCR", "c"]), RespValue::integer(2));

        run(&h, &["SET", "t", "abc"]);
        assert_eq!(
            run(&h, &["INCR", "t"]),
            RespValue::error("ERR value is not an integer or out of range")
        );
    }

    #[test]
    fn test_list_commands() {
        let h = handler();
        assert_eq!(run(&h, &["RPUSH", "l", "a", "b", "c"]), RespValue::integer(3));
        assert_eq!(run(&h, &["LLEN", "l"]), RespValue::integer(3));
        assert_eq!(run(&h, &["LINDEX", "l", "-1"]), RespValue::bulk_string("c"));
        assert_eq!(run(&h, &["LINDEX", "l", "9"]), RespValue::null());

        assert_eq!(
            run(&h, &["LRANGE", "l", "0", "-1"]),
            RespValue::array(vec![
                RespValue::bulk_string("a"),
                RespValue::bulk_string("b"),
                RespValue::bulk_string("c"),
            ])
        );

        assert_eq!(run(&h, &["LSET", "l", "0", "A"]), RespValue::ok());
        assert_eq!(
            run(&h, &["LSET", "l", "9", "X"]),
            RespValue::error("ERR index out of range")
        );
        assert_eq!(run(&h, &["LPOP", "l"]), RespValue::bulk_string("A"));
        assert_eq!(run(&h, &["RPOP", "l"]), RespValue::bulk_string("c"));
        assert_eq!(run(&h, &["LREM", "l", "0", "b"]), RespValue::integer(1));
        assert_eq!(run(&h, &["LPOP", "l"]), RespValue::null());
        assert_eq!(run(&h, &["LGET", "l"]), RespValue::array(vec![]));
    }

    #[test]
    fn test_hash_commands() {
        let h = handler();
        assert_eq!(run(&h, &["HSET", "u", "name", "Alice"]), RespValue::integer(1));
        assert_eq!(run(&h, &["HGET", "u", "name"]), RespValue::bulk_string("Alice"));
        assert_eq!(run(&h, &["HGET", "u", "age"]), RespValue::null());
        assert_eq!(run(&h, &["HEXISTS", "u", "name"]), RespValue::integer(1));
        assert_eq!(run(&h, &["HLEN", "u"]), RespValue::integer(1));

        assert_eq!(run(&h, &["HMSET", "u", "age", "22", "city", "Oslo"]), RespValue::ok());
        assert!(run(&h, &["HMSET", "u", "odd"]).is_error());
        assert_eq!(run(&h, &["HLEN", "u"]), RespValue::integer(3));

        match run(&h, &["HGETALL", "u"]) {
            RespValue::Array(items) => assert_eq!(items.len(), 6),
            other => panic!("unexpected reply {:?}", other),
        }

        assert_eq!(run(&h, &["HDEL", "u", "city"]), RespValue::integer(1));
        assert_eq!(run(&h, &["HDEL", "u", "city"]), RespValue::integer(0));
    }

    #[test]
    fn test_flushall() {
        let h = handler();
        run(&h, &["SET", "a", "1"]);
        run(&h, &["RPUSH", "l", "x"]);
        assert_eq!(run(&h, &["FLUSHALL"]), RespValue::ok());
        assert_eq!(run(&h, &["DBSIZE"]), RespValue::integer(0));
    }

    #[test]
    fn test_exists() {
        let h = handler();
        run(&h, &["SET", "a", "1"]);
        run(&h, &["SET", "b", "2"]);
        assert_eq!(run(&h, &["EXISTS", "a", "b", "c"]), RespValue::integer(2));
    }
}
