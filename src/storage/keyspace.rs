//! Typed Keyspace with TTL Support
//!
//! This module implements the shared keyspace: three typed stores
//! (strings, lists, hashes) plus a deadline map, all protected by a single
//! global mutex. Every operation acquires the lock for its whole duration,
//! which makes each command linearizable at the point of lock acquisition
//! and lets the snapshot code observe a point-in-time image.
//!
//! ## Type exclusivity
//!
//! A key lives in at most one typed store. Operations that target a key of
//! another type answer [`KeyspaceError::WrongType`] instead of migrating or
//! clobbering the existing value.
//!
//! ## Expiry
//!
//! Deadlines are wall-clock (`SystemTime`) so they stay meaningful across
//! snapshot/restore. Two purge mechanisms coexist:
//!
//! 1. **Lazy**: every operation that touches a key first checks its
//!    deadline and deletes the key if past due.
//! 2. **Rate-limited full sweep**: at most once per second, triggered by
//!    `keys()` and the background sweeper tick, the whole deadline map is
//!    walked and expired entries are dropped.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;

use crate::storage::snapshot::SnapshotImage;

/// Minimum gap between two full expiry sweeps.
const FULL_SWEEP_INTERVAL: Duration = Duration::from_millis(1000);

/// Errors a keyspace operation can answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyspaceError {
    /// The key exists in a different typed store.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// The stored value does not parse as a signed 64-bit decimal.
    #[error("value is not an integer or out of range")]
    NotAnInteger,

    /// The increment would leave the signed 64-bit range.
    #[error("increment or decrement would overflow")]
    Overflow,

    /// The operation requires the key to exist.
    #[error("no such key")]
    NoSuchKey,

    /// A list index is outside the list's bounds.
    #[error("index out of range")]
    IndexOutOfRange,
}

/// Result type for keyspace operations.
pub type KeyspaceResult<T> = Result<T, KeyspaceError>;

/// The type a key currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    String,
    List,
    Hash,
    None,
}

impl KeyType {
    /// The tag the TYPE command reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Hash => "hash",
            KeyType::None => "none",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    strings: HashMap<Bytes, Bytes>,
    lists: HashMap<Bytes, VecDeque<Bytes>>,
    hashes: HashMap<Bytes, HashMap<Bytes, Bytes>>,
    deadlines: HashMap<Bytes, SystemTime>,
    last_sweep: Option<Instant>,
}

impl Inner {
    /// Deletes the key from every store and drops its deadline.
    fn remove_everywhere(&mut self, key: &[u8]) -> bool {
        let mut removed = false;
        removed |= self.strings.remove(key).is_some();
        removed |= self.lists.remove(key).is_some();
        removed |= self.hashes.remove(key).is_some();
        self.deadlines.remove(key);
        removed
    }

    /// Lazy expiry: drops the key if its deadline has passed.
    fn purge_if_expired(&mut self, key: &[u8]) -> bool {
        let expired = self
            .deadlines
            .get(key)
            .is_some_and(|deadline| SystemTime::now() >= *deadline);
        if expired {
            self.remove_everywhere(key);
        }
        expired
    }

    /// Full sweep over the deadline map, dropping every expired key.
    fn sweep(&mut self) -> usize {
        let now = SystemTime::now();
        let expired: Vec<Bytes> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.strings.remove(key);
            self.lists.remove(key);
            self.hashes.remove(key);
            self.deadlines.remove(key);
        }

        self.last_sweep = Some(Instant::now());
        expired.len()
    }

    /// Rate-limited full sweep.
    fn maybe_sweep(&mut self) -> usize {
        let due = match self.last_sweep {
            Some(at) => at.elapsed() >= FULL_SWEEP_INTERVAL,
            None => true,
        };
        if due {
            self.sweep()
        } else {
            0
        }
    }

    fn type_of(&self, key: &[u8]) -> KeyType {
        if self.strings.contains_key(key) {
            KeyType::String
        } else if self.lists.contains_key(key) {
            KeyType::List
        } else if self.hashes.contains_key(key) {
            KeyType::Hash
        } else {
            KeyType::None
        }
    }

    fn exists(&self, key: &[u8]) -> bool {
        self.type_of(key) != KeyType::None
    }
}

/// The shared keyspace.
///
/// Designed to be wrapped in an `Arc` and shared across all connection
/// tasks plus the background sweeper and snapshot worker.
///
/// # Example
///
/// ```
/// use emberkv::storage::Keyspace;
/// use bytes::Bytes;
///
/// let ks = Keyspace::new();
/// ks.set(Bytes::from("name"), Bytes::from("Alice"), None).unwrap();
/// assert_eq!(ks.get(b"name").unwrap(), Some(Bytes::from("Alice")));
/// ```
#[derive(Debug, Default)]
pub struct Keyspace {
    inner: Mutex<Inner>,
}

impl Keyspace {
    /// Creates an empty keyspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a string value, optionally with a time-to-live.
    ///
    /// Any previous deadline on the key is cleared; when `ttl` is given the
    /// new deadline is installed in the same critical section.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> KeyspaceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(&key);

        if inner.lists.contains_key(&key) || inner.hashes.contains_key(&key) {
            return Err(KeyspaceError::WrongType);
        }

        inner.deadlines.remove(&key);
        if let Some(ttl) = ttl {
            inner.deadlines.insert(key.clone(), SystemTime::now() + ttl);
        }
        inner.strings.insert(key, value);
        Ok(())
    }

    /// Returns the string value of a key, or `None` if absent.
    pub fn get(&self, key: &[u8]) -> KeyspaceResult<Option<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if let Some(value) = inner.strings.get(key) {
            return Ok(Some(value.clone()));
        }
        if inner.lists.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(None)
    }

    /// Deletes a key from every store. Returns whether anything was removed.
    pub fn del(&self, key: &[u8]) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);
        inner.remove_everywhere(key)
    }

    /// Returns whether the key exists in any store.
    pub fn exists(&self, key: &[u8]) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);
        inner.exists(key)
    }

    /// Clears all stores and deadlines.
    pub fn flush_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.strings.clear();
        inner.lists.clear();
        inner.hashes.clear();
        inner.deadlines.clear();
    }

    /// Returns every key across all stores, optionally filtered by a glob
    /// pattern. Triggers the rate-limited full sweep first.
    pub fn keys(&self, pattern: Option<&[u8]>) -> Vec<Bytes> {
        let mut inner = self.inner.lock().unwrap();
        inner.maybe_sweep();

        let matcher = pattern.map(GlobPattern::new);
        let matches = |key: &Bytes| match &matcher {
            Some(m) => m.matches(key),
            None => true,
        };

        let mut result =
            Vec::with_capacity(inner.strings.len() + inner.lists.len() + inner.hashes.len());
        result.extend(inner.strings.keys().filter(|k| matches(k)).cloned());
        result.extend(inner.lists.keys().filter(|k| matches(k)).cloned());
        result.extend(inner.hashes.keys().filter(|k| matches(k)).cloned());
        result
    }

    /// Returns the type currently bound to the key.
    pub fn key_type(&self, key: &[u8]) -> KeyType {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);
        inner.type_of(key)
    }

    /// Number of live keys across all stores.
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.maybe_sweep();
        inner.strings.len() + inner.lists.len() + inner.hashes.len()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets a deadline `seconds` from now on an existing key.
    ///
    /// Non-positive seconds install a deadline that is already due, so the
    /// key dies on its next touch or sweep.
    pub fn expire(&self, key: &[u8], seconds: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if !inner.exists(key) {
            return false;
        }

        let now = SystemTime::now();
        let deadline = if seconds >= 0 {
            now + Duration::from_secs(seconds as u64)
        } else {
            now - Duration::from_secs(seconds.unsigned_abs())
        };
        inner.deadlines.insert(Bytes::copy_from_slice(key), deadline);
        true
    }

    /// Removes the deadline from a key. Returns whether one was removed.
    pub fn persist(&self, key: &[u8]) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);
        inner.exists(key) && inner.deadlines.remove(key).is_some()
    }

    /// Remaining time-to-live in seconds: -2 if the key is absent, -1 if it
    /// has no deadline, otherwise the remaining seconds rounded up.
    pub fn ttl(&self, key: &[u8]) -> i64 {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if !inner.exists(key) {
            return -2;
        }
        match inner.deadlines.get(key) {
            None => -1,
            Some(deadline) => match deadline.duration_since(SystemTime::now()) {
                Ok(remaining) => ((remaining.as_millis() + 999) / 1000) as i64,
                Err(_) => 0,
            },
        }
    }

    /// Moves a key's value and deadline to a new name, clobbering whatever
    /// the new name held. Returns whether the old key was found.
    pub fn rename(&self, old: &[u8], new: &[u8]) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(old);

        if !inner.exists(old) {
            return false;
        }

        inner.remove_everywhere(new);
        let new_key = Bytes::copy_from_slice(new);

        if let Some(value) = inner.strings.remove(old) {
            inner.strings.insert(new_key.clone(), value);
        } else if let Some(list) = inner.lists.remove(old) {
            inner.lists.insert(new_key.clone(), list);
        } else if let Some(hash) = inner.hashes.remove(old) {
            inner.hashes.insert(new_key.clone(), hash);
        }

        if let Some(deadline) = inner.deadlines.remove(old) {
            inner.deadlines.insert(new_key, deadline);
        }
        true
    }

    /// Parses the stored value as a trimmed decimal, adds `delta`, and
    /// re-stores the result as text. An absent key starts at 0. The
    /// deadline, if any, is preserved.
    pub fn incr_by(&self, key: &[u8], delta: i64) -> KeyspaceResult<i64> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.lists.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }

        let current = match inner.strings.get(key) {
            Some(value) => std::str::from_utf8(value)
                .map_err(|_| KeyspaceError::NotAnInteger)?
                .trim()
                .parse::<i64>()
                .map_err(|_| KeyspaceError::NotAnInteger)?,
            None => 0,
        };

        let next = current.checked_add(delta).ok_or(KeyspaceError::Overflow)?;
        inner
            .strings
            .insert(Bytes::copy_from_slice(key), Bytes::from(next.to_string()));
        Ok(next)
    }

    /// Increments the stored integer by one.
    pub fn incr(&self, key: &[u8]) -> KeyspaceResult<i64> {
        self.incr_by(key, 1)
    }

    // ------------------------------------------------------------------
    // List operations
    // ------------------------------------------------------------------

    /// Prepends values to a list, creating it if absent. Each value lands
    /// at the head in turn, so `LPUSH k a b` leaves the list as `[b, a]`.
    pub fn lpush(&self, key: Bytes, values: Vec<Bytes>) -> KeyspaceResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(&key);

        if inner.strings.contains_key(&key) || inner.hashes.contains_key(&key) {
            return Err(KeyspaceError::WrongType);
        }

        let list = inner.lists.entry(key).or_default();
        for value in values {
            list.push_front(value);
        }
        Ok(list.len())
    }

    /// Appends values to a list, creating it if absent.
    pub fn rpush(&self, key: Bytes, values: Vec<Bytes>) -> KeyspaceResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(&key);

        if inner.strings.contains_key(&key) || inner.hashes.contains_key(&key) {
            return Err(KeyspaceError::WrongType);
        }

        let list = inner.lists.entry(key).or_default();
        for value in values {
            list.push_back(value);
        }
        Ok(list.len())
    }

    /// Removes and returns the head element. The key is dropped once the
    /// list becomes empty.
    pub fn lpop(&self, key: &[u8]) -> KeyspaceResult<Option<Bytes>> {
        self.pop(key, true)
    }

    /// Removes and returns the tail element. The key is dropped once the
    /// list becomes empty.
    pub fn rpop(&self, key: &[u8]) -> KeyspaceResult<Option<Bytes>> {
        self.pop(key, false)
    }

    fn pop(&self, key: &[u8], front: bool) -> KeyspaceResult<Option<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }

        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(None);
        };
        let value = if front { list.pop_front() } else { list.pop_back() };
        if list.is_empty() {
            inner.lists.remove(key);
            inner.deadlines.remove(key);
        }
        Ok(value)
    }

    /// Length of a list; 0 for an absent key.
    pub fn llen(&self, key: &[u8]) -> KeyspaceResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner.lists.get(key).map(VecDeque::len).unwrap_or(0))
    }

    /// Element at `index`; negative indices count from the tail.
    pub fn lindex(&self, key: &[u8], index: i64) -> KeyspaceResult<Option<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }

        let Some(list) = inner.lists.get(key) else {
            return Ok(None);
        };
        Ok(resolve_index(index, list.len()).and_then(|i| list.get(i).cloned()))
    }

    /// Overwrites the element at `index`.
    pub fn lset(&self, key: &[u8], index: i64, value: Bytes) -> KeyspaceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }

        let Some(list) = inner.lists.get_mut(key) else {
            return Err(KeyspaceError::NoSuchKey);
        };
        let i = resolve_index(index, list.len()).ok_or(KeyspaceError::IndexOutOfRange)?;
        list[i] = value;
        Ok(())
    }

    /// Removes up to `|count|` elements equal to `value`: head-first when
    /// `count > 0`, tail-first when `count < 0`, all when `count == 0`.
    /// Returns the number removed; drops the key when the list empties.
    pub fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> KeyspaceResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }

        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(0);
        };

        let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
        let mut removed = 0;

        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }

        if list.is_empty() {
            inner.lists.remove(key);
            inner.deadlines.remove(key);
        }
        Ok(removed)
    }

    /// Snapshot of the full list; empty for an absent key.
    pub fn lget(&self, key: &[u8]) -> KeyspaceResult<Vec<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Inclusive range of list elements. Negative indices count from the
    /// tail; the resolved range is clamped to the list bounds and an
    /// inverted range yields an empty result.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> KeyspaceResult<Vec<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }

        let Some(list) = inner.lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = list.len() as i64;

        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };
        if start < 0 {
            start = 0;
        }
        if stop >= len {
            stop = len - 1;
        }
        if start > stop || start >= len {
            return Ok(Vec::new());
        }

        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------
    // Hash operations
    // ------------------------------------------------------------------

    /// Sets one field, creating the hash if absent.
    pub fn hset(&self, key: Bytes, field: Bytes, value: Bytes) -> KeyspaceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(&key);

        if inner.strings.contains_key(&key) || inner.lists.contains_key(&key) {
            return Err(KeyspaceError::WrongType);
        }
        inner.hashes.entry(key).or_default().insert(field, value);
        Ok(())
    }

    /// Returns a field's value, or `None` if the hash or field is absent.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> KeyspaceResult<Option<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.lists.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    /// Removes a field. The key is dropped once the hash becomes empty.
    pub fn hdel(&self, key: &[u8], field: &[u8]) -> KeyspaceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.lists.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }

        let Some(hash) = inner.hashes.get_mut(key) else {
            return Ok(false);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            inner.hashes.remove(key);
            inner.deadlines.remove(key);
        }
        Ok(removed)
    }

    /// Returns whether a field exists in the hash.
    pub fn hexists(&self, key: &[u8], field: &[u8]) -> KeyspaceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.lists.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner.hashes.get(key).map(|h| h.contains_key(field)).unwrap_or(false))
    }

    /// Snapshot of all field/value pairs.
    pub fn hgetall(&self, key: &[u8]) -> KeyspaceResult<Vec<(Bytes, Bytes)>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.lists.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    /// Snapshot of all field names.
    pub fn hkeys(&self, key: &[u8]) -> KeyspaceResult<Vec<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.lists.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner
            .hashes
            .get(key)
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default())
    }

    /// Snapshot of all field values.
    pub fn hvals(&self, key: &[u8]) -> KeyspaceResult<Vec<Bytes>> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.lists.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner
            .hashes
            .get(key)
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Number of fields in the hash; 0 for an absent key.
    pub fn hlen(&self, key: &[u8]) -> KeyspaceResult<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(key);

        if inner.strings.contains_key(key) || inner.lists.contains_key(key) {
            return Err(KeyspaceError::WrongType);
        }
        Ok(inner.hashes.get(key).map(HashMap::len).unwrap_or(0))
    }

    /// Sets several fields at once, creating the hash if absent.
    pub fn hmset(&self, key: Bytes, pairs: Vec<(Bytes, Bytes)>) -> KeyspaceResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.purge_if_expired(&key);

        if inner.strings.contains_key(&key) || inner.lists.contains_key(&key) {
            return Err(KeyspaceError::WrongType);
        }
        let hash = inner.hashes.entry(key).or_default();
        for (field, value) in pairs {
            hash.insert(field, value);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expiry and snapshot plumbing
    // ------------------------------------------------------------------

    /// Runs the rate-limited full sweep. Called by the background sweeper;
    /// returns the number of keys dropped.
    pub fn purge_expired(&self) -> usize {
        self.inner.lock().unwrap().maybe_sweep()
    }

    /// Clones the full keyspace image under the lock. Used by the snapshot
    /// writer so the on-disk file reflects a point-in-time state.
    pub fn export(&self) -> SnapshotImage {
        let inner = self.inner.lock().unwrap();
        SnapshotImage {
            strings: inner.strings.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            lists: inner
                .lists
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
            hashes: inner
                .hashes
                .iter()
                .map(|(k, h)| (k.clone(), h.iter().map(|(f, v)| (f.clone(), v.clone())).collect()))
                .collect(),
            deadlines: inner
                .deadlines
                .iter()
                .filter_map(|(k, deadline)| {
                    deadline
                        .duration_since(SystemTime::UNIX_EPOCH)
                        .ok()
                        .map(|d| (k.clone(), d.as_millis() as u64))
                })
                .collect(),
        }
    }

    /// Replaces all state with a restored image, then drops every key whose
    /// deadline already passed.
    pub fn import(&self, image: SnapshotImage) {
        let mut inner = self.inner.lock().unwrap();
        inner.strings = image.strings.into_iter().collect();
        inner.lists = image
            .lists
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect();
        inner.hashes = image
            .hashes
            .into_iter()
            .map(|(k, h)| (k, h.into_iter().collect()))
            .collect();
        inner.deadlines = image
            .deadlines
            .into_iter()
            .map(|(k, ms)| (k, SystemTime::UNIX_EPOCH + Duration::from_millis(ms)))
            .collect();
        inner.sweep();
    }
}

/// Resolves a possibly-negative index against a length.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        Some(resolved as usize)
    } else {
        None
    }
}

/// Glob matcher for the KEYS command: `*`, `?`, `[...]` classes, and
/// backslash escapes, applied to raw key bytes.
struct GlobPattern<'a> {
    pattern: &'a [u8],
}

impl<'a> GlobPattern<'a> {
    fn new(pattern: &'a [u8]) -> Self {
        Self { pattern }
    }

    fn matches(&self, key: &[u8]) -> bool {
        Self::matches_at(self.pattern, key)
    }

    fn matches_at(pattern: &[u8], text: &[u8]) -> bool {
        if pattern.is_empty() {
            return text.is_empty();
        }

        match pattern[0] {
            b'*' => {
                for i in 0..=text.len() {
                    if Self::matches_at(&pattern[1..], &text[i..]) {
                        return true;
                    }
                }
                false
            }
            b'?' => !text.is_empty() && Self::matches_at(&pattern[1..], &text[1..]),
            b'[' => {
                if text.is_empty() {
                    return false;
                }

                let mut i = 1;
                let negate = pattern.get(1) == Some(&b'^');
                if negate {
                    i += 1;
                }

                let mut matched = false;
                while i < pattern.len() && pattern[i] != b']' {
                    if pattern[i] == text[0] {
                        matched = true;
                    }
                    if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
                        if text[0] >= pattern[i] && text[0] <= pattern[i + 2] {
                            matched = true;
                        }
                        i += 2;
                    }
                    i += 1;
                }

                if negate {
                    matched = !matched;
                }
                if i < pattern.len() {
                    matched && Self::matches_at(&pattern[i + 1..], &text[1..])
                } else {
                    false
                }
            }
            b'\\' => {
                pattern.len() > 1
                    && !text.is_empty()
                    && pattern[1] == text[0]
                    && Self::matches_at(&pattern[2..], &text[1..])
            }
            c => !text.is_empty() && c == text[0] && Self::matches_at(&pattern[1..], &text[1..]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_set_and_get() {
        let ks = Keyspace::new();
        ks.set(b("key"), b("value"), None).unwrap();
        assert_eq!(ks.get(b"key").unwrap(), Some(b("value")));
        assert_eq!(ks.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_del_idempotent() {
        let ks = Keyspace::new();
        ks.set(b("key"), b("value"), None).unwrap();
        assert!(ks.del(b"key"));
        assert!(!ks.del(b"key"));
    }

    #[test]
    fn test_flush_all() {
        let ks = Keyspace::new();
        ks.set(b("s"), b("v"), None).unwrap();
        ks.rpush(b("l"), vec![b("a")]).unwrap();
        ks.hset(b("h"), b("f"), b("v")).unwrap();
        ks.flush_all();
        assert!(ks.is_empty());
    }

    #[test]
    fn test_type_exclusivity_strict() {
        let ks = Keyspace::new();
        ks.set(b("key"), b("value"), None).unwrap();

        assert_eq!(ks.lpush(b("key"), vec![b("x")]), Err(KeyspaceError::WrongType));
        assert_eq!(ks.hset(b("key"), b("f"), b("v")), Err(KeyspaceError::WrongType));
        assert_eq!(ks.key_type(b"key"), KeyType::String);

        ks.rpush(b("list"), vec![b("a")]).unwrap();
        assert_eq!(ks.set(b("list"), b("v"), None), Err(KeyspaceError::WrongType));
        assert_eq!(ks.get(b"list"), Err(KeyspaceError::WrongType));
        assert_eq!(ks.incr(b"list"), Err(KeyspaceError::WrongType));
    }

    #[test]
    fn test_key_type_tags() {
        let ks = Keyspace::new();
        assert_eq!(ks.key_type(b"nope"), KeyType::None);
        ks.set(b("s"), b("v"), None).unwrap();
        ks.rpush(b("l"), vec![b("a")]).unwrap();
        ks.hset(b("h"), b("f"), b("v")).unwrap();
        assert_eq!(ks.key_type(b"s").as_str(), "string");
        assert_eq!(ks.key_type(b"l").as_str(), "list");
        assert_eq!(ks.key_type(b"h").as_str(), "hash");
    }

    #[test]
    fn test_keys_union_and_pattern() {
        let ks = Keyspace::new();
        ks.set(b("hello"), b("1"), None).unwrap();
        ks.rpush(b("hallo"), vec![b("a")]).unwrap();
        ks.hset(b("world"), b("f"), b("v")).unwrap();

        let mut all = ks.keys(None);
        all.sort();
        assert_eq!(all, vec![b("hallo"), b("hello"), b("world")]);

        let mut pat = ks.keys(Some(b"h*llo"));
        pat.sort();
        assert_eq!(pat, vec![b("hallo"), b("hello")]);
    }

    #[test]
    fn test_expire_and_ttl() {
        let ks = Keyspace::new();
        assert!(!ks.expire(b"missing", 10));
        assert_eq!(ks.ttl(b"missing"), -2);

        ks.set(b("key"), b("value"), None).unwrap();
        assert_eq!(ks.ttl(b"key"), -1);

        assert!(ks.expire(b"key", 10));
        let ttl = ks.ttl(b"key");
        assert!((0..=10).contains(&ttl), "ttl was {}", ttl);
    }

    #[test]
    fn test_expiry_observed_on_read() {
        let ks = Keyspace::new();
        ks.set(b("t"), b("x"), Some(Duration::from_millis(30))).unwrap();
        assert_eq!(ks.get(b"t").unwrap(), Some(b("x")));

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(ks.get(b"t").unwrap(), None);
        assert_eq!(ks.ttl(b"t"), -2);
    }

    #[test]
    fn test_expired_key_reusable_under_other_type() {
        let ks = Keyspace::new();
        ks.set(b("k"), b("v"), Some(Duration::from_millis(20))).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        // Expiry purges lazily, so the list write must succeed.
        assert_eq!(ks.rpush(b("k"), vec![b("a")]).unwrap(), 1);
        assert_eq!(ks.key_type(b"k"), KeyType::List);
    }

    #[test]
    fn test_set_clears_deadline() {
        let ks = Keyspace::new();
        ks.set(b("key"), b("v1"), Some(Duration::from_secs(100))).unwrap();
        assert!(ks.ttl(b"key") > 0);
        ks.set(b("key"), b("v2"), None).unwrap();
        assert_eq!(ks.ttl(b"key"), -1);
    }

    #[test]
    fn test_rename_moves_value_and_deadline() {
        let ks = Keyspace::new();
        assert!(!ks.rename(b"missing", b"other"));

        ks.set(b("old"), b("value"), Some(Duration::from_secs(100))).unwrap();
        ks.set(b("new"), b("stale"), None).unwrap();

        assert!(ks.rename(b"old", b"new"));
        assert_eq!(ks.get(b"old").unwrap(), None);
        assert_eq!(ks.get(b"new").unwrap(), Some(b("value")));
        assert!(ks.ttl(b"new") > 0);
    }

    #[test]
    fn test_rename_list() {
        let ks = Keyspace::new();
        ks.rpush(b("old"), vec![b("a"), b("b")]).unwrap();
        assert!(ks.rename(b"old", b"new"));
        assert_eq!(ks.lget(b"new").unwrap(), vec![b("a"), b("b")]);
    }

    #[test]
    fn test_incr_semantics() {
        let ks = Keyspace::new();
        assert_eq!(ks.incr(b"counter"), Ok(1));
        assert_eq!(ks.incr(b"counter"), Ok(2));

        ks.set(b("n"), b(" 41 "), None).unwrap();
        assert_eq!(ks.incr(b"n"), Ok(42));

        ks.set(b("text"), b("hello"), None).unwrap();
        assert_eq!(ks.incr(b"text"), Err(KeyspaceError::NotAnInteger));

        ks.set(b("max"), Bytes::from(i64::MAX.to_string()), None).unwrap();
        assert_eq!(ks.incr(b"max"), Err(KeyspaceError::Overflow));
    }

    #[test]
    fn test_incr_preserves_deadline() {
        let ks = Keyspace::new();
        ks.set(b("c"), b("1"), Some(Duration::from_secs(100))).unwrap();
        assert_eq!(ks.incr(b"c"), Ok(2));
        assert!(ks.ttl(b"c") > 0);
    }

    #[test]
    fn test_push_pop_order() {
        let ks = Keyspace::new();
        assert_eq!(ks.lpush(b("l"), vec![b("a"), b("b")]).unwrap(), 2);
        // b was pushed last, so it is at the head.
        assert_eq!(ks.lget(b"l").unwrap(), vec![b("b"), b("a")]);

        assert_eq!(ks.rpush(b("l"), vec![b("c")]).unwrap(), 3);
        assert_eq!(ks.lpop(b"l").unwrap(), Some(b("b")));
        assert_eq!(ks.rpop(b"l").unwrap(), Some(b("c")));
        assert_eq!(ks.llen(b"l").unwrap(), 1);
    }

    #[test]
    fn test_pop_empties_list_drops_key() {
        let ks = Keyspace::new();
        ks.rpush(b("l"), vec![b("a")]).unwrap();
        ks.expire(b"l", 100);
        assert_eq!(ks.lpop(b"l").unwrap(), Some(b("a")));
        assert_eq!(ks.key_type(b"l"), KeyType::None);
        assert_eq!(ks.ttl(b"l"), -2);
        assert_eq!(ks.lpop(b"l").unwrap(), None);
    }

    #[test]
    fn test_lindex_symmetry() {
        let ks = Keyspace::new();
        ks.rpush(b("l"), vec![b("a"), b("b"), b("c")]).unwrap();

        let n = ks.llen(b"l").unwrap() as i64;
        for i in 0..n {
            assert_eq!(ks.lindex(b"l", i).unwrap(), ks.lindex(b"l", i - n).unwrap());
        }
        assert_eq!(ks.lindex(b"l", 3).unwrap(), None);
        assert_eq!(ks.lindex(b"l", -4).unwrap(), None);
    }

    #[test]
    fn test_lset() {
        let ks = Keyspace::new();
        assert_eq!(ks.lset(b"l", 0, b("x")), Err(KeyspaceError::NoSuchKey));

        ks.rpush(b("l"), vec![b("a"), b("b"), b("c")]).unwrap();
        ks.lset(b"l", 1, b("B")).unwrap();
        ks.lset(b"l", -1, b("C")).unwrap();
        assert_eq!(ks.lget(b"l").unwrap(), vec![b("a"), b("B"), b("C")]);
        assert_eq!(ks.lset(b"l", 5, b("x")), Err(KeyspaceError::IndexOutOfRange));
    }

    #[test]
    fn test_lrem_directions() {
        let ks = Keyspace::new();
        ks.rpush(b("l"), vec![b("a"), b("x"), b("a"), b("x"), b("a")]).unwrap();

        assert_eq!(ks.lrem(b"l", 2, b"a").unwrap(), 2);
        assert_eq!(ks.lget(b"l").unwrap(), vec![b("x"), b("x"), b("a")]);

        assert_eq!(ks.lrem(b"l", -1, b"x").unwrap(), 1);
        assert_eq!(ks.lget(b"l").unwrap(), vec![b("x"), b("a")]);

        assert_eq!(ks.lrem(b"l", 0, b"x").unwrap(), 1);
        assert_eq!(ks.lrem(b"l", 0, b"a").unwrap(), 1);
        assert_eq!(ks.key_type(b"l"), KeyType::None);
    }

    #[test]
    fn test_lrange_clamping() {
        let ks = Keyspace::new();
        ks.rpush(b("l"), vec![b("a"), b("b"), b("c"), b("d"), b("e")]).unwrap();

        assert_eq!(
            ks.lrange(b"l", 0, -1).unwrap(),
            vec![b("a"), b("b"), b("c"), b("d"), b("e")]
        );
        assert_eq!(ks.lrange(b"l", 1, 3).unwrap(), vec![b("b"), b("c"), b("d")]);
        assert_eq!(ks.lrange(b"l", -3, -1).unwrap(), vec![b("c"), b("d"), b("e")]);
        assert_eq!(ks.lrange(b"l", 0, 100).unwrap().len(), 5);
        assert!(ks.lrange(b"l", 3, 1).unwrap().is_empty());
        assert!(ks.lrange(b"missing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn test_hash_roundtrip() {
        let ks = Keyspace::new();
        ks.hset(b("u"), b("name"), b("Alice")).unwrap();
        ks.hset(b("u"), b("age"), b("22")).unwrap();

        assert_eq!(ks.hget(b"u", b"name").unwrap(), Some(b("Alice")));
        assert_eq!(ks.hget(b"u", b"email").unwrap(), None);
        assert!(ks.hexists(b"u", b"age").unwrap());
        assert!(!ks.hexists(b"u", b"email").unwrap());
        assert_eq!(ks.hlen(b"u").unwrap(), 2);

        let mut fields = ks.hkeys(b"u").unwrap();
        fields.sort();
        assert_eq!(fields, vec![b("age"), b("name")]);
        assert_eq!(ks.hvals(b"u").unwrap().len(), 2);

        let mut pairs = ks.hgetall(b"u").unwrap();
        pairs.sort();
        assert_eq!(pairs, vec![(b("age"), b("22")), (b("name"), b("Alice"))]);
    }

    #[test]
    fn test_hdel_empties_hash_drops_key() {
        let ks = Keyspace::new();
        ks.hset(b("h"), b("f"), b("v")).unwrap();
        assert!(ks.hdel(b"h", b"f").unwrap());
        assert_eq!(ks.key_type(b"h"), KeyType::None);
        assert!(!ks.hdel(b"h", b"f").unwrap());
    }

    #[test]
    fn test_hmset() {
        let ks = Keyspace::new();
        ks.hmset(b("h"), vec![(b("a"), b("1")), (b("b"), b("2"))]).unwrap();
        assert_eq!(ks.hlen(b"h").unwrap(), 2);
        ks.hmset(b("h"), vec![(b("a"), b("9"))]).unwrap();
        assert_eq!(ks.hget(b"h", b"a").unwrap(), Some(b("9")));
    }

    #[test]
    fn test_purge_expired_sweep() {
        let ks = Keyspace::new();
        ks.set(b("a"), b("1"), Some(Duration::from_millis(10))).unwrap();
        ks.rpush(b("b"), vec![b("x")]).unwrap();
        ks.expire(b"b", 0);
        ks.set(b("keep"), b("v"), None).unwrap();

        std::thread::sleep(Duration::from_millis(40));
        // First sweep after construction is always due.
        let dropped = ks.purge_expired();
        assert_eq!(dropped, 2);
        assert_eq!(ks.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let ks = Arc::new(Keyspace::new());
        let mut handles = vec![];

        for i in 0..8 {
            let ks = Arc::clone(&ks);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = Bytes::from(format!("key-{}-{}", i, j));
                    ks.set(key.clone(), Bytes::from("value"), None).unwrap();
                    ks.get(&key).unwrap();
                    ks.incr(format!("ctr-{}", i).as_bytes()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ks.len(), 800 + 8);
    }

    #[test]
    fn test_glob_pattern() {
        assert!(GlobPattern::new(b"h*llo").matches(b"hello"));
        assert!(GlobPattern::new(b"h*llo").matches(b"hllo"));
        assert!(!GlobPattern::new(b"h*llo").matches(b"world"));
        assert!(GlobPattern::new(b"h?llo").matches(b"hallo"));
        assert!(!GlobPattern::new(b"h?llo").matches(b"hllo"));
        assert!(GlobPattern::new(b"*").matches(b""));
        assert!(GlobPattern::new(b"*").matches(b"anything"));
        assert!(GlobPattern::new(b"h[ae]llo").matches(b"hello"));
        assert!(!GlobPattern::new(b"h[ae]llo").matches(b"hillo"));
        assert!(GlobPattern::new(b"h[a-z]llo").matches(b"hxllo"));
    }
}
