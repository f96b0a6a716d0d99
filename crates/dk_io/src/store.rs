//! Room stores: whole-document get/set with a TTL, plus compare-and-set on a
//! version stamp for callers that want to close the lost-update window.
//!
//! A missing or expired room reads as `None`; that is a not-found condition,
//! never an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dk_core::{RoomId, RoomState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::canonical_json::{to_canonical_bytes, write_canonical_file};
use crate::clock::{Clock, SystemClock};
use crate::hasher::{sha256_hex, version_stamp};
use crate::{IoError, IoResult};

/// A room as read back, with the stamp to hand to `compare_and_set`.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRoom {
    pub room: RoomState,
    pub version: String,
}

pub trait RoomStore: Send + Sync {
    fn get(&self, id: &RoomId) -> IoResult<Option<StoredRoom>>;

    /// Unconditional write; returns the new version stamp.
    fn set(&self, room: &RoomState, ttl: Duration) -> IoResult<String>;

    /// Write only if the live document still carries `expected`.
    /// `Ok(None)` on mismatch or when the room is gone.
    fn compare_and_set(
        &self,
        room: &RoomState,
        expected: &str,
        ttl: Duration,
    ) -> IoResult<Option<String>>;
}

impl<S: RoomStore + ?Sized> RoomStore for Arc<S> {
    fn get(&self, id: &RoomId) -> IoResult<Option<StoredRoom>> {
        (**self).get(id)
    }

    fn set(&self, room: &RoomState, ttl: Duration) -> IoResult<String> {
        (**self).set(room, ttl)
    }

    fn compare_and_set(
        &self,
        room: &RoomState,
        expected: &str,
        ttl: Duration,
    ) -> IoResult<Option<String>> {
        (**self).compare_and_set(room, expected, ttl)
    }
}

fn encode(room: &RoomState) -> IoResult<(Vec<u8>, String)> {
    let bytes = to_canonical_bytes(room)?;
    let version = sha256_hex(&bytes);
    Ok((bytes, version))
}

fn expiry(now_ms: u64, ttl: Duration) -> u64 {
    now_ms.saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> IoError {
    IoError::Store("store lock poisoned".into())
}

/* ------------------------------- In-memory store ------------------------------- */

struct Slot {
    bytes: Vec<u8>,
    version: String,
    expires_at_ms: u64,
}

/// Process-local store keyed by `room:{id}`; documents are kept as canonical bytes.
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> IoResult<MutexGuard<'_, HashMap<String, Slot>>> {
        self.slots.lock().map_err(poisoned)
    }

    /// Live (unexpired) slot for `key`, evicting it if expired.
    fn live<'m>(slots: &'m mut HashMap<String, Slot>, key: &str, now: u64) -> Option<&'m Slot> {
        if slots.get(key).is_some_and(|s| s.expires_at_ms <= now) {
            slots.remove(key);
            debug!(key, "room expired");
            return None;
        }
        slots.get(key)
    }

    fn insert(&self, slots: &mut HashMap<String, Slot>, room: &RoomState, ttl: Duration) -> IoResult<String> {
        let (bytes, version) = encode(room)?;
        slots.insert(
            room.id.store_key(),
            Slot {
                bytes,
                version: version.clone(),
                expires_at_ms: expiry(self.clock.now_ms(), ttl),
            },
        );
        Ok(version)
    }
}

impl RoomStore for MemoryStore {
    fn get(&self, id: &RoomId) -> IoResult<Option<StoredRoom>> {
        let mut slots = self.lock()?;
        let Some(slot) = Self::live(&mut slots, &id.store_key(), self.clock.now_ms()) else {
            debug!(room = %id, "room miss");
            return Ok(None);
        };
        let room: RoomState = serde_json::from_slice(&slot.bytes)?;
        Ok(Some(StoredRoom {
            room,
            version: slot.version.clone(),
        }))
    }

    fn set(&self, room: &RoomState, ttl: Duration) -> IoResult<String> {
        let mut slots = self.lock()?;
        let version = self.insert(&mut slots, room, ttl)?;
        debug!(room = %room.id, %version, "room stored");
        Ok(version)
    }

    fn compare_and_set(
        &self,
        room: &RoomState,
        expected: &str,
        ttl: Duration,
    ) -> IoResult<Option<String>> {
        let mut slots = self.lock()?;
        let now = self.clock.now_ms();
        let current = Self::live(&mut slots, &room.id.store_key(), now).map(|s| s.version.clone());
        if current.as_deref() != Some(expected) {
            debug!(room = %room.id, expected, "version mismatch");
            return Ok(None);
        }
        self.insert(&mut slots, room, ttl).map(Some)
    }
}

/* --------------------------------- File store ---------------------------------- */

#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at_ms: u64,
    room: Value,
}

/// One canonical JSON file per room under `dir`. Compare-and-set is serialized
/// within this process only.
pub struct FileStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
            guard: Mutex::new(()),
        }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &RoomId) -> PathBuf {
        self.dir.join(format!("room-{id}.json"))
    }

    fn read(&self, id: &RoomId) -> IoResult<Option<StoredRoom>> {
        let path = self.path_for(id);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(room = %id, "room miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let env: Envelope = serde_json::from_slice(&raw)?;
        if env.expires_at_ms <= self.clock.now_ms() {
            debug!(room = %id, "room expired");
            let _ = std::fs::remove_file(&path);
            return Ok(None);
        }
        let room: RoomState = serde_json::from_value(env.room)?;
        let version = version_stamp(&room)?;
        Ok(Some(StoredRoom { room, version }))
    }

    fn write(&self, room: &RoomState, ttl: Duration) -> IoResult<String> {
        let version = version_stamp(room)?;
        let env = Envelope {
            expires_at_ms: expiry(self.clock.now_ms(), ttl),
            room: serde_json::to_value(room)?,
        };
        write_canonical_file(&self.path_for(&room.id), &serde_json::to_value(&env)?)?;
        debug!(room = %room.id, %version, "room stored");
        Ok(version)
    }
}

impl RoomStore for FileStore {
    fn get(&self, id: &RoomId) -> IoResult<Option<StoredRoom>> {
        let _g = self.guard.lock().map_err(poisoned)?;
        self.read(id)
    }

    fn set(&self, room: &RoomState, ttl: Duration) -> IoResult<String> {
        let _g = self.guard.lock().map_err(poisoned)?;
        self.write(room, ttl)
    }

    fn compare_and_set(
        &self,
        room: &RoomState,
        expected: &str,
        ttl: Duration,
    ) -> IoResult<Option<String>> {
        let _g = self.guard.lock().map_err(poisoned)?;
        match self.read(&room.id)? {
            Some(current) if current.version == expected => self.write(room, ttl).map(Some),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use dk_core::RoomConditions;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn room(id: &str) -> RoomState {
        RoomState::new(
            id.parse().unwrap(),
            RoomConditions {
                area: "shibuya".into(),
                ..RoomConditions::default()
            },
            0,
        )
    }

    #[test]
    fn memory_round_trip_and_expiry() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemoryStore::with_clock(clock.clone());
        let r = room("r1");
        let v = store.set(&r, DAY).unwrap();
        let got = store.get(&r.id).unwrap().unwrap();
        assert_eq!(got.room, r);
        assert_eq!(got.version, v);

        clock.advance_ms(DAY.as_millis() as u64);
        assert!(store.get(&r.id).unwrap().is_none());
    }

    #[test]
    fn memory_compare_and_set_detects_interleaving() {
        let store = MemoryStore::new();
        let r = room("r2");
        let v0 = store.set(&r, DAY).unwrap();

        let mut first = r.clone();
        first.participants.push("alice".parse().unwrap());
        let v1 = store.compare_and_set(&first, &v0, DAY).unwrap();
        assert!(v1.is_some());

        let mut stale = r.clone();
        stale.participants.push("bob".parse().unwrap());
        assert_eq!(store.compare_and_set(&stale, &v0, DAY).unwrap(), None);
        assert_eq!(store.get(&r.id).unwrap().unwrap().room, first);
    }

    #[test]
    fn missing_room_is_none() {
        let store = MemoryStore::new();
        assert!(store.get(&"nope".parse().unwrap()).unwrap().is_none());
        assert_eq!(store.compare_and_set(&room("nope"), "x", DAY).unwrap(), None);
    }

    #[test]
    fn file_store_versions_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(5));
        let store = FileStore::with_clock(dir.path(), clock.clone());
        let r = room("r3");
        let v = store.set(&r, DAY).unwrap();

        let reopened = FileStore::with_clock(dir.path(), clock.clone());
        let got = reopened.get(&r.id).unwrap().unwrap();
        assert_eq!(got.version, v);
        assert_eq!(got.room, r);

        clock.advance_ms(DAY.as_millis() as u64 + 1);
        assert!(reopened.get(&r.id).unwrap().is_none());
        assert!(!dir.path().join("room-r3.json").exists());
    }
}
