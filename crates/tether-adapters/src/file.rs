#![forbid(unsafe_code)]

//! JSON file storage.
//!
//! A [`FileStorage`] keeps one JSON object on disk, one member per storage
//! key. Values are encoded with `serde_json` when written and decoded when
//! read, so a single file can hold values of several types.
//!
//! # Write modes
//!
//! | Mode | Behavior |
//! |------|----------|
//! | [`WriteMode::Immediate`] | every `set`/`remove` rewrites the file |
//! | [`WriteMode::Buffered`] | changes stay in memory until [`FileStorage::flush`] or a handle is disposed |
//!
//! # Failure Modes
//!
//! | Failure | Surfaced as |
//! |---------|-------------|
//! | file missing on open | empty storage |
//! | file is not a JSON object | `StorageError::Codec` from [`FileStorage::open`] |
//! | member does not decode as `T` | `StorageError::Codec` from `get`, or through `Updater::fail` on reload |
//! | write fails | `StorageError::Io` from `set`/`remove` |
//!
//! Storages opened on the same path share a key area, so bindings made
//! through either stay synchronized.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;
use tether_core::{KeyArea, Pending, Raw, StorageAdapter, StorageError, StorageHandle, Updater, Value};

/// When changes reach the disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Immediate,
    Buffered,
}

type Entries = BTreeMap<String, Json>;

struct Watcher {
    id: u64,
    key: String,
    notify: Rc<dyn Fn(Option<&Json>)>,
}

struct FileInner {
    path: PathBuf,
    area: KeyArea,
    mode: WriteMode,
    entries: RefCell<Entries>,
    dirty: Cell<bool>,
    watchers: RefCell<Vec<Watcher>>,
    next_watcher: Cell<u64>,
}

/// A JSON document on disk.
///
/// Cloning yields another handle to the same in-memory state.
#[derive(Clone)]
pub struct FileStorage {
    inner: Rc<FileInner>,
}

impl FileStorage {
    /// Open `path`, loading its contents if the file exists.
    pub fn open(path: impl AsRef<Path>, mode: WriteMode) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path)?;
        tracing::debug!(path = %path.display(), keys = entries.len(), ?mode, "file storage opened");
        Ok(Self {
            inner: Rc::new(FileInner {
                area: KeyArea::named(format!("file:{}", path.display())),
                path,
                mode,
                entries: RefCell::new(entries),
                dirty: Cell::new(false),
                watchers: RefCell::new(Vec::new()),
                next_watcher: Cell::new(0),
            }),
        })
    }

    /// A typed adapter over this file.
    #[must_use]
    pub fn adapter<T>(&self) -> FileAdapter<T> {
        FileAdapter {
            storage: self.clone(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    #[must_use]
    pub fn mode(&self) -> WriteMode {
        self.inner.mode
    }

    #[must_use]
    pub fn key_area(&self) -> &KeyArea {
        &self.inner.area
    }

    /// Whether buffered changes are waiting for [`flush`](Self::flush).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Stored keys, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    /// Decode the stored member for `key`.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        self.inner
            .entries
            .borrow()
            .get(key)
            .map(|json| serde_json::from_value(json.clone()).map_err(StorageError::from))
            .transpose()
    }

    /// Write pending changes to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        if !self.inner.dirty.get() {
            return Ok(());
        }
        self.write_entries(&self.inner.entries.borrow())?;
        self.inner.dirty.set(false);
        Ok(())
    }

    /// Re-read the file and push every changed key to its open handles.
    ///
    /// Returns the number of keys that changed.
    pub fn reload(&self) -> Result<usize, StorageError> {
        let fresh = read_entries(&self.inner.path)?;
        let previous = self.inner.entries.replace(fresh.clone());
        self.inner.dirty.set(false);

        let changed: Vec<String> = previous
            .keys()
            .chain(fresh.keys())
            .filter(|key| previous.get(*key) != fresh.get(*key))
            .cloned()
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        tracing::debug!(path = %self.inner.path.display(), changed = changed.len(), "file storage reloaded");

        for key in &changed {
            let watchers: Vec<_> = self
                .inner
                .watchers
                .borrow()
                .iter()
                .filter(|w| &w.key == key)
                .map(|w| Rc::clone(&w.notify))
                .collect();
            for notify in watchers {
                notify(fresh.get(key));
            }
        }
        Ok(changed.len())
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), StorageError> {
        let document = serde_json::to_vec_pretty(entries)?;
        let tmp = self.inner.path.with_extension("json.tmp");
        fs::write(&tmp, document)?;
        fs::rename(&tmp, &self.inner.path)?;
        tracing::trace!(path = %self.inner.path.display(), "file storage written");
        Ok(())
    }

    /// Apply `edit` to a copy of the entries and keep it only once it is
    /// written (immediate mode) or queued (buffered mode).
    fn commit(&self, edit: impl FnOnce(&mut Entries)) -> Result<(), StorageError> {
        let mut candidate = self.inner.entries.borrow().clone();
        edit(&mut candidate);
        match self.inner.mode {
            WriteMode::Immediate => {
                self.write_entries(&candidate)?;
                self.inner.dirty.set(false);
            }
            WriteMode::Buffered => self.inner.dirty.set(true),
        }
        self.inner.entries.replace(candidate);
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<Entries, StorageError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Entries::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Entries::new()),
        Err(err) => Err(err.into()),
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.inner.path)
            .field("mode", &self.inner.mode)
            .field("keys", &self.inner.entries.borrow().len())
            .field("dirty", &self.inner.dirty.get())
            .finish()
    }
}

/// Adapter storing values of type `T` in a [`FileStorage`].
pub struct FileAdapter<T> {
    storage: FileStorage,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for FileAdapter<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for FileAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileAdapter").field(&self.storage).finish()
    }
}

struct FileHandle<T> {
    key: String,
    watcher: u64,
    storage: FileStorage,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> StorageHandle<T, C> for FileHandle<T>
where
    T: Value + Serialize + DeserializeOwned,
{
    fn get(&self, raw: Option<Raw<T>>, _ctx: Option<&C>) -> Pending<Option<T>> {
        match raw {
            Some(raw) => Pending::ok(raw.into_option()),
            None => self.storage.read(&self.key).into(),
        }
    }

    fn set(&self, value: &T, _ctx: Option<&C>) -> Pending<()> {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => return Pending::err(err.into()),
        };
        self.storage
            .commit(|entries| {
                entries.insert(self.key.clone(), json);
            })
            .into()
    }

    fn remove(&self, _ctx: Option<&C>) -> Option<Pending<()>> {
        if !self.storage.inner.entries.borrow().contains_key(&self.key) {
            return Some(Pending::ok(()));
        }
        Some(
            self.storage
                .commit(|entries| {
                    entries.remove(&self.key);
                })
                .into(),
        )
    }

    fn dispose(&self) {
        self.storage
            .inner
            .watchers
            .borrow_mut()
            .retain(|w| w.id != self.watcher);
        if let Err(err) = self.storage.flush() {
            tracing::warn!(path = %self.storage.path().display(), error = %err, "flush on dispose failed");
        }
    }
}

impl<T, C> StorageAdapter<T, C> for FileAdapter<T>
where
    T: Value + Serialize + DeserializeOwned,
    C: 'static,
{
    fn open(&self, key: &str, updater: Updater<T>) -> Box<dyn StorageHandle<T, C>> {
        let inner = &self.storage.inner;
        let id = inner.next_watcher.get();
        inner.next_watcher.set(id + 1);
        let notify = move |json: Option<&Json>| {
            match json.map(|json| serde_json::from_value::<T>(json.clone())) {
                None => updater.push(Raw::Cleared),
                Some(Ok(value)) => updater.push(Raw::Value(value)),
                Some(Err(err)) => updater.fail(err.into()),
            };
        };
        inner.watchers.borrow_mut().push(Watcher {
            id,
            key: key.to_owned(),
            notify: Rc::new(notify),
        });
        Box::new(FileHandle {
            key: key.to_owned(),
            watcher: id,
            storage: self.storage.clone(),
            _marker: PhantomData,
        })
    }

    fn key_area(&self) -> KeyArea {
        self.storage.inner.area.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(storage: &FileStorage, key: &str) -> Box<dyn StorageHandle<i32>> {
        StorageAdapter::<i32, ()>::open(&storage.adapter::<i32>(), key, Updater::detached())
    }

    fn ready<R: fmt::Debug + 'static>(pending: Pending<R>) -> Result<R, StorageError> {
        pending.into_ready().expect("file storage is synchronous")
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().expect("temp dir");
        let storage = FileStorage::open(dir.path().join("state.json"), WriteMode::Immediate)
            .expect("open");
        assert!(storage.keys().is_empty());
        assert_eq!(ready(open(&storage, "k").get(None, None)).ok(), Some(None));
    }

    #[test]
    fn immediate_writes_reach_disk() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        let storage = FileStorage::open(&path, WriteMode::Immediate).expect("open");
        let handle = open(&storage, "volume");
        ready(handle.set(&7, None)).expect("write");

        let reopened = FileStorage::open(&path, WriteMode::Immediate).expect("reopen");
        assert_eq!(reopened.read::<i32>("volume").expect("decode"), Some(7));
        assert!(!storage.is_dirty());

        ready(handle.remove(None).expect("remove supported")).expect("remove");
        let reopened = FileStorage::open(&path, WriteMode::Immediate).expect("reopen");
        assert!(reopened.keys().is_empty());
    }

    #[test]
    fn failed_write_leaves_entries_unchanged() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"k": 1}"#).expect("seed");
        let storage = FileStorage::open(&path, WriteMode::Immediate).expect("open");
        fs::remove_file(&path).expect("unlink");
        fs::create_dir(dir.path().join("state.json.tmp")).expect("block temp file");

        let handle = open(&storage, "k");
        assert!(matches!(ready(handle.set(&7, None)), Err(StorageError::Io(_))));
        assert_eq!(storage.read::<i32>("k").expect("decode"), Some(1));
        assert!(matches!(
            ready(handle.remove(None).expect("remove supported")),
            Err(StorageError::Io(_))
        ));
        assert_eq!(ready(handle.get(None, None)).ok(), Some(Some(1)));
        assert!(!storage.is_dirty());
    }

    #[test]
    fn missing_directory_rejects_immediate_write() {
        let dir = TempDir::new().expect("temp dir");
        let storage = FileStorage::open(dir.path().join("missing").join("state.json"), WriteMode::Immediate)
            .expect("open");
        let handle = open(&storage, "k");
        assert!(ready(handle.set(&7, None)).is_err());
        assert_eq!(storage.read::<i32>("k").expect("decode"), None);
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn buffered_writes_wait_for_dispose() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        let storage = FileStorage::open(&path, WriteMode::Buffered).expect("open");
        let handle = open(&storage, "k");
        ready(handle.set(&1, None)).expect("write");
        assert!(storage.is_dirty());
        assert!(!path.exists());

        handle.dispose();
        assert!(!storage.is_dirty());
        let reopened = FileStorage::open(&path, WriteMode::Buffered).expect("reopen");
        assert_eq!(reopened.read::<i32>("k").expect("decode"), Some(1));
    }

    #[test]
    fn undecodable_member_is_a_codec_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"k": "not a number"}"#).expect("seed");
        let storage = FileStorage::open(&path, WriteMode::Immediate).expect("open");
        let err = ready(open(&storage, "k").get(None, None)).unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));
    }

    #[test]
    fn malformed_document_fails_to_open() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2").expect("seed");
        let err = FileStorage::open(&path, WriteMode::Immediate).unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));
    }

    #[test]
    fn reload_reports_changed_keys() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"a": 1, "b": 2}"#).expect("seed");
        let storage = FileStorage::open(&path, WriteMode::Immediate).expect("open");
        fs::write(&path, r#"{"a": 1, "b": 3, "c": 4}"#).expect("rewrite");
        assert_eq!(storage.reload().expect("reload"), 2);
        assert_eq!(storage.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn same_path_shares_area() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("state.json");
        let one = FileStorage::open(&path, WriteMode::Immediate).expect("open");
        let two = FileStorage::open(&path, WriteMode::Buffered).expect("open");
        assert_eq!(one.key_area(), two.key_area());
        let other = FileStorage::open(dir.path().join("other.json"), WriteMode::Immediate)
            .expect("open");
        assert_ne!(one.key_area(), other.key_area());
    }
}
