//! A simple, volatile, in-memory implementation of [`KVStore`], with switches to make reads or writes
//! fail.

use std::{
    collections::{BTreeMap, HashSet},
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use ocr_db::persistence::pluggables::{BackendError, KVGet, KVStore, WriteBatch};

type Hook = Box<dyn FnOnce() + Send>;

/// An in-memory implementation of [`KVStore`].
///
/// Clones share the same map, the same fault switches, and the same hook.
#[derive(Clone)]
pub(crate) struct MemDB {
    map: Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    before_conditional_write: Arc<Mutex<Option<Hook>>>,
}

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB {
            map: Arc::new(Mutex::new(BTreeMap::new())),
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            before_conditional_write: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `hook` once, at the start of the next `write_if_unchanged`, before its comparison. Used to
    /// interleave another writer between a read and a conditional write.
    pub(crate) fn before_next_conditional_write(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_conditional_write.lock().unwrap() = Some(Box::new(hook));
    }

    /// Make every subsequent read fail (or succeed again) without touching the map.
    pub(crate) fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst)
    }

    /// Make every subsequent write fail (or succeed again) without touching the map.
    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst)
    }

    /// Number of keys currently stored.
    pub(crate) fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }
}

impl KVStore for MemDB {
    type WriteBatch = MemWriteBatch;
    type Snapshot<'a> = MemDBSnapshot<'a>;

    fn write(&mut self, wb: Self::WriteBatch) -> Result<(), BackendError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_fault("write"));
        }

        apply(&mut self.map.lock().unwrap(), wb);
        Ok(())
    }

    fn write_if_unchanged(
        &mut self,
        expected: &[(Vec<u8>, Option<Vec<u8>>)],
        wb: Self::WriteBatch,
    ) -> Result<bool, BackendError> {
        let hook = self.before_conditional_write.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_fault("write"));
        }

        let mut map = self.map.lock().unwrap();
        let unchanged = expected
            .iter()
            .all(|(key, value)| map.get(key) == value.as_ref());
        if unchanged {
            apply(&mut map, wb);
        }
        Ok(unchanged)
    }

    fn snapshot<'b>(&'b self) -> MemDBSnapshot<'b> {
        MemDBSnapshot {
            map: self.map.lock().unwrap(),
            fail_reads: self.fail_reads.load(Ordering::SeqCst),
        }
    }
}

impl KVGet for MemDB {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        self.snapshot().get(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BackendError> {
        self.snapshot().scan_prefix(prefix)
    }
}

// A simple implementation of [`WriteBatch`].
pub(crate) struct MemWriteBatch {
    insertions: BTreeMap<Vec<u8>, Vec<u8>>,
    deletions: HashSet<Vec<u8>>,
}

impl WriteBatch for MemWriteBatch {
    fn new() -> Self {
        MemWriteBatch {
            insertions: BTreeMap::new(),
            deletions: HashSet::new(),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        let _ = self.deletions.remove(key);
        self.insertions.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        let _ = self.insertions.remove(key);
        self.deletions.insert(key.to_vec());
    }
}

/// A simple implementation of [`KVGet`] used as `KVStore::Snapshot` for `MemDB`.
pub(crate) struct MemDBSnapshot<'a> {
    map: MutexGuard<'a, BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_reads: bool,
}

impl KVGet for MemDBSnapshot<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BackendError> {
        if self.fail_reads {
            return Err(injected_fault("read"));
        }
        Ok(self.map.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, BackendError> {
        if self.fail_reads {
            return Err(injected_fault("read"));
        }
        Ok(self
            .map
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

fn apply(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, wb: MemWriteBatch) {
    for (key, value) in wb.insertions {
        map.insert(key, value);
    }
    for key in wb.deletions {
        map.remove(&key);
    }
}

fn injected_fault(operation: &str) -> BackendError {
    Box::new(io::Error::new(
        io::ErrorKind::Other,
        format!("injected {} fault", operation),
    ))
}
