//! Extendible hash table.
//!
//! A thread-safe map that grows by doubling a bucket directory rather than
//! rehashing every key. Each bucket agrees with its keys on the low
//! `local_depth` bits of the hash; the directory indexes on the low
//! `global_depth` bits. When a bucket overflows it is split on one more
//! bit, doubling the directory first if the bucket already uses all
//! directed bits.
//!
//! The whole structure sits behind a single mutex. The table is off the
//! page-I/O critical path (the buffer pool serializes around its own
//! latch), so a coarse lock keeps the split/expand transitions trivially
//! atomic.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::mem;

use parking_lot::Mutex;

/// Width of the hash values produced by the injected hasher.
const HASH_BITS: usize = u64::BITS as usize;

/// A bucket holds up to `bucket_size` entries in insertion order.
///
/// Invariant: every key `k` in the bucket satisfies
/// `hash(k) & ((1 << local_depth) - 1) == self_hash`.
struct Bucket<K, V> {
    local_depth: usize,
    self_hash: u64,
    items: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    fn new(local_depth: usize, self_hash: u64) -> Self {
        Self {
            local_depth,
            self_hash,
            items: Vec::new(),
        }
    }
}

/// Directory state guarded by the table latch.
///
/// Buckets live in an arena; directory slots store arena indices so that a
/// single bucket can be shared by many slots. A split reuses the split
/// bucket's arena slot for the low half and appends the high half, so the
/// arena never accumulates dead buckets and `buckets.len()` is the live
/// bucket count.
struct Directory<K, V> {
    global_depth: usize,
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

impl<K, V> Directory<K, V> {
    fn index_of(&self, hash: u64) -> usize {
        (hash & low_bits_mask(self.global_depth)) as usize
    }
}

/// Returns a mask selecting the low `depth` bits.
fn low_bits_mask(depth: usize) -> u64 {
    if depth >= HASH_BITS {
        u64::MAX
    } else {
        (1u64 << depth) - 1
    }
}

/// A concurrent map with extendible hashing.
///
/// Supports point lookup, upsert, and removal; no iteration and no
/// ordering guarantees across keys. The hash function is injected through
/// the `S: BuildHasher` parameter so tests can pin a deterministic layout.
///
/// # Example
///
/// ```rust
/// use granite_storage::container::ExtendibleHashTable;
///
/// let table: ExtendibleHashTable<u64, String> = ExtendibleHashTable::new(4);
/// table.insert(1, "one".to_string());
/// assert_eq!(table.find(&1), Some("one".to_string()));
/// assert!(table.remove(&1));
/// assert_eq!(table.find(&1), None);
/// ```
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hasher: S,
    inner: Mutex<Directory<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Creates a table whose buckets hold up to `bucket_size` entries.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    /// Creates a table with an explicit hasher.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket_size must be > 0");
        Self {
            bucket_size,
            hasher,
            inner: Mutex::new(Directory {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0, 0)],
            }),
        }
    }

    fn hash_of(&self, key: &K) -> u64 {
        let mut state = self.hasher.build_hasher();
        key.hash(&mut state);
        state.finish()
    }

    /// Looks up the value mapped to `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash_of(key);
        let inner = self.inner.lock();
        let slot = inner.dir[inner.index_of(hash)];
        inner.buckets[slot]
            .items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Removes `key` from the table. Returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash_of(key);
        let mut inner = self.inner.lock();
        let slot = inner.dir[inner.index_of(hash)];
        let items = &mut inner.buckets[slot].items;
        match items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Inserts `key -> value`, overwriting any previous mapping.
    ///
    /// A full bucket is split on one more hash bit; if the bucket already
    /// uses every directory bit the directory doubles first. Both cases
    /// retry the insert, so a single call may reshape the table several
    /// times before the entry lands.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_of(&key);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        loop {
            let slot = inner.dir[inner.index_of(hash)];
            let bucket = &mut inner.buckets[slot];

            if let Some(entry) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                entry.1 = value;
                return;
            }
            if bucket.items.len() < self.bucket_size {
                bucket.items.push((key, value));
                return;
            }

            if bucket.local_depth == inner.global_depth {
                Self::expand_directory(inner);
            } else {
                self.split_bucket(inner, slot);
            }
        }
    }

    /// Doubles the directory: `new_dir[i] = dir[i & old_mask]`.
    fn expand_directory(inner: &mut Directory<K, V>) {
        // A split is only blocked at global depth when every hash bit is
        // already in use, which would require 2^64 directory slots.
        assert!(
            inner.global_depth < HASH_BITS,
            "directory cannot expand past the hash width"
        );
        let old_mask = low_bits_mask(inner.global_depth) as usize;
        let new_dir = (0..inner.dir.len() * 2)
            .map(|i| inner.dir[i & old_mask])
            .collect();
        inner.dir = new_dir;
        inner.global_depth += 1;
    }

    /// Splits the bucket in arena slot `slot` on one more hash bit.
    ///
    /// The low half keeps the arena slot (same `self_hash`, depth + 1);
    /// the high half is appended. Every directory index of the form
    /// `(j << d) | self_hash` is repointed by the parity of `j`, then the
    /// old entries are redistributed through their fresh directory index.
    fn split_bucket(&self, inner: &mut Directory<K, V>, slot: usize) {
        let depth = inner.buckets[slot].local_depth;
        let self_hash = inner.buckets[slot].self_hash;
        debug_assert!(depth < inner.global_depth);

        let items = mem::take(&mut inner.buckets[slot].items);
        inner.buckets[slot].local_depth = depth + 1;

        let high_slot = inner.buckets.len();
        inner
            .buckets
            .push(Bucket::new(depth + 1, (1u64 << depth) | self_hash));

        for j in 0..(1usize << (inner.global_depth - depth)) {
            let idx = (j << depth) | self_hash as usize;
            inner.dir[idx] = if j & 1 == 0 { slot } else { high_slot };
        }

        // Guaranteed to fit: the key space was partitioned on one more bit.
        for (key, value) in items {
            let idx = inner.index_of(self.hash_of(&key));
            let target = inner.dir[idx];
            let bucket = &mut inner.buckets[target];
            bucket.items.push((key, value));
            debug_assert!(bucket.items.len() <= self.bucket_size);
        }
    }

    /// Returns the number of low hash bits used to index the directory.
    pub fn global_depth(&self) -> usize {
        self.inner.lock().global_depth
    }

    /// Returns the local depth of the bucket referenced by directory slot
    /// `dir_index`, or `None` if the slot is out of range.
    pub fn local_depth(&self, dir_index: usize) -> Option<usize> {
        let inner = self.inner.lock();
        inner
            .dir
            .get(dir_index)
            .map(|&slot| inner.buckets[slot].local_depth)
    }

    /// Returns the number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().buckets.len()
    }
}

impl<K, V, S> std::fmt::Debug for ExtendibleHashTable<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ExtendibleHashTable")
            .field("bucket_size", &self.bucket_size)
            .field("global_depth", &inner.global_depth)
            .field("dir_len", &inner.dir.len())
            .field("num_buckets", &inner.buckets.len())
            .finish()
    }
}
