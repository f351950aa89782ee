//! The double-array trie engine.
//!
//! One `DatTrie` owns two parallel arrays (`base`/`check` packed into
//! `NodeRec`), the per-node sibling metadata, and the block allocator that
//! recycles node ids. The implementation is split by concern:
//!
//! - `alloc`: block classification rings, free-slot search, id reclamation
//! - `insert`: transition following and conflict relocation
//! - `delete`: value removal and dead-chain pruning
//! - `search`: jump/key/value lookups and common-prefix iteration

mod alloc;
mod delete;
mod insert;
mod search;

pub use search::{CommonPrefixIter, PrefixMatch};

use crate::node::{BlockMeta, NInfo, NodeRec, BLOCK_LEN};

/// Aggregate counters for one trie instance.
///
/// All fields are maintained incrementally by insert/delete bookkeeping;
/// reading them never walks the arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Number of keys currently stored.
    pub keys: usize,
    /// Number of allocated (in-use) nodes, including the root.
    pub nodes: usize,
    /// Addressable id space: capacity of all current blocks.
    pub size: usize,
    /// Backing array capacity; grows by doubling, never shrinks.
    pub capacity: usize,
}

/// A mutable double-array trie mapping byte keys to `i32` values.
///
/// Keys are arbitrary byte strings not containing the reserved byte 0.
/// Values are in `0 ..= i32::MAX - 1`. Lookups cost one array probe per key
/// byte; the structure stays close to minimal-perfect density under churn
/// because freed node ids are recycled block by block.
///
/// # Example
///
/// ```rust
/// use dat_rs::DatTrie;
///
/// let mut trie = DatTrie::new();
/// trie.insert(b"north", 1).unwrap();
/// trie.insert(b"nor", 2).unwrap();
///
/// assert_eq!(trie.get(b"north").unwrap(), 1);
/// assert_eq!(trie.get(b"nor").unwrap(), 2);
/// assert!(trie.get(b"no").is_err());
/// ```
#[derive(Clone)]
pub struct DatTrie {
    pub(crate) nodes: Vec<NodeRec>,
    pub(crate) ninfo: Vec<NInfo>,
    pub(crate) blocks: Vec<BlockMeta>,
    /// Global futility thresholds: `reject[n]` is the current scan cutoff
    /// for blocks with `n` free slots.
    pub(crate) reject: Vec<i32>,
    pub(crate) head_full: i32,
    pub(crate) head_closed: i32,
    pub(crate) head_open: i32,
    /// Addressable prefix of the arrays, always a multiple of 256.
    pub(crate) size: i32,
    /// Allocated length of the arrays.
    pub(crate) capacity: i32,
    /// Keep sibling chains label-sorted.
    pub(crate) ordered: bool,
    /// Scans a block survives before it is retired from the open ring.
    pub(crate) max_trial: i32,
    pub(crate) keys: usize,
    pub(crate) allocated: usize,
}

impl DatTrie {
    /// Create an empty trie with label-sorted sibling chains.
    pub fn new() -> Self {
        Self::with_ordered(true)
    }

    /// Create an empty trie that appends new siblings instead of keeping
    /// chains sorted. Lookup behavior is identical; inserting unsorted key
    /// sets is slightly cheaper.
    pub fn unordered() -> Self {
        Self::with_ordered(false)
    }

    fn with_ordered(ordered: bool) -> Self {
        let mut nodes = vec![NodeRec::default(); BLOCK_LEN as usize];
        // Root: branch at base 1 so that no node ever claims base 0.
        nodes[0] = NodeRec { base: 1, check: 0 };
        for i in 1..BLOCK_LEN {
            let prev = if i == 1 { BLOCK_LEN - 1 } else { i - 1 };
            let next = if i == BLOCK_LEN - 1 { 1 } else { i + 1 };
            nodes[i as usize] = NodeRec::free(prev, next);
        }

        // Slot 0 is taken by the root from the start.
        let block0 = BlockMeta {
            num: BLOCK_LEN - 1,
            ehead: 1,
            ..BlockMeta::default()
        };

        DatTrie {
            nodes,
            ninfo: vec![NInfo::default(); BLOCK_LEN as usize],
            blocks: vec![block0],
            reject: (0..=BLOCK_LEN).map(|i| i + 1).collect(),
            head_full: 0,
            head_closed: 0,
            head_open: 0,
            size: BLOCK_LEN,
            capacity: BLOCK_LEN,
            ordered,
            max_trial: 1,
            keys: 0,
            allocated: 1,
        }
    }

    /// Aggregate counters: stored keys, allocated nodes, addressable size,
    /// backing capacity.
    pub fn status(&self) -> Status {
        Status {
            keys: self.keys,
            nodes: self.allocated,
            size: self.size as usize,
            capacity: self.capacity as usize,
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.keys
    }

    /// Whether the trie stores no keys.
    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }
}

impl Default for DatTrie {
    fn default() -> Self {
        Self::new()
    }
}
