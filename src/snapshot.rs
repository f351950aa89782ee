//! Snapshot persistence: one stable, versioned shape for the full engine
//! state, plus pluggable encodings keyed by a format token.
//!
//! Two encodings are supported: `"bin"` (compact, bincode) and `"json"`
//! (human-readable, serde_json). A snapshot carries everything needed to
//! resume bit-identical operation: both node arrays, the sibling metadata,
//! the block allocator state, and the maintained counters.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::{BlockMeta, NInfo, NodeRec, BLOCK_LEN};
use crate::trie::DatTrie;

/// Version tag embedded in every snapshot; decoding rejects anything else.
const SNAPSHOT_VERSION: u32 = 1;

/// A persistence encoding, selected by a case-insensitive token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Compact binary encoding (bincode).
    Binary,
    /// Human-readable structured encoding (JSON).
    Json,
}

impl SnapshotFormat {
    /// Parse a format token: `"bin"`/`"binary"` or `"json"`, any casing.
    pub fn from_token(token: &str) -> Result<Self> {
        match token.to_ascii_lowercase().as_str() {
            "bin" | "binary" => Ok(SnapshotFormat::Binary),
            "json" => Ok(SnapshotFormat::Json),
            _ => Err(Error::UnsupportedFormat(token.to_string())),
        }
    }
}

/// Borrowed view of the engine state, serialized without copying the
/// arrays. Field order must match [`Snapshot`].
#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    nodes: &'a [NodeRec],
    ninfo: &'a [NInfo],
    blocks: &'a [BlockMeta],
    reject: &'a [i32],
    head_full: i32,
    head_closed: i32,
    head_open: i32,
    size: i32,
    capacity: i32,
    ordered: bool,
    max_trial: i32,
    keys: u64,
    allocated: u64,
}

/// Owned snapshot as decoded from a source. Field order must match
/// [`SnapshotRef`].
#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    nodes: Vec<NodeRec>,
    ninfo: Vec<NInfo>,
    blocks: Vec<BlockMeta>,
    reject: Vec<i32>,
    head_full: i32,
    head_closed: i32,
    head_open: i32,
    size: i32,
    capacity: i32,
    ordered: bool,
    max_trial: i32,
    keys: u64,
    allocated: u64,
}

impl Snapshot {
    /// Basic shape checks before the snapshot may replace an instance.
    fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::Decode(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        let fail = |what: &str| Err(Error::Decode(format!("inconsistent snapshot: {}", what)));
        if self.size < BLOCK_LEN || self.size % BLOCK_LEN != 0 || self.capacity < self.size {
            return fail("size/capacity");
        }
        if self.nodes.len() != self.capacity as usize || self.ninfo.len() != self.nodes.len() {
            return fail("array lengths");
        }
        if self.blocks.len() != (self.size / BLOCK_LEN) as usize {
            return fail("block count");
        }
        if self.reject.len() != BLOCK_LEN as usize + 1 {
            return fail("reject table length");
        }
        if self.allocated == 0 || self.allocated > self.size as u64 {
            return fail("allocated count");
        }
        Ok(())
    }
}

impl DatTrie {
    fn snapshot_ref(&self) -> SnapshotRef<'_> {
        SnapshotRef {
            version: SNAPSHOT_VERSION,
            nodes: &self.nodes,
            ninfo: &self.ninfo,
            blocks: &self.blocks,
            reject: &self.reject,
            head_full: self.head_full,
            head_closed: self.head_closed,
            head_open: self.head_open,
            size: self.size,
            capacity: self.capacity,
            ordered: self.ordered,
            max_trial: self.max_trial,
            keys: self.keys as u64,
            allocated: self.allocated as u64,
        }
    }

    fn apply_snapshot(&mut self, snap: Snapshot) -> Result<()> {
        snap.validate()?;
        *self = DatTrie {
            nodes: snap.nodes,
            ninfo: snap.ninfo,
            blocks: snap.blocks,
            reject: snap.reject,
            head_full: snap.head_full,
            head_closed: snap.head_closed,
            head_open: snap.head_open,
            size: snap.size,
            capacity: snap.capacity,
            ordered: snap.ordered,
            max_trial: snap.max_trial,
            keys: snap.keys as usize,
            allocated: snap.allocated as usize,
        };
        Ok(())
    }

    /// Serialize the full engine state to `sink` in the encoding named by
    /// the case-insensitive `format` token (`"bin"` or `"json"`).
    pub fn save<W: Write>(&self, sink: W, format: &str) -> Result<()> {
        let snap = self.snapshot_ref();
        match SnapshotFormat::from_token(format)? {
            SnapshotFormat::Binary => {
                bincode::serialize_into(sink, &snap).map_err(|e| Error::Encode(e.to_string()))
            }
            SnapshotFormat::Json => {
                serde_json::to_writer(sink, &snap).map_err(|e| Error::Encode(e.to_string()))
            }
        }
    }

    /// Decode a snapshot from `source` and replace this instance's entire
    /// state with it. Must not be interleaved with any other call on the
    /// same instance.
    pub fn load<R: Read>(&mut self, source: R, format: &str) -> Result<()> {
        let snap: Snapshot = match SnapshotFormat::from_token(format)? {
            SnapshotFormat::Binary => {
                bincode::deserialize_from(source).map_err(|e| Error::Decode(e.to_string()))?
            }
            SnapshotFormat::Json => {
                serde_json::from_reader(source).map_err(|e| Error::Decode(e.to_string()))?
            }
        };
        self.apply_snapshot(snap)
    }

    /// Decode a snapshot directly from an in-memory byte view.
    pub fn load_from_bytes(&mut self, bytes: &[u8], format: &str) -> Result<()> {
        let snap: Snapshot = match SnapshotFormat::from_token(format)? {
            SnapshotFormat::Binary => {
                bincode::deserialize(bytes).map_err(|e| Error::Decode(e.to_string()))?
            }
            SnapshotFormat::Json => {
                serde_json::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))?
            }
        };
        self.apply_snapshot(snap)
    }

    /// Save to a file, creating or truncating it.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: &str) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        self.save(&mut out, format)?;
        out.flush()?;
        Ok(())
    }

    /// Load from a file opened read-only.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P, format: &str) -> Result<()> {
        let file = File::open(path)?;
        self.load(BufReader::new(file), format)
    }

    /// Load from a file through a read-only memory mapping, decoding
    /// straight from the mapped view without an intermediate copy. Useful
    /// for large dictionaries.
    pub fn load_from_file_mmap<P: AsRef<Path>>(&mut self, path: P, format: &str) -> Result<()> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and lives only for this call;
        // callers must not truncate or rewrite the file while it loads.
        let map = unsafe { Mmap::map(&file)? };
        self.load_from_bytes(&map, format)
    }
}
