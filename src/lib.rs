//! # dat-rs
//!
//! A compact, mutable double-array trie mapping byte keys to `i32` values.
//!
//! The trie is encoded as two parallel integer arrays (`base`/`check`), so
//! a transition is one XOR and one array probe, and memory stays close to a
//! minimal perfect encoding. Unlike classic double-array builders the
//! structure is fully live: insert, update, delete, exact lookup, and
//! common-prefix traversal all work without rebuilding, with freed node ids
//! recycled through a block allocator.
//!
//! ## Example
//!
//! ```rust
//! use dat_rs::DatTrie;
//!
//! let mut trie = DatTrie::new();
//! trie.insert(b"cat", 1).unwrap();
//! trie.insert(b"car", 2).unwrap();
//! trie.insert(b"care", 3).unwrap();
//!
//! assert_eq!(trie.get(b"car").unwrap(), 2);
//! assert!(trie.get(b"ca").is_err()); // only a structural prefix
//!
//! trie.delete(b"car").unwrap();
//! assert_eq!(trie.get(b"care").unwrap(), 3);
//! ```
//!
//! ## Persistence
//!
//! The full engine state snapshots to any `Write` sink and restores from
//! any `Read` source, in a compact binary encoding (`"bin"`) or a
//! human-readable one (`"json"`); see [`DatTrie::save`], [`DatTrie::load`],
//! the file wrappers, and [`DatTrie::load_from_file_mmap`] for decoding
//! straight from a read-only mapping.
//!
//! ## Concurrency
//!
//! An instance is single-threaded: mutation takes `&mut self` and there is
//! no internal locking. Wrap the instance in a lock to share it; node ids
//! returned by [`DatTrie::jump`] are opaque and only meaningful against the
//! instance that produced them.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod node;
mod snapshot;
mod trie;

pub use error::{Error, Result};
pub use node::VALUE_LIMIT;
pub use snapshot::SnapshotFormat;
pub use trie::{CommonPrefixIter, DatTrie, PrefixMatch, Status};

#[cfg(test)]
mod proptests;
