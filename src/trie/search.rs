//! Read-only traversal: jump, key reconstruction, value lookup, and
//! common-prefix iteration.

use super::DatTrie;
use crate::error::{Error, Result};
use crate::node::END_LABEL;

impl DatTrie {
    /// Apply the transitions for `path` starting at node `from` (not
    /// necessarily the root) and return the final node id.
    ///
    /// Ids are opaque and only valid against the instance that produced
    /// them. Callers may resume from a previously returned id, which is how
    /// incremental prefix search works. Fails with [`Error::NoPath`] at the
    /// first missing transition or when `from` is not a live node.
    pub fn jump(&self, path: &[u8], from: usize) -> Result<usize> {
        let from = self.live_id(from)?;
        Ok(self.jump_id(path, from)? as usize)
    }

    /// Retrieve the value stored under `key`.
    ///
    /// [`Error::NoPath`] when the path is absent; [`Error::NoValue`] when
    /// the path exists but `key` is only a structural prefix of longer keys.
    pub fn get(&self, key: &[u8]) -> Result<i32> {
        let to = self.jump_id(key, 0)?;
        self.value_id(to)
    }

    /// Decode the value carried by node `id`: either the leaf value itself
    /// or, for a branching terminal, the value in its sentinel child.
    pub fn value(&self, id: usize) -> Result<i32> {
        let id = self.live_id(id)?;
        self.value_id(id)
    }

    /// Reconstruct the key leading from the root to node `id` by walking
    /// the parent links upward. Fails with [`Error::InvalidKey`] when `id`
    /// does not name a live, reachable, non-root node.
    pub fn key(&self, id: usize) -> Result<Vec<u8>> {
        let mut id = self.live_id(id).map_err(|_| Error::InvalidKey)?;
        let mut key = Vec::new();
        while id > 0 {
            let from = self.nodes[id as usize].check;
            if from < 0 {
                return Err(Error::InvalidKey);
            }
            let base = self.nodes[from as usize].base;
            if base < 0 {
                return Err(Error::InvalidKey);
            }
            let label = (base ^ id) as u8;
            if label != END_LABEL {
                key.push(label);
            }
            id = from;
        }
        if key.is_empty() {
            return Err(Error::InvalidKey);
        }
        key.reverse();
        Ok(key)
    }

    /// Iterate over every stored key that is a prefix of `query`, yielding
    /// the prefix length and the stored value, shortest first.
    pub fn common_prefixes<'a>(&'a self, query: &'a [u8]) -> CommonPrefixIter<'a> {
        CommonPrefixIter {
            trie: self,
            query,
            from: 0,
            pos: 0,
            live: true,
        }
    }

    /// Validate a caller-supplied id against the live id space.
    fn live_id(&self, id: usize) -> Result<i32> {
        if id >= self.size as usize || self.nodes[id].check < 0 {
            return Err(Error::NoPath);
        }
        Ok(id as i32)
    }

    pub(crate) fn jump_id(&self, path: &[u8], mut from: i32) -> Result<i32> {
        for &b in path {
            let base = self.nodes[from as usize].base;
            if base < 0 {
                // Leaf or vacant: no outgoing transitions.
                return Err(Error::NoPath);
            }
            let to = base ^ i32::from(b);
            if to == 0 || self.nodes[to as usize].check != from {
                return Err(Error::NoPath);
            }
            from = to;
        }
        Ok(from)
    }

    pub(crate) fn value_id(&self, id: i32) -> Result<i32> {
        let rec = self.nodes[id as usize];
        if let Some(v) = rec.leaf_value() {
            return Ok(v);
        }
        if rec.base >= 0 {
            let leaf = self.nodes[rec.base as usize]; // base ^ END_LABEL
            if leaf.check == id {
                if let Some(v) = leaf.leaf_value() {
                    return Ok(v);
                }
            }
        }
        Err(Error::NoValue)
    }
}

/// A stored key that is a prefix of the queried bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixMatch {
    /// Length of the matching prefix in bytes.
    pub len: usize,
    /// The value stored under that prefix.
    pub value: i32,
}

/// Iterator returned by [`DatTrie::common_prefixes`].
pub struct CommonPrefixIter<'a> {
    trie: &'a DatTrie,
    query: &'a [u8],
    from: i32,
    pos: usize,
    live: bool,
}

impl Iterator for CommonPrefixIter<'_> {
    type Item = PrefixMatch;

    fn next(&mut self) -> Option<PrefixMatch> {
        while self.live && self.pos < self.query.len() {
            let b = self.query[self.pos];
            if b == END_LABEL {
                break;
            }
            let base = self.trie.nodes[self.from as usize].base;
            if base < 0 {
                break;
            }
            let to = base ^ i32::from(b);
            if to == 0 || self.trie.nodes[to as usize].check != self.from {
                break;
            }
            self.from = to;
            self.pos += 1;
            if let Ok(value) = self.trie.value_id(self.from) {
                return Some(PrefixMatch {
                    len: self.pos,
                    value,
                });
            }
        }
        self.live = false;
        None
    }
}
