//! Insertion: transition following, sibling-chain upkeep, and conflict
//! relocation.
//!
//! A key is stored by walking byte transitions from the root, materializing
//! missing nodes as it goes. The terminal value lives under the reserved
//! label-0 transition, so a key can be a strict prefix of another while both
//! stay independently addressable. When a wanted slot is occupied by an
//! unrelated subtree, the smaller of the two involved sibling sets is
//! relocated to a fresh base.

use smallvec::SmallVec;

use super::DatTrie;
use crate::error::{Error, Result};
use crate::node::{leaf_base, NInfo, NodeRec, END_LABEL, VACANT, VALUE_LIMIT};

/// Scratch capacity for sibling sets; a set can reach 257 labels, at which
/// point the buffer spills to the heap.
type LabelVec = SmallVec<[u8; 64]>;

/// Where a sibling-chain link lives: a parent's child-head byte or a
/// sibling node's next-label byte.
#[derive(Clone, Copy)]
enum Link {
    Child(i32),
    Sibling(i32),
}

impl DatTrie {
    /// Store `value` under `key`, creating or overwriting as needed.
    /// Re-inserting an existing key never errors and never duplicates.
    pub fn insert(&mut self, key: &[u8], value: i32) -> Result<()> {
        if !(0..VALUE_LIMIT).contains(&value) {
            return Err(Error::InvalidValue);
        }
        if key.contains(&END_LABEL) {
            return Err(Error::InvalidKey);
        }
        let leaf = self.reach_leaf(key);
        if self.nodes[leaf as usize].base == VACANT {
            self.keys += 1;
        }
        self.nodes[leaf as usize].base = leaf_base(value);
        Ok(())
    }

    /// Alias of [`insert`](Self::insert): both are the same upsert.
    pub fn update(&mut self, key: &[u8], value: i32) -> Result<()> {
        self.insert(key, value)
    }

    /// Walk (and extend) the automaton for `key`, returning the id of the
    /// leaf that holds its value.
    fn reach_leaf(&mut self, key: &[u8]) -> i32 {
        let mut from = 0i32;
        for &b in key {
            let base = self.nodes[from as usize].base;
            if base != VACANT && base < 0 {
                // A shorter key holds its value right here; push it down to
                // the sentinel child before growing through this node.
                let value = -base - 1;
                let to = self.follow(from, END_LABEL);
                self.nodes[to as usize].base = leaf_base(value);
            }
            from = self.follow(from, b);
        }
        if self.nodes[from as usize].base >= 0 {
            self.follow(from, END_LABEL)
        } else {
            from
        }
    }

    /// Take the transition `from --label-->`, materializing the target if
    /// it does not exist yet and relocating on slot conflicts.
    pub(crate) fn follow(&mut self, from: i32, label: u8) -> i32 {
        let base = self.nodes[from as usize].base;
        let to = base ^ i32::from(label);
        if base < 0 || self.nodes[to as usize].check < 0 {
            // No such child yet and the wanted slot is free (or the node has
            // no children at all): claim a slot and chain it in.
            let has_child = base >= 0 && {
                let head = self.ninfo[from as usize].child;
                self.nodes[(base ^ i32::from(head)) as usize].check == from
            };
            let to = self.pop_enode(base, label, from);
            self.push_sibling(from, to ^ i32::from(label), label, has_child);
            to
        } else if to != 0 && self.nodes[to as usize].check == from {
            to
        } else {
            // Slot 0 is reserved for the root, or the slot belongs to an
            // unrelated subtree.
            let head = self.ninfo[from as usize].child;
            let has_child = self.nodes[(base ^ i32::from(head)) as usize].check == from;
            if has_child {
                self.resolve(from, base, label)
            } else {
                // Childless branch (the root of an emptied trie): no child
                // slots to move, so rebase onto any free slot.
                let to = self.pop_enode(-1, label, from);
                self.push_sibling(from, to ^ i32::from(label), label, false);
                to
            }
        }
    }

    /// Resolve a slot conflict: the slot for `label_n` under `from_n` is
    /// owned by an unrelated node. Relocates the smaller of the two sibling
    /// sets involved (the one gaining `label_n`, or the one owning the
    /// occupant) to a fresh base, then claims the now-free slot. Returns the
    /// id of the new child for `label_n`.
    fn resolve(&mut self, from_n: i32, base_n: i32, label_n: u8) -> i32 {
        let to_pn = base_n ^ i32::from(label_n);
        let from_p = self.nodes[to_pn as usize].check;
        let base_p = self.nodes[from_p as usize].base;

        // Slot 0 has no movable owner, so the only way out is relocating
        // from_n's own set; otherwise move whichever set is smaller.
        let flag = to_pn == 0
            || self.consult(
                base_n,
                base_p,
                self.ninfo[from_n as usize].child,
                self.ninfo[from_p as usize].child,
            );

        let mut children: LabelVec = LabelVec::new();
        if flag {
            self.gather_children(
                base_n,
                self.ninfo[from_n as usize].child,
                Some(label_n),
                &mut children,
            );
        } else {
            self.gather_children(
                base_p,
                self.ninfo[from_p as usize].child,
                None,
                &mut children,
            );
        }

        let (from, base_old) = if flag {
            (from_n, base_n)
        } else {
            (from_p, base_p)
        };

        // Search while the old slots are still live: the scan may accept
        // slots owned by `from` (they are about to be vacated) but never the
        // conflict slot itself.
        let e = if children.len() == 1 {
            self.find_place(children[0])
        } else {
            self.find_places(&children, from, to_pn)
        };
        let base_new = e ^ i32::from(children[0]);

        // Snapshot the moving records, then free all old ids before claiming
        // any new one, so partially-overlapping bases cannot clobber a slot
        // that is still holding live data.
        let moved: SmallVec<[Option<(NodeRec, NInfo)>; 64]> = children
            .iter()
            .map(|&c| {
                let old = base_old ^ i32::from(c);
                if flag && old == to_pn {
                    None // the newcomer has no old record
                } else {
                    Some((self.nodes[old as usize], self.ninfo[old as usize]))
                }
            })
            .collect();
        for (i, &c) in children.iter().enumerate() {
            if moved[i].is_some() {
                self.push_enode(base_old ^ i32::from(c));
            }
        }

        if flag && children[0] == label_n {
            self.ninfo[from as usize].child = label_n;
        }
        self.nodes[from as usize].base = base_new;

        let mut from_n = from_n;
        for (i, &c) in children.iter().enumerate() {
            let to = self.pop_enode(base_new, c, from);
            self.ninfo[to as usize].sibling = children.get(i + 1).copied().unwrap_or(0);
            let Some((rec, info)) = moved[i] else {
                continue; // newcomer: stays vacant until a value or child arrives
            };
            self.nodes[to as usize].base = rec.base;
            if rec.base >= 0 && c != END_LABEL {
                // The moved node is a branch; its children keep their slots
                // but must point back at the new id.
                let mut g = info.child;
                self.ninfo[to as usize].child = g;
                loop {
                    self.nodes[(rec.base ^ i32::from(g)) as usize].check = to;
                    g = self.ninfo[(rec.base ^ i32::from(g)) as usize].sibling;
                    if g == 0 {
                        break;
                    }
                }
            }
            if !flag && (base_old ^ i32::from(c)) == from_n {
                from_n = to; // the conflicted parent itself was moved
            }
        }

        if flag {
            base_new ^ i32::from(label_n)
        } else {
            // The conflict slot is free now; claim it for the pending label.
            let to = self.pop_enode(base_n, label_n, from_n);
            self.push_sibling(from_n, base_n, label_n, true);
            to
        }
    }

    /// Compare the sibling-set sizes of the two nodes involved in a
    /// conflict. True means `from_n`'s set (plus the new label) is the
    /// smaller one to move.
    fn consult(&self, base_n: i32, base_p: i32, mut c_n: u8, mut c_p: u8) -> bool {
        loop {
            c_n = self.ninfo[(base_n ^ i32::from(c_n)) as usize].sibling;
            c_p = self.ninfo[(base_p ^ i32::from(c_p)) as usize].sibling;
            if c_n == 0 || c_p == 0 {
                break;
            }
        }
        c_p != 0
    }

    /// Collect a node's child labels in chain order, optionally merging in
    /// a label about to be added (kept sorted in ordered mode).
    fn gather_children(&self, base: i32, mut c: u8, insert: Option<u8>, out: &mut LabelVec) {
        if c == 0 {
            // The sentinel child, when present, is always the chain head.
            out.push(c);
            c = self.ninfo[(base ^ i32::from(c)) as usize].sibling;
        }
        if self.ordered {
            let bound = insert.unwrap_or(u8::MAX);
            while c != 0 && c <= bound {
                out.push(c);
                c = self.ninfo[(base ^ i32::from(c)) as usize].sibling;
            }
        }
        if let Some(label) = insert {
            out.push(label);
        }
        while c != 0 {
            out.push(c);
            c = self.ninfo[(base ^ i32::from(c)) as usize].sibling;
        }
    }

    fn read_link(&self, link: Link) -> u8 {
        match link {
            Link::Child(id) => self.ninfo[id as usize].child,
            Link::Sibling(id) => self.ninfo[id as usize].sibling,
        }
    }

    fn write_link(&mut self, link: Link, label: u8) {
        match link {
            Link::Child(id) => self.ninfo[id as usize].child = label,
            Link::Sibling(id) => self.ninfo[id as usize].sibling = label,
        }
    }

    /// Chain a freshly-claimed child of `from` into the sibling list.
    /// `has_child` says whether `from` already has a live chain.
    pub(crate) fn push_sibling(&mut self, from: i32, base: i32, label: u8, has_child: bool) {
        let head = self.ninfo[from as usize].child;
        let keep_order = if self.ordered {
            label > head
        } else {
            head == 0 // the sentinel child must stay at the head
        };

        let mut link = Link::Child(from);
        if has_child && keep_order {
            let mut c = head;
            link = Link::Sibling(base ^ i32::from(c));
            if self.ordered {
                loop {
                    let next = self.read_link(link);
                    if next == 0 || next >= label {
                        break;
                    }
                    c = next;
                    link = Link::Sibling(base ^ i32::from(c));
                }
            }
        }

        let succ = self.read_link(link);
        self.ninfo[(base ^ i32::from(label)) as usize].sibling = succ;
        self.write_link(link, label);
    }

    /// Remove `label` from the sibling chain of `from`. The label must be
    /// present.
    pub(crate) fn pop_sibling(&mut self, from: i32, base: i32, label: u8) {
        let mut link = Link::Child(from);
        loop {
            let c = self.read_link(link);
            if c == label {
                break;
            }
            link = Link::Sibling(base ^ i32::from(c));
        }
        let next = self.ninfo[(base ^ i32::from(label)) as usize].sibling;
        self.write_link(link, next);
    }
}
