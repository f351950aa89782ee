//! Block allocator: id recycling in 256-slot blocks.
//!
//! Blocks are threaded through three rings by fill level: Full (no free
//! slot), Closed (one free slot, or scan-weary), Open (everything else).
//! Free-base searches only ever walk the Open ring, so churn-heavy blocks
//! retire themselves out of the scan path. Free slots inside a block form a
//! circular ring linked through negated `base`/`check` fields.

use super::DatTrie;
use crate::node::{BlockMeta, NInfo, NodeRec, BLOCK_LEN, VACANT};

/// Which classification ring a block lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockList {
    Full,
    Closed,
    Open,
}

impl DatTrie {
    fn head(&self, list: BlockList) -> i32 {
        match list {
            BlockList::Full => self.head_full,
            BlockList::Closed => self.head_closed,
            BlockList::Open => self.head_open,
        }
    }

    fn set_head(&mut self, list: BlockList, bi: i32) {
        match list {
            BlockList::Full => self.head_full = bi,
            BlockList::Closed => self.head_closed = bi,
            BlockList::Open => self.head_open = bi,
        }
    }

    /// Unlink block `bi` from `list`; `last` marks it as the ring's only
    /// member.
    fn pop_block(&mut self, bi: i32, list: BlockList, last: bool) {
        if last {
            self.set_head(list, 0);
        } else {
            let b = self.blocks[bi as usize];
            self.blocks[b.prev as usize].next = b.next;
            self.blocks[b.next as usize].prev = b.prev;
            if bi == self.head(list) {
                self.set_head(list, b.next);
            }
        }
    }

    /// Link block `bi` into `list` at the head; `empty` marks the ring as
    /// currently memberless.
    fn push_block(&mut self, bi: i32, list: BlockList, empty: bool) {
        if empty {
            self.set_head(list, bi);
            self.blocks[bi as usize].prev = bi;
            self.blocks[bi as usize].next = bi;
        } else {
            let h = self.head(list);
            let tail = self.blocks[h as usize].prev;
            self.blocks[bi as usize].prev = tail;
            self.blocks[bi as usize].next = h;
            self.blocks[h as usize].prev = bi;
            self.blocks[tail as usize].next = bi;
            self.set_head(list, bi);
        }
    }

    /// Move block `bi` from one ring to another.
    ///
    /// The full ring is pushed with `empty == false` even when its head is
    /// 0: block 0 never joins a ring, so its link fields serve as that
    /// ring's scratch sentinel.
    fn transfer_block(&mut self, bi: i32, from: BlockList, to: BlockList) {
        let last = bi == self.blocks[bi as usize].next;
        self.pop_block(bi, from, last);
        let empty = self.head(to) == 0 && self.blocks[bi as usize].num != 0;
        self.push_block(bi, to, empty);
    }

    /// Append a fresh block, doubling the backing arrays if the addressable
    /// space has caught up with them. Existing ids keep their slots.
    pub(crate) fn add_block(&mut self) -> i32 {
        if self.size == self.capacity {
            self.capacity *= 2;
            self.nodes.resize(self.capacity as usize, NodeRec::default());
            self.ninfo.resize(self.capacity as usize, NInfo::default());
        }

        let bi = self.size >> 8;
        self.blocks.push(BlockMeta {
            ehead: self.size,
            ..BlockMeta::default()
        });

        // Ring-link the new block's slots.
        let s = self.size;
        self.nodes[s as usize] = NodeRec::free(s + BLOCK_LEN - 1, s + 1);
        for i in s + 1..s + BLOCK_LEN - 1 {
            self.nodes[i as usize] = NodeRec::free(i - 1, i + 1);
        }
        self.nodes[(s + BLOCK_LEN - 1) as usize] = NodeRec::free(s + BLOCK_LEN - 2, s);

        let empty = self.head_open == 0;
        self.push_block(bi, BlockList::Open, empty);
        self.size += BLOCK_LEN;
        bi
    }

    /// Pick a free slot for a single new child with the given label,
    /// preferring nearly-full blocks so roomy ones stay available for
    /// sibling-set relocations. Never yields a slot that would put the
    /// parent at base 0, which is reserved for the root.
    pub(crate) fn find_place(&mut self, label: u8) -> i32 {
        for list in [BlockList::Closed, BlockList::Open] {
            let head = self.head(list);
            if head != 0 {
                let e = self.blocks[head as usize].ehead;
                if e != i32::from(label) {
                    return e;
                }
                // e ^ label would be 0; use the next ring slot if the block
                // has one.
                let next = -self.nodes[e as usize].check;
                if next != e {
                    return next;
                }
            }
        }
        self.add_block() << 8
    }

    /// Find a free slot `e` such that `e ^ labels[0]` is a base hosting the
    /// whole sibling set: every `base ^ label` slot must be free or already
    /// owned by `owner` (the node being relocated), except that the slot
    /// `exclude` is never accepted; the caller needs it vacated. Scans the
    /// open ring, resuming from each block's rolling `ehead` hint, and
    /// falls back to a fresh block, so the search always terminates.
    pub(crate) fn find_places(&mut self, labels: &[u8], owner: i32, exclude: i32) -> i32 {
        let head = self.head_open;
        if head != 0 {
            let bz = self.blocks[head as usize].prev;
            let nc = labels.len() as i32;
            let mut bi = head;
            loop {
                let num = self.blocks[bi as usize].num;
                if num >= nc && nc < self.blocks[bi as usize].reject {
                    let ehead = self.blocks[bi as usize].ehead;
                    let mut e = ehead;
                    loop {
                        let base = e ^ i32::from(labels[0]);
                        if base != 0 && self.fits(base, labels, owner, exclude) {
                            // Rolling hint: later scans resume here.
                            self.blocks[bi as usize].ehead = e;
                            return e;
                        }
                        e = -self.nodes[e as usize].check;
                        if e == ehead {
                            break;
                        }
                    }
                }

                // Remember the futility of this block shape.
                self.blocks[bi as usize].reject = nc;
                if nc < self.reject[num as usize] {
                    self.reject[num as usize] = nc;
                }

                let next = self.blocks[bi as usize].next;
                self.blocks[bi as usize].trial += 1;
                if self.blocks[bi as usize].trial == self.max_trial {
                    self.transfer_block(bi, BlockList::Open, BlockList::Closed);
                }
                if bi == bz {
                    break;
                }
                bi = next;
            }
        }
        self.add_block() << 8
    }

    fn fits(&self, base: i32, labels: &[u8], owner: i32, exclude: i32) -> bool {
        labels.iter().all(|&c| {
            let slot = base ^ i32::from(c);
            if slot == 0 {
                // The root's slot can never host a child.
                return false;
            }
            let check = self.nodes[slot as usize].check;
            check < 0 || (check == owner && slot != exclude)
        })
    }

    /// Claim a node id for a new child of `from`. With `base >= 0` the slot
    /// is `base ^ label`; otherwise `from` has no children yet, so a slot
    /// is picked and `from`'s base is derived from it.
    pub(crate) fn pop_enode(&mut self, base: i32, label: u8, from: i32) -> i32 {
        let e = if base < 0 {
            self.find_place(label)
        } else {
            base ^ i32::from(label)
        };
        let bi = e >> 8;
        let n = self.nodes[e as usize];

        self.blocks[bi as usize].num -= 1;
        if self.blocks[bi as usize].num == 0 {
            if bi != 0 {
                self.transfer_block(bi, BlockList::Closed, BlockList::Full);
            }
        } else {
            // Unlink e from its block's free ring.
            self.nodes[(-n.base) as usize].check = n.check;
            self.nodes[(-n.check) as usize].base = n.base;
            if e == self.blocks[bi as usize].ehead {
                self.blocks[bi as usize].ehead = -n.check;
            }
            if bi != 0
                && self.blocks[bi as usize].num == 1
                && self.blocks[bi as usize].trial != self.max_trial
            {
                self.transfer_block(bi, BlockList::Open, BlockList::Closed);
            }
        }

        self.nodes[e as usize] = NodeRec {
            base: VACANT,
            check: from,
        };
        if base < 0 {
            self.nodes[from as usize].base = e ^ i32::from(label);
        }
        self.allocated += 1;
        e
    }

    /// Return node id `e` to its block's free ring.
    pub(crate) fn push_enode(&mut self, e: i32) {
        let bi = e >> 8;
        self.blocks[bi as usize].num += 1;
        let num = self.blocks[bi as usize].num;

        if num == 1 {
            self.blocks[bi as usize].ehead = e;
            self.nodes[e as usize] = NodeRec::free(e, e);
            if bi != 0 {
                self.transfer_block(bi, BlockList::Full, BlockList::Closed);
            }
        } else {
            let prev = self.blocks[bi as usize].ehead;
            let next = -self.nodes[prev as usize].check;
            self.nodes[e as usize] = NodeRec::free(prev, next);
            self.nodes[prev as usize].check = -e;
            self.nodes[next as usize].base = -e;
            if (num == 2 || self.blocks[bi as usize].trial == self.max_trial) && bi != 0 {
                self.transfer_block(bi, BlockList::Closed, BlockList::Open);
            }
            self.blocks[bi as usize].trial = 0;
        }

        if self.blocks[bi as usize].reject < self.reject[num as usize] {
            self.blocks[bi as usize].reject = self.reject[num as usize];
        }
        self.ninfo[e as usize] = NInfo::default();
        self.allocated -= 1;
    }

    /// Drop trailing fully-empty blocks, shrinking the addressable space.
    /// Block 0 always stays; array capacity is untouched and live ids never
    /// move.
    pub(crate) fn trim_tail(&mut self) {
        while self.size > BLOCK_LEN {
            let bi = (self.size >> 8) - 1;
            if self.blocks[bi as usize].num < BLOCK_LEN {
                break;
            }
            let last = self.blocks[bi as usize].next == bi;
            self.pop_block(bi, BlockList::Open, last);
            self.blocks.truncate(bi as usize);
            self.size -= BLOCK_LEN;
        }
    }
}
