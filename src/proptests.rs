use super::*;

use std::collections::BTreeMap;

use proptest::prelude::*;

use crate::node::{Slot, BLOCK_LEN};

/// Walk a branch's sibling chain, asserting the parent/child invariant for
/// every member. An empty chain is only legal for the root of an empty
/// trie.
fn chain(trie: &DatTrie, n: i32, base: i32) -> Vec<(u8, i32)> {
    let mut out = Vec::new();
    let head = trie.ninfo[n as usize].child;
    if trie.nodes[(base ^ i32::from(head)) as usize].check != n {
        assert_eq!(n, 0, "only the root may be a branch with no children");
        return out;
    }
    let mut c = head;
    loop {
        let id = base ^ i32::from(c);
        assert_eq!(
            trie.nodes[id as usize].check, n,
            "chain member must point back at its parent"
        );
        out.push((c, id));
        c = trie.ninfo[id as usize].sibling;
        if c == 0 {
            break;
        }
    }
    if trie.ordered {
        for pair in out.windows(2) {
            assert!(
                pair[0].0 < pair[1].0,
                "ordered chains must be label-sorted"
            );
        }
    }
    out
}

/// Check every structural invariant of the engine against a model of the
/// keys it should hold.
fn validate(trie: &DatTrie, model: &BTreeMap<Vec<u8>, i32>) {
    let size = trie.size as usize;
    assert_eq!(trie.nodes.len(), trie.capacity as usize);
    assert_eq!(trie.ninfo.len(), trie.capacity as usize);
    assert_eq!(trie.blocks.len(), size / BLOCK_LEN as usize);

    // Root is a live branch.
    assert_eq!(trie.nodes[0].check, 0, "root parent marker");
    assert!(
        matches!(trie.nodes[0].slot(), Slot::Branch { .. }),
        "root must never become a leaf"
    );

    // Walk everything reachable from the root.
    let mut reachable = vec![false; size];
    reachable[0] = true;
    let mut stack = vec![0i32];
    let mut found_keys = 0usize;
    while let Some(n) = stack.pop() {
        match trie.nodes[n as usize].slot() {
            Slot::Branch { base } => {
                for (_, id) in chain(trie, n, base) {
                    assert!(
                        !reachable[id as usize],
                        "node {} reached twice",
                        id
                    );
                    reachable[id as usize] = true;
                    stack.push(id);
                }
            }
            Slot::Leaf { .. } => found_keys += 1,
            Slot::Vacant => panic!("vacant node {} survived an operation", n),
            Slot::Free { .. } => panic!("free node {} is reachable", n),
        }
    }

    // Reachability must coincide with allocation, and the maintained
    // counters with what the walk saw.
    let allocated = (0..size).filter(|&i| trie.nodes[i].check >= 0).count();
    for i in 0..size {
        assert_eq!(
            reachable[i],
            trie.nodes[i].check >= 0,
            "allocation/reachability mismatch at {}",
            i
        );
    }
    assert_eq!(allocated, trie.allocated, "allocated-node counter");
    assert_eq!(found_keys, trie.keys, "stored-key counter");
    assert_eq!(found_keys, model.len(), "model key count");

    // Per-block free accounting: ring membership matches `num`, and the
    // total matches size minus allocated nodes.
    let mut total_free = 0i32;
    for (bi, block) in trie.blocks.iter().enumerate() {
        total_free += block.num;
        if block.num > 0 {
            let mut seen = 0;
            let mut e = block.ehead;
            loop {
                assert_eq!(e as usize >> 8, bi, "free ring leaves its block");
                match trie.nodes[e as usize].slot() {
                    Slot::Free { next, .. } => e = next,
                    other => panic!("ring member {} is {:?}", e, other),
                }
                seen += 1;
                if e == block.ehead {
                    break;
                }
            }
            assert_eq!(seen, block.num, "free ring length in block {}", bi);
        }
    }
    assert_eq!(
        total_free as usize,
        size - allocated,
        "free slots must equal size minus allocated nodes"
    );

    // Every model key resolves, reconstructs, and nothing else does.
    for (key, &value) in model {
        assert_eq!(trie.get(key).unwrap(), value, "key {:?}", key);
        if !key.is_empty() {
            let id = trie.jump(key, 0).unwrap();
            assert_eq!(trie.key(id).unwrap(), *key, "reconstruction of {:?}", key);
            assert_eq!(trie.value(id).unwrap(), value);
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Vec<u8>, i32),
    Delete(Vec<u8>),
    Get(Vec<u8>),
}

/// Short keys over a tiny alphabet so prefixes, conflicts, and relocations
/// happen constantly.
fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(97u8..100u8, 0..6)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (key_strategy(), 0..1000i32).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => key_strategy().prop_map(Op::Delete),
        1 => key_strategy().prop_map(Op::Get),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_matches_model(ops in proptest::collection::vec(op_strategy(), 1..250)) {
        let mut trie = DatTrie::new();
        let mut model: BTreeMap<Vec<u8>, i32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    trie.insert(&key, value).unwrap();
                    model.insert(key, value);
                }
                Op::Delete(key) => {
                    let got = trie.delete(&key);
                    match model.remove(&key) {
                        Some(value) => prop_assert_eq!(got.unwrap(), value),
                        None => prop_assert!(got.is_err()),
                    }
                }
                Op::Get(key) => match model.get(&key) {
                    Some(&value) => prop_assert_eq!(trie.get(&key).unwrap(), value),
                    None => prop_assert!(trie.get(&key).is_err()),
                },
            }
        }
        validate(&trie, &model);

        // Draining the trie must return it to the root-only baseline.
        let keys: Vec<Vec<u8>> = model.keys().cloned().collect();
        for key in keys {
            trie.delete(&key).unwrap();
            model.remove(&key);
        }
        validate(&trie, &model);
        prop_assert_eq!(trie.status().nodes, 1);
        prop_assert_eq!(trie.status().size, 256);
    }

    #[test]
    fn prop_unordered_matches_model(ops in proptest::collection::vec(op_strategy(), 1..150)) {
        let mut trie = DatTrie::unordered();
        let mut model: BTreeMap<Vec<u8>, i32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    trie.insert(&key, value).unwrap();
                    model.insert(key, value);
                }
                Op::Delete(key) => {
                    let got = trie.delete(&key);
                    match model.remove(&key) {
                        Some(value) => prop_assert_eq!(got.unwrap(), value),
                        None => prop_assert!(got.is_err()),
                    }
                }
                Op::Get(key) => match model.get(&key) {
                    Some(&value) => prop_assert_eq!(trie.get(&key).unwrap(), value),
                    None => prop_assert!(trie.get(&key).is_err()),
                },
            }
        }
        validate(&trie, &model);
    }

    #[test]
    fn prop_snapshot_roundtrip(ops in proptest::collection::vec(op_strategy(), 1..100)) {
        let mut trie = DatTrie::new();
        let mut model: BTreeMap<Vec<u8>, i32> = BTreeMap::new();
        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    trie.insert(&key, value).unwrap();
                    model.insert(key, value);
                }
                Op::Delete(key) => {
                    if model.remove(&key).is_some() {
                        trie.delete(&key).unwrap();
                    }
                }
                Op::Get(_) => {}
            }
        }

        for format in ["bin", "json"] {
            let mut buf = Vec::new();
            trie.save(&mut buf, format).unwrap();
            let mut loaded = DatTrie::new();
            loaded.load(&buf[..], format).unwrap();
            prop_assert_eq!(loaded.status(), trie.status());
            validate(&loaded, &model);
        }
    }
}

/// A deterministic many-key workout: insert one half, delete the evens,
/// refill, and keep cross-checking lookups, reconstruction, and counters
/// at every stage.
#[test]
fn test_large_dict_scenario() {
    let syllables = ["ka", "shi", "mu", "re", "on", "ta", "vel"];
    let dict: Vec<(Vec<u8>, i32)> = (0..1400)
        .map(|i| {
            let key = format!(
                "{}{}{:03}",
                syllables[i % syllables.len()],
                syllables[(i / 7) % syllables.len()],
                i
            );
            (key.into_bytes(), i as i32)
        })
        .collect();
    let size = dict.len();
    let mut trie = DatTrie::new();

    let exist = |trie: &DatTrie, i: usize| {
        let (key, value) = &dict[i];
        let id = trie.jump(key, 0).unwrap();
        assert_eq!(&trie.key(id).unwrap(), key);
        assert_eq!(trie.value(id).unwrap(), *value);
        assert_eq!(trie.get(key).unwrap(), *value);
    };
    let not_exist = |trie: &DatTrie, i: usize| {
        assert!(
            matches!(trie.get(&dict[i].0), Err(Error::NoPath) | Err(Error::NoValue)),
            "key {} should be gone",
            i
        );
    };

    // Insert the first half, alternating between the two upsert entry
    // points.
    for (i, (key, value)) in dict.iter().take(size / 2).enumerate() {
        if i % 2 == 0 {
            trie.insert(key, *value).unwrap();
        } else {
            trie.update(key, *value).unwrap();
        }
    }
    assert_eq!(trie.status().keys, size / 2);
    for i in 0..size / 2 {
        exist(&trie, i);
    }

    // Delete the even entries of the first half.
    for i in (0..size / 2).step_by(2) {
        trie.delete(&dict[i].0).unwrap();
    }
    assert_eq!(trie.status().keys, size / 2 / 2);
    for i in 0..size / 2 {
        if i % 2 == 0 {
            not_exist(&trie, i);
        } else {
            exist(&trie, i);
        }
    }

    // Insert the second half on top.
    for (key, value) in dict.iter().skip(size / 2) {
        trie.insert(key, *value).unwrap();
    }
    assert_eq!(trie.status().keys, size / 2 / 2 + (size - size / 2));

    // Refill the missing evens and re-upsert everything once more.
    for i in (0..size / 2).step_by(2) {
        not_exist(&trie, i);
        trie.update(&dict[i].0, dict[i].1).unwrap();
    }
    for (key, value) in &dict {
        trie.insert(key, *value).unwrap();
    }
    assert_eq!(trie.status().keys, size);
    for i in 0..size {
        exist(&trie, i);
    }

    let model: BTreeMap<Vec<u8>, i32> = dict.iter().cloned().collect();
    validate(&trie, &model);
}
