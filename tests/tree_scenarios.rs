//! # End-To-End Tree Scenarios
//!
//! Concrete workloads exercising the whole engine: sorted integer keys,
//! maximal shared-prefix families, split-forcing payloads, URL-like random
//! keys, and a long interleaved stress run against a reference model.
//! Structural invariants are re-verified with `validate()` at every phase
//! boundary.

use std::collections::BTreeMap;

use pagetree::BTree;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[test]
fn sorted_integer_keys_roundtrip() {
    const N: u32 = 50_000;
    let mut tree = BTree::new().unwrap();

    for i in 0..N {
        tree.insert(&i.to_be_bytes(), &(i as u64).to_le_bytes())
            .unwrap();
    }
    tree.validate().unwrap();

    for i in 0..N {
        assert_eq!(
            tree.lookup(&i.to_be_bytes()),
            Some(&(i as u64).to_le_bytes()[..]),
            "key {i}"
        );
    }

    // drop every fourth key
    for i in (0..N).step_by(4) {
        assert!(tree.remove(&i.to_be_bytes()));
    }
    tree.validate().unwrap();
    for i in 0..N {
        let found = tree.lookup(&i.to_be_bytes());
        if i % 4 == 0 {
            assert_eq!(found, None, "key {i} should be gone");
        } else {
            assert_eq!(found, Some(&(i as u64).to_le_bytes()[..]), "key {i}");
        }
    }

    // reinsert the dropped quarter, then drain the tree completely
    for i in (0..N).step_by(4) {
        tree.insert(&i.to_be_bytes(), &(i as u64).to_le_bytes())
            .unwrap();
    }
    for i in 0..N {
        assert_eq!(tree.lookup(&i.to_be_bytes()), Some(&(i as u64).to_le_bytes()[..]));
    }
    for i in 0..N {
        assert!(tree.remove(&i.to_be_bytes()), "key {i}");
    }
    tree.validate().unwrap();

    let mut remaining = 0;
    tree.for_each(|_, _| remaining += 1);
    assert_eq!(remaining, 0);

    tree.clear().unwrap();
    assert_eq!(tree.live_pages(), 1);
}

#[test]
fn shared_prefix_key_ladder() {
    let mut tree = BTree::new().unwrap();
    for i in 1..=16usize {
        tree.insert("A".repeat(i).as_bytes(), &(i as u64).to_le_bytes())
            .unwrap();
    }
    tree.validate().unwrap();

    assert_eq!(
        tree.lookup("A".repeat(8).as_bytes()),
        Some(&8u64.to_le_bytes()[..])
    );
    for i in 1..=16usize {
        assert_eq!(
            tree.lookup("A".repeat(i).as_bytes()),
            Some(&(i as u64).to_le_bytes()[..]),
            "ladder step {i}"
        );
    }
}

#[test]
fn prefix_ladder_with_removals() {
    let mut tree = BTree::new().unwrap();
    for i in 0..200usize {
        tree.insert("A".repeat(i).as_bytes(), &(i as u64).to_le_bytes())
            .unwrap();
    }
    tree.validate().unwrap();

    for i in (0..200usize).step_by(2) {
        assert!(tree.remove("A".repeat(i).as_bytes()), "even step {i}");
    }
    tree.validate().unwrap();

    for i in 0..200usize {
        let found = tree.lookup("A".repeat(i).as_bytes());
        if i % 2 == 0 {
            assert_eq!(found, None, "even step {i} should be gone");
        } else {
            assert_eq!(found, Some(&(i as u64).to_le_bytes()[..]), "odd step {i}");
        }
    }
}

#[test]
fn url_like_random_keys() {
    const N: usize = 30_000;
    let mut rng = SmallRng::seed_from_u64(0xF00D);
    let hosts = [
        "alpha.example.com",
        "beta.example.org",
        "cdn.static.example.net",
        "shop.example.io",
    ];

    let mut keys: Vec<Vec<u8>> = (0..N)
        .map(|i| {
            let host = hosts[rng.gen_range(0..hosts.len())];
            let depth = rng.gen_range(1..5);
            let mut url = format!("https://{host}");
            for _ in 0..depth {
                let seg_len = rng.gen_range(2..16);
                url.push('/');
                for _ in 0..seg_len {
                    url.push(rng.gen_range(b'a'..=b'z') as char);
                }
            }
            // the id suffix keeps every key distinct
            url.push_str(&format!("?id={i:08x}"));
            url.into_bytes()
        })
        .collect();
    keys.shuffle(&mut rng);

    let mut tree = BTree::new().unwrap();
    for (i, key) in keys.iter().enumerate() {
        tree.insert(key, &(i as u64).to_le_bytes()).unwrap();
    }
    tree.validate().unwrap();

    for (i, key) in keys.iter().enumerate() {
        assert_eq!(tree.lookup(key), Some(&(i as u64).to_le_bytes()[..]));
    }

    // delete a random half
    for (i, key) in keys.iter().enumerate() {
        if i % 2 == 0 {
            assert!(tree.remove(key));
        }
    }
    tree.validate().unwrap();
    for (i, key) in keys.iter().enumerate() {
        let found = tree.lookup(key);
        if i % 2 == 0 {
            assert_eq!(found, None);
        } else {
            assert_eq!(found, Some(&(i as u64).to_le_bytes()[..]));
        }
    }
}

#[test]
fn large_payloads_force_splits() {
    let mut tree = BTree::new().unwrap();
    let payload = [0x5A; 900];
    for i in 0..10u32 {
        tree.insert(format!("payload-{i:02}").as_bytes(), &payload)
            .unwrap();
    }

    // 10 entries of ~910 bytes cannot share one 4096-byte page
    assert!(tree.depth() >= 2);
    assert!(tree.live_pages() >= 3);
    tree.validate().unwrap();

    for i in 0..10u32 {
        assert_eq!(
            tree.lookup(format!("payload-{i:02}").as_bytes()),
            Some(&payload[..])
        );
    }
}

#[test]
fn stress_against_reference_model() {
    const OPS: u64 = 100_000;
    let mut rng = SmallRng::seed_from_u64(42);

    // a mixed-shape key universe: short, structured, and long keys
    let universe: Vec<Vec<u8>> = (0..5_000usize)
        .map(|i| {
            match i % 3 {
                0 => format!("user:{i:06}"),
                1 => format!("url:https://example.com/products/{i}/details"),
                _ => format!("k{i}"),
            }
            .into_bytes()
        })
        .collect();

    let mut tree = BTree::new().unwrap();
    let mut model: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

    for op in 0..OPS {
        let key = &universe[rng.gen_range(0..universe.len())];
        if rng.gen_bool(0.5) {
            tree.insert(key, &op.to_le_bytes()).unwrap();
            model.insert(key.clone(), op);
        } else {
            let removed = tree.remove(key);
            assert_eq!(removed, model.remove(key).is_some());
        }
        if op % 10_000 == 0 {
            let probe = &universe[rng.gen_range(0..universe.len())];
            assert_eq!(
                tree.lookup(probe),
                model.get(probe).map(|v| v.to_le_bytes().to_vec()).as_deref()
            );
        }
    }
    tree.validate().unwrap();

    // both sides enumerate the identical ordered key set
    let mut entries: Vec<(Vec<u8>, u64)> = Vec::new();
    tree.for_each(|key, payload| {
        entries.push((
            key.to_vec(),
            u64::from_le_bytes(payload.try_into().expect("payloads are 8 bytes")),
        ));
    });
    let expected: Vec<(Vec<u8>, u64)> = model.iter().map(|(k, &v)| (k.clone(), v)).collect();
    assert_eq!(entries, expected);
}

#[test]
fn remove_of_absent_keys_leaves_tree_untouched() {
    let mut tree = BTree::new().unwrap();
    for i in 0..1_000u32 {
        tree.insert(format!("key{i:05}").as_bytes(), &i.to_le_bytes())
            .unwrap();
    }

    let mut before: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    tree.for_each(|k, v| before.push((k.to_vec(), v.to_vec())));

    for probe in ["", "aaaa", "key00500x", "key99999", "zzzzzz"] {
        assert!(!tree.remove(probe.as_bytes()));
    }

    let mut after: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    tree.for_each(|k, v| after.push((k.to_vec(), v.to_vec())));
    assert_eq!(before, after);
    tree.validate().unwrap();
}

#[test]
fn page_accounting_shrinks_after_clear_and_reuse() {
    let mut tree = BTree::new().unwrap();
    for i in 0..4_000u32 {
        tree.insert(format!("k{i:06}").as_bytes(), &[0xEE; 24]).unwrap();
    }
    let grown = tree.live_pages();
    assert!(grown > 10);

    tree.clear().unwrap();
    assert_eq!(tree.live_pages(), 1);

    // rebuilding reuses the freed page ids instead of growing further
    for i in 0..4_000u32 {
        tree.insert(format!("k{i:06}").as_bytes(), &[0xEE; 24]).unwrap();
    }
    assert!(tree.live_pages() <= grown);
    tree.validate().unwrap();
}
