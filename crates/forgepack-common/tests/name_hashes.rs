//! Reference name hashes shipped with existing pack2 archives.

use forgepack_common::hash::hash_name;

const FIXTURE: &str = include_str!("fixtures/hashes.txt");

fn reference_pairs() -> Vec<(u64, &'static str)> {
    FIXTURE
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (hash, name) = line.split_once(':').expect("hash:name line");
            (u64::from_str_radix(hash, 16).expect("hex hash"), name)
        })
        .collect()
}

#[test]
fn test_reference_hashes_match() {
    let pairs = reference_pairs();
    assert!(pairs.len() >= 10);

    for (expected, name) in pairs {
        assert_eq!(
            hash_name(name),
            expected,
            "hash mismatch for {name:?}: got {:#018x}",
            hash_name(name)
        );
    }
}

#[test]
fn test_lowercase_names_hash_like_reference() {
    for (expected, name) in reference_pairs() {
        assert_eq!(hash_name(&name.to_lowercase()), expected);
    }
}
