//! Rendezvous (highest random weight) placement.

use crate::ShardingError;
use twox_hash::XxHash64;

/// Score of `node` for `key`. Higher wins.
fn score(key: &str, node: &str) -> u64 {
    let mut buf = Vec::with_capacity(key.len() + node.len() + 1);
    buf.extend_from_slice(key.as_bytes());
    buf.push(0);
    buf.extend_from_slice(node.as_bytes());
    XxHash64::oneshot(0, &buf)
}

/// Order `nodes` by preference for `key`.
///
/// Duplicates are removed; equal scores fall back to lexical node order so the
/// result does not depend on the input order.
pub fn rank_nodes(key: &str, nodes: &[String]) -> Vec<String> {
    let mut unique: Vec<&String> = nodes.iter().collect();
    unique.sort();
    unique.dedup();

    let mut scored: Vec<(u64, &String)> = unique.into_iter().map(|n| (score(key, n), n)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, n)| n.clone()).collect()
}

/// Pick `factor` owners for `key` out of `nodes`.
pub fn select_owners(key: &str, nodes: &[String], factor: u32) -> Result<Vec<String>, ShardingError> {
    if factor == 0 {
        return Err(ShardingError::ZeroReplication);
    }
    let ranked = rank_nodes(key, nodes);
    if ranked.is_empty() {
        return Err(ShardingError::NoNodes);
    }
    if ranked.len() < factor as usize {
        return Err(ShardingError::NotEnoughNodes {
            factor,
            available: ranked.len(),
        });
    }
    Ok(ranked.into_iter().take(factor as usize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_is_independent_of_input_order() {
        let a = rank_nodes("shard-1", &nodes(&["n1", "n2", "n3", "n4"]));
        let b = rank_nodes("shard-1", &nodes(&["n4", "n3", "n1", "n2", "n1"]));
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_select_owners() {
        let owners = select_owners("tenant-a", &nodes(&["n1", "n2", "n3"]), 2).unwrap();
        assert_eq!(owners.len(), 2);
        assert_ne!(owners[0], owners[1]);
    }

    #[test]
    fn test_select_owners_errors() {
        assert_eq!(select_owners("k", &[], 1), Err(ShardingError::NoNodes));
        assert_eq!(
            select_owners("k", &nodes(&["n1"]), 2),
            Err(ShardingError::NotEnoughNodes { factor: 2, available: 1 })
        );
        assert_eq!(select_owners("k", &nodes(&["n1"]), 0), Err(ShardingError::ZeroReplication));
    }

    #[test]
    fn test_adding_a_node_moves_few_keys() {
        let before = nodes(&["n1", "n2", "n3"]);
        let after = nodes(&["n1", "n2", "n3", "n4"]);
        let moved = (0..200)
            .filter(|i| {
                let key = format!("key-{}", i);
                let old = &rank_nodes(&key, &before)[0];
                let new = &rank_nodes(&key, &after)[0];
                old != new && new != "n4"
            })
            .count();
        assert_eq!(moved, 0);
    }
}
