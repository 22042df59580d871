use quickcheck::{quickcheck, TestResult};
use seqflow::prelude::*;
use tokio_test::block_on;

fn limit_cardinality(items: Vec<i32>, n: u8) -> bool {
    let n = n as usize;
    let out = block_on(from_iter(items.clone()).limit(n).to_vec());
    out.len() == n.min(items.len()) && out[..] == items[..out.len()]
}

fn early_termination_prefix(items: Vec<u16>, k: u8) -> TestResult {
    if items.is_empty() {
        return TestResult::discard();
    }
    let k = (k as usize).max(1);
    let full = block_on(from_iter(items.clone()).apply(|x| x as u32 * 3).to_vec());

    let mut prefix = Vec::new();
    block_on(from_iter(items).apply(|x| x as u32 * 3).drive(|x| {
        prefix.push(x);
        prefix.len() < k
    }));
    TestResult::from_bool(prefix[..] == full[..prefix.len()] && prefix.len() == k.min(full.len()))
}

fn tee_replays_source(items: Vec<u8>, n: u8) -> TestResult {
    let n = (n % 6) as usize;
    let branches = tee(from_iter(items.clone()), n);
    if branches.len() != n {
        return TestResult::failed();
    }
    // Drain the branches in reverse creation order
    let all_match = branches.into_iter().rev().all(|branch| block_on(branch.to_vec()) == items);
    TestResult::from_bool(all_match)
}

fn batch_flattens_back(items: Vec<i64>, size: u8) -> TestResult {
    if size == 0 {
        return TestResult::discard();
    }
    let batches = block_on(from_iter(items.clone()).batch(size as usize).to_vec());
    let sizes_ok = batches.iter().rev().skip(1).all(|b| b.len() == size as usize);
    let flattened: Vec<i64> = batches.into_iter().flatten().collect();
    TestResult::from_bool(sizes_ok && flattened == items)
}

fn pool_preserves_multiset(items: Vec<u32>, workers: u8) -> TestResult {
    let workers = (workers % 8) as usize + 1;
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(_) => return TestResult::error("failed to build runtime"),
    };
    let mut out = runtime.block_on(pool(items.clone(), workers).to_vec());
    let mut expected = items;
    out.sort_unstable();
    expected.sort_unstable();
    TestResult::from_bool(out == expected)
}

#[test]
fn property_limit_cardinality() {
    quickcheck(limit_cardinality as fn(Vec<i32>, u8) -> bool);
}

#[test]
fn property_early_termination_prefix() {
    quickcheck(early_termination_prefix as fn(Vec<u16>, u8) -> TestResult);
}

#[test]
fn property_tee_replays_source() {
    quickcheck(tee_replays_source as fn(Vec<u8>, u8) -> TestResult);
}

#[test]
fn property_batch_flattens_back() {
    quickcheck(batch_flattens_back as fn(Vec<i64>, u8) -> TestResult);
}

#[test]
fn property_pool_preserves_multiset() {
    quickcheck(pool_preserves_multiset as fn(Vec<u32>, u8) -> TestResult);
}
