use seqflow::prelude::*;
use std::fmt::Debug;

// Stopping a drive after k items must yield exactly the first k items of the
// full run, for every k up to the full length
async fn assert_prefixes<S, M>(make: M)
where
    M: Fn() -> S,
    S: Sequence,
    S::Item: PartialEq + Debug,
{
    let full = make().to_vec().await;
    assert!(!full.is_empty());
    for k in 1..=full.len() {
        let mut seen = Vec::new();
        make()
            .drive(|item| {
                seen.push(item);
                seen.len() < k
            })
            .await;
        assert_eq!(seen[..], full[..k], "stopped after {} items", k);
    }
}

#[tokio::test]
async fn test_zip_prefixes() {
    assert_prefixes(|| zip(range(0u32, 6, 1), from_string("abcdefgh"))).await;
    assert_prefixes(|| zip_slices(vec![1, 2, 3], vec!["x", "y", "z"])).await;
}

#[tokio::test]
async fn test_zip_fill_prefixes() {
    assert_prefixes(|| zip_fill(from_iter(vec![1, 2]), from_string("abcde"), 0, '-')).await;
    assert_prefixes(|| from_string("abcde").zip_fill(range(0, 2, 1), '-', -1)).await;
}

#[tokio::test]
async fn test_product_prefixes() {
    assert_prefixes(|| product(range(0u8, 3, 1), from_string("xy"))).await;
}

#[tokio::test]
async fn test_permutation_prefixes() {
    assert_prefixes(|| permutations(vec![1, 2, 3, 4], 4)).await;
    assert_prefixes(|| permutations(vec!['a', 'b', 'c', 'd'], 2)).await;
}

#[tokio::test]
async fn test_combination_prefixes() {
    assert_prefixes(|| combinations(vec![1, 2, 3, 4, 5], 3)).await;
}

#[tokio::test]
async fn test_batch_prefixes() {
    assert_prefixes(|| range(0, 11, 1).batch(3)).await;
}

#[tokio::test]
async fn test_pairwise_prefixes() {
    assert_prefixes(|| from_string("lazy").pairwise()).await;
}

#[tokio::test]
async fn test_accumulate_prefixes() {
    assert_prefixes(|| range(1i64, 10, 1).accumulate()).await;
    assert_prefixes(|| from_iter(vec![3, 1, 4, 1, 5]).accumulate_with(|acc: i32, x| acc.max(x))).await;
}

#[tokio::test]
async fn test_range_over_prefixes() {
    assert_prefixes(|| count(0u32, 1).range_over(2, 3, 20)).await;
}

#[tokio::test]
async fn test_chain_all_prefixes() {
    assert_prefixes(|| chain_all(vec![from_iter(vec![1, 2]), from_iter(vec![]), from_iter(vec![3, 4, 5])])).await;
}

#[tokio::test]
async fn test_index_prefixes() {
    assert_prefixes(|| from_string("seq").index()).await;
}

#[tokio::test]
async fn test_tee_branch_prefixes() {
    let full: Vec<u32> = (0..12).collect();
    for k in 1..=full.len() {
        let mut branches = tee(from_iter(full.clone()), 3);
        let third = branches.pop().unwrap();
        let second = branches.pop().unwrap();
        let first = branches.pop().unwrap();

        let mut seen = Vec::new();
        first
            .drive(|x| {
                seen.push(x);
                seen.len() < k
            })
            .await;
        assert_eq!(seen[..], full[..k]);

        // Stopping one branch leaves the others whole
        assert_eq!(second.to_vec().await, full);
        assert_eq!(third.limit(k).to_vec().await, full[..k]);
    }
}
