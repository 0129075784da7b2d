//! Integration test: Monte Carlo splitting

use mccv::data::{Dataset, QuadraticBenchmark};
use mccv::training::{CrossValidationConfig, MonteCarloSplitter};
use std::collections::HashSet;

fn dataset(n: usize) -> Dataset {
    QuadraticBenchmark::new(n).with_seed(3).generate().unwrap()
}

#[test]
fn test_partitions_are_disjoint_with_rounded_sizes() {
    for (n, fraction, expected) in [(100, 0.8, 80), (33, 0.5, 17), (10, 0.25, 3)] {
        let config = CrossValidationConfig::new(50, fraction).unwrap().with_seed(n as u64);
        let data = dataset(n);
        let partitions = MonteCarloSplitter::new(&config).unwrap().split(&data).unwrap();

        assert_eq!(partitions.len(), 50);
        for partition in &partitions {
            assert_eq!(partition.train.len(), expected);
            assert_eq!(partition.test.len(), n - expected);

            let train: HashSet<&str> = partition.train.iter().map(|o| o.id()).collect();
            assert!(partition.test.iter().all(|o| !train.contains(o.id())));
        }
    }
}

#[test]
fn test_test_sets_overlap_across_partitions() {
    let config = CrossValidationConfig::new(200, 0.8).unwrap().with_seed(17);
    let splits = MonteCarloSplitter::new(&config).unwrap().split_indices(50).unwrap();

    let mut appearances = vec![0usize; 50];
    for split in &splits {
        for &i in &split.test_indices {
            appearances[i] += 1;
        }
    }
    // 200 independent draws of 10 test rows out of 50
    assert_eq!(appearances.iter().sum::<usize>(), 2000);
    assert!(appearances.iter().any(|&c| c > 1));
}

#[test]
fn test_same_seed_same_partitions() {
    let data = dataset(40);
    let config = CrossValidationConfig::new(10, 0.7).unwrap().with_seed(8);
    let splitter = MonteCarloSplitter::new(&config).unwrap();

    let ids = |seeded: &MonteCarloSplitter| -> Vec<Vec<String>> {
        seeded
            .split(&data)
            .unwrap()
            .iter()
            .map(|p| p.test.iter().map(|o| o.id().to_string()).collect())
            .collect()
    };
    assert_eq!(ids(&splitter), ids(&splitter));
}

#[test]
fn test_unseeded_splits_still_valid() {
    let config = CrossValidationConfig::new(5, 0.6).unwrap();
    let splits = MonteCarloSplitter::new(&config).unwrap().split_indices(20).unwrap();
    assert_eq!(splits.len(), 5);
    assert!(splits.iter().all(|s| s.train_indices.len() == 12 && s.test_indices.len() == 8));
}
