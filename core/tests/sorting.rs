//! Ordering properties shared by every sort algorithm

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use splatstorm_core::sort::is_back_to_front;
use splatstorm_core::{
    DepthSorter, PackedSplat, SortAlgorithm, SortOutcome, Splat, quick_sort, radix_sort,
    sort_indices,
};

fn splats_at(depths: &[f32]) -> Vec<PackedSplat> {
    depths
        .iter()
        .enumerate()
        .map(|(i, &z)| {
            PackedSplat::from_splat(&Splat {
                position: [i as f32, 0.0, z],
                ..Default::default()
            })
        })
        .collect()
}

fn random_depths(seed: u64, len: usize) -> Vec<f32> {
    let mut rng = Pcg32::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1000.0..1000.0)).collect()
}

#[test]
fn test_every_algorithm_orders_back_to_front() {
    for seed in 0..5 {
        let depths = random_depths(seed, 1_500);
        for algorithm in SortAlgorithm::ALL {
            let mut splats = splats_at(&depths);
            let mut sorter = DepthSorter::new(splats.len(), algorithm).unwrap();
            assert_eq!(sorter.run(&mut splats), Ok(SortOutcome::Sorted));

            for pair in splats.windows(2) {
                assert!(pair[0].depth() >= pair[1].depth(), "{algorithm} seed {seed}");
            }
            let mut ids: Vec<u32> = splats.iter().map(|s| s.position[0] as u32).collect();
            ids.sort();
            assert_eq!(ids, (0..1_500).collect::<Vec<_>>());
        }
    }
}

#[test]
fn test_index_sorts_agree_on_depths() {
    let depths = random_depths(42, 2_000);
    let splats = splats_at(&depths);

    let radix = sort_indices(&splats, SortAlgorithm::Radix);
    let quick = sort_indices(&splats, SortAlgorithm::Quick);
    assert!(is_back_to_front(&splats, &radix));
    assert!(is_back_to_front(&splats, &quick));

    let radix_depths: Vec<f32> = radix.iter().map(|&i| depths[i as usize]).collect();
    let quick_depths: Vec<f32> = quick.iter().map(|&i| depths[i as usize]).collect();
    assert_eq!(radix_depths, quick_depths);
}

#[test]
fn test_index_sorts_leave_payload_alone() {
    let splats = splats_at(&random_depths(3, 64));
    let before = splats.clone();
    let mut indices: Vec<u32> = (0..64).collect();
    radix_sort(&splats, &mut indices);
    let mut indices: Vec<u32> = (0..64).collect();
    quick_sort(&splats, &mut indices);
    assert_eq!(splats, before);
}

#[test]
fn test_degenerate_depths() {
    let mut splats = splats_at(&[0.0; 257]);
    let mut sorter = DepthSorter::new(257, SortAlgorithm::Bucket).unwrap();
    sorter.run(&mut splats).unwrap();
    assert_eq!(sorter.bucket_histogram().iter().sum::<u32>(), 257);
    assert_eq!(sorter.stats().buckets_used, 1);
    assert_eq!(sorter.stats().depth_range, (0.0, 0.0));
}

#[test]
fn test_same_frame_sorts_once() {
    let mut splats = splats_at(&random_depths(8, 100));
    let mut sorter = DepthSorter::new(100, SortAlgorithm::Bucket).unwrap();
    sorter.advance_frame();
    sorter.run(&mut splats).unwrap();
    sorter.run(&mut splats).unwrap();
    sorter.advance_frame();
    sorter.run(&mut splats).unwrap();
    assert_eq!(sorter.stats().full_sorts, 1);
    assert_eq!(sorter.stats().skipped_sorts, 2);
}
