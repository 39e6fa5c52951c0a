use super::DepthKey;

/// Quicksort `indices` into strictly back-to-front order.
///
/// Middle-element pivot, partitioning so that deeper items come first. Only
/// `indices` is permuted. The smaller partition is recursed into and the larger
/// one is looped on, which bounds stack depth to `O(log n)`.
pub fn quick_sort<T: DepthKey>(items: &[T], indices: &mut [u32]) {
    let mut slice = indices;
    while slice.len() > 1 {
        let split = partition(items, slice);
        let (left, rest) = std::mem::take(&mut slice).split_at_mut(split);
        // rest[0] is the pivot in its final position
        let right = &mut rest[1..];
        if left.len() < right.len() {
            quick_sort(items, left);
            slice = right;
        } else {
            quick_sort(items, right);
            slice = left;
        }
    }
}

/// Lomuto partition around the middle element. Returns the pivot's final index.
fn partition<T: DepthKey>(items: &[T], indices: &mut [u32]) -> usize {
    let end = indices.len() - 1;
    let mid = end / 2;
    let pivot_depth = items[indices[mid] as usize].depth();
    indices.swap(mid, end);

    let mut store = 0;
    for i in 0..end {
        if items[indices[i] as usize].depth() > pivot_depth {
            indices.swap(i, store);
            store += 1;
        }
    }
    indices.swap(store, end);
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    #[test]
    fn test_quick_sort_back_to_front() {
        let depths = [1.0f32, 5.0, -3.0, 2.5, 9.0];
        let mut indices = vec![0, 1, 2, 3, 4];
        quick_sort(&depths, &mut indices);
        assert_eq!(indices, vec![4, 1, 3, 0, 2]);
    }

    #[test]
    fn test_quick_sort_random_inputs() {
        let mut rng = Pcg32::seed_from_u64(11);
        for len in [0usize, 1, 2, 3, 17, 500] {
            let depths: Vec<f32> = (0..len).map(|_| rng.random_range(-50.0..50.0)).collect();
            let mut indices: Vec<u32> = (0..len as u32).collect();
            quick_sort(&depths, &mut indices);
            assert!(crate::sort::is_back_to_front(&depths, &indices));

            let mut seen = indices.clone();
            seen.sort();
            assert_eq!(seen, (0..len as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_quick_sort_all_equal_is_deterministic() {
        let depths = [2.0f32; 64];
        let mut first: Vec<u32> = (0..64).collect();
        let mut second: Vec<u32> = (0..64).collect();
        quick_sort(&depths, &mut first);
        quick_sort(&depths, &mut second);
        assert_eq!(first, second);
    }
}
