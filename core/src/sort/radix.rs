use super::DepthKey;

const RADIX_BITS: u32 = 8;
const RADIX: usize = 1 << RADIX_BITS;
const PASSES: u32 = u32::BITS / RADIX_BITS;

/// Integerized depth key whose ascending order is back-to-front.
///
/// The float bits are first mapped so unsigned order matches numeric order
/// (negatives included), then complemented so larger depths get smaller keys.
#[inline]
pub fn depth_key(depth: f32) -> u32 {
    let bits = depth.to_bits();
    let ordered = if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    };
    !ordered
}

/// Stable LSD radix sort of `indices` by the depth of the items they point at.
///
/// Four 8-bit passes, ascending by [`depth_key`]. Only `indices` is permuted.
pub fn radix_sort<T: DepthKey>(items: &[T], indices: &mut [u32]) {
    let mut keys = Vec::with_capacity(indices.len());
    let mut scratch = vec![0u32; indices.len()];
    radix_sort_with(items, indices, &mut keys, &mut scratch);
}

/// [`radix_sort`] using caller-owned scratch.
///
/// `keys` is cleared and refilled with one key per item; `scratch` must be at
/// least as long as `indices`.
pub(crate) fn radix_sort_with<T: DepthKey>(
    items: &[T],
    indices: &mut [u32],
    keys: &mut Vec<u32>,
    scratch: &mut [u32],
) {
    let n = indices.len();
    if n < 2 {
        return;
    }
    let scratch = &mut scratch[..n];

    keys.clear();
    keys.extend(items.iter().map(|item| depth_key(item.depth())));

    for pass in 0..PASSES {
        let shift = pass * RADIX_BITS;
        let digit = |index: u32| ((keys[index as usize] >> shift) as usize) & (RADIX - 1);

        let mut offsets = [0usize; RADIX];
        for &i in indices.iter() {
            offsets[digit(i)] += 1;
        }
        let mut running = 0;
        for slot in offsets.iter_mut() {
            let count = *slot;
            *slot = running;
            running += count;
        }
        for &i in indices.iter() {
            let d = digit(i);
            scratch[offsets[d]] = i;
            offsets[d] += 1;
        }
        indices.copy_from_slice(&scratch[..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_key_reverses_numeric_order() {
        let depths = [-1000.0f32, -1.5, -0.0, 0.0, 0.001, 2.0, 1.0e9];
        for pair in depths.windows(2) {
            assert!(
                depth_key(pair[0]) >= depth_key(pair[1]),
                "{} vs {}",
                pair[0],
                pair[1]
            );
        }
        assert!(depth_key(f32::MAX) < depth_key(f32::MIN));
    }

    #[test]
    fn test_radix_sort_back_to_front() {
        let depths = [3.0f32, -4.0, 10.5, 0.25, 10.5, -0.5];
        let mut indices: Vec<u32> = (0..depths.len() as u32).collect();
        radix_sort(&depths, &mut indices);
        assert_eq!(indices, vec![2, 4, 0, 3, 5, 1]);
    }

    #[test]
    fn test_radix_sort_is_stable_for_ties() {
        let depths = [1.0f32; 5];
        let mut indices = vec![4, 2, 0, 3, 1];
        radix_sort(&depths, &mut indices);
        assert_eq!(indices, vec![4, 2, 0, 3, 1]);
    }

    #[test]
    fn test_radix_sort_permutes_only_indices() {
        let depths = vec![0.1f32, 0.3, 0.2];
        let before = depths.clone();
        let mut indices = vec![0, 1, 2];
        radix_sort(&depths, &mut indices);
        assert_eq!(depths, before);
        assert_eq!(indices, vec![1, 2, 0]);
    }

    #[test]
    fn test_radix_sort_small_inputs() {
        let depths: [f32; 0] = [];
        let mut empty: Vec<u32> = Vec::new();
        radix_sort(&depths, &mut empty);
        assert!(empty.is_empty());

        let mut single = vec![0];
        radix_sort(&[5.0f32], &mut single);
        assert_eq!(single, vec![0]);
    }
}
