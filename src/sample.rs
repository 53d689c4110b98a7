use crate::colorspace::ColorVector;
use rand::Rng;

/// Picks at most `max_count` vectors, each with equal probability.
///
/// Partial Fisher-Yates: only the first `max_count` positions are shuffled, and the rest is dropped.
/// Populations that already fit are returned untouched, in original order.
pub fn subsample<R: Rng + ?Sized>(mut vectors: Vec<ColorVector>, max_count: usize, rng: &mut R) -> Vec<ColorVector> {
    let len = vectors.len();
    if len <= max_count {
        return vectors;
    }
    for i in 0..max_count {
        let j = rng.random_range(i..len);
        vectors.swap(i, j);
    }
    vectors.truncate(max_count);
    vectors
}

#[cfg(test)]
fn numbered(n: usize) -> Vec<ColorVector> {
    (0..n).map(|i| ColorVector([i as f32, 0., 0., 1.])).collect()
}

#[test]
fn small_population_is_unchanged() {
    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(0);
    let v = numbered(10);
    assert_eq!(v, subsample(v.clone(), 10, &mut rng));
    assert_eq!(v, subsample(v.clone(), 1000, &mut rng));
    assert!(subsample(Vec::new(), 5, &mut rng).is_empty());
}

#[test]
fn large_population_is_bounded_and_varies() {
    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(0);
    let first = subsample(numbered(1000), 50, &mut rng);
    assert_eq!(50, first.len());

    let mut keys: Vec<_> = first.iter().map(|v| v.0[0] as u32).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(50, keys.len(), "no element may be picked twice");

    let varied = (0..10).any(|_| subsample(numbered(1000), 50, &mut rng) != first);
    assert!(varied);
    assert_ne!(numbered(50), first, "must not be a fixed prefix");
}

#[test]
fn selection_is_roughly_uniform() {
    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(7);
    let mut hits = [0u32; 20];
    for _ in 0..5000 {
        for v in subsample(numbered(20), 5, &mut rng) {
            hits[v.0[0] as usize] += 1;
        }
    }
    // expected 1250 each
    assert!(hits.iter().all(|&h| (1000..1500).contains(&h)), "{hits:?}");
}
