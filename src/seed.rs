use crate::colorspace::ColorVector;
use rand::Rng;

/// k-means++ initialization: after a uniformly random first center, every next center is drawn
/// with probability proportional to its squared distance from the nearest center chosen so far.
///
/// Returns no centers for empty `samples`.
pub fn kmeans_plus_plus<R: Rng + ?Sized>(samples: &[ColorVector], num_centers: usize, rng: &mut R) -> Vec<ColorVector> {
    if samples.is_empty() || num_centers == 0 {
        return Vec::new();
    }

    let mut centers = Vec::with_capacity(num_centers);
    let first = samples[rng.random_range(0..samples.len())];
    centers.push(first);

    let mut dists = CenterDistances::new(samples, first);
    while centers.len() < num_centers {
        let center = samples[dists.sample(rng)];
        centers.push(center);
        dists.update(center);
    }
    centers
}

/// Squared distance from every sample to its nearest chosen center
struct CenterDistances<'s> {
    samples: &'s [ColorVector],
    distances: Vec<f64>,
    sum: f64,
}

impl<'s> CenterDistances<'s> {
    fn new(samples: &'s [ColorVector], center: ColorVector) -> Self {
        let distances: Vec<f64> = samples.iter().map(|s| f64::from(s.dist_squared(&center))).collect();
        let sum = distances.iter().sum();
        Self { samples, distances, sum }
    }

    fn update(&mut self, new_center: ColorVector) {
        self.sum = 0.;
        for (dist, s) in self.distances.iter_mut().zip(self.samples) {
            let d = f64::from(s.dist_squared(&new_center));
            if d < *dist {
                *dist = d;
            }
            self.sum += *dist;
        }
    }

    /// Index of a sample, weighted by distance. Rounding may exhaust the sum, then it's the last one.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let mut remaining = rng.random::<f64>() * self.sum;
        for (i, &dist) in self.distances.iter().enumerate() {
            remaining -= dist;
            if remaining < 0. {
                return i;
            }
        }
        self.distances.len() - 1
    }
}

#[test]
fn seeds_requested_count() {
    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(0);
    let samples: Vec<_> = (0..100).map(|i| ColorVector([i as f32, 0., 0., 0.])).collect();
    let centers = kmeans_plus_plus(&samples, 8, &mut rng);
    assert_eq!(8, centers.len());
    assert!(centers.iter().all(|c| samples.contains(c)));
}

#[test]
fn never_picks_an_already_covered_point() {
    use rand::SeedableRng;
    // two far apart clusters of identical points: the second center can only come from the other cluster
    let mut samples = vec![ColorVector([0.; 4]); 50];
    samples.extend(vec![ColorVector([100.; 4]); 3]);
    for seed in 0..20 {
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(seed);
        let centers = kmeans_plus_plus(&samples, 2, &mut rng);
        assert_ne!(centers[0], centers[1]);
    }
}

#[test]
fn weighted_sampling_falls_back_to_last() {
    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(0);
    let samples = [ColorVector([0.; 4]); 4];
    let dists = CenterDistances::new(&samples, ColorVector([0.; 4]));
    assert_eq!(0., dists.sum);
    assert_eq!(3, dists.sample(&mut rng));
}

#[test]
fn update_keeps_minimum() {
    let samples = [ColorVector([0.; 4]), ColorVector([10., 0., 0., 0.])];
    let mut dists = CenterDistances::new(&samples, ColorVector([10., 0., 0., 0.]));
    assert_eq!(vec![100., 0.], dists.distances);
    dists.update(ColorVector([1., 0., 0., 0.]));
    assert_eq!(vec![1., 0.], dists.distances);
    assert_eq!(1., dists.sum);
}
