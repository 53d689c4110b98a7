use crate::colorspace::ColorVector;
use crate::error::Error;
use crate::pal::{nearest_center, Centers, MAX_COLORS};
use crate::rayoff::*;
use crate::seed::kmeans_plus_plus;
use rand::Rng;
use std::collections::HashSet;

/// Samples per parallel work item. Each one gets its own set of sums.
const CHUNK_SIZE: usize = 1024;

/// Centers being refined, and the (possibly subsampled) colors they are fitted to
pub struct ColorClusters<'s> {
    centers: Centers,
    samples: &'s [ColorVector],
}

impl<'s> ColorClusters<'s> {
    /// Seeds `num_centers` centers with k-means++.
    ///
    /// If the samples have no more distinct colors than that, the distinct colors become the centers
    /// (in order of first appearance), and there may be fewer centers than requested.
    pub fn new<R: Rng + ?Sized>(samples: &'s [ColorVector], num_centers: usize, rng: &mut R) -> Result<Self, Error> {
        if samples.is_empty() {
            return Err(Error::EmptyImage);
        }
        if !(1..=MAX_COLORS).contains(&num_centers) {
            return Err(Error::ValueOutOfRange);
        }

        let centers = match unique_colors(samples, num_centers) {
            Some(unique) => unique,
            None => kmeans_plus_plus(samples, num_centers, rng).into_iter().collect(),
        };
        Ok(Self { centers, samples })
    }

    #[inline]
    #[must_use]
    pub fn centers(&self) -> &[ColorVector] {
        &self.centers
    }

    #[inline]
    pub(crate) fn into_centers(self) -> Centers {
        self.centers
    }

    #[inline]
    #[must_use]
    pub fn samples(&self) -> &'s [ColorVector] {
        self.samples
    }

    /// One step of Lloyd's algorithm: assigns every sample to its nearest center, then moves
    /// centers to the mean of their samples. Centers that got no samples stay where they were.
    ///
    /// Returns mean squared distance of samples to the centers they were assigned to.
    #[inline(never)]
    pub fn iterate(&mut self) -> f64 {
        let centers = &self.centers[..];
        let len = centers.len();

        // one accumulator per chunk, merged in chunk order, so thread scheduling can't change the f32 sums
        let partials: Vec<Kmeans> = self.samples.par_chunks(CHUNK_SIZE).map(|batch| {
            let mut kmeans = Kmeans::new(len);
            kmeans.iterate_batch(batch, centers);
            kmeans
        }).collect();

        // all workers are done, so nobody reads the centers while they're replaced
        let diff = partials.into_iter()
            .reduce(Kmeans::merge)
            .map(|kmeans| kmeans.finalize(&mut self.centers))
            .unwrap_or(0.);

        diff / self.samples.len() as f64
    }
}

/// Distinct colors, or `None` if there are more than `limit`
fn unique_colors(samples: &[ColorVector], limit: usize) -> Option<Centers> {
    let mut seen = HashSet::with_capacity(limit + 1);
    let mut unique = Centers::new();
    for s in samples {
        if seen.insert(s.key()) {
            if unique.len() == limit {
                return None;
            }
            unique.push(*s);
        }
    }
    Some(unique)
}

/// Per-worker sums for the next centers
pub(crate) struct Kmeans {
    sums: Vec<ColorVector>,
    counts: Vec<usize>,
    diff_sum: f64,
}

impl Kmeans {
    #[inline]
    pub fn new(len: usize) -> Self {
        Self {
            sums: vec![ColorVector::default(); len],
            counts: vec![0; len],
            diff_sum: 0.,
        }
    }

    fn iterate_batch(&mut self, batch: &[ColorVector], centers: &[ColorVector]) {
        for px in batch {
            let (matched, diff) = nearest_center(centers, px);
            self.sums[matched] += *px;
            self.counts[matched] += 1;
            self.diff_sum += f64::from(diff);
        }
    }

    #[inline]
    pub fn merge(mut self, new: Kmeans) -> Kmeans {
        self.diff_sum += new.diff_sum;
        self.sums.iter_mut().zip(new.sums).for_each(|(s, n)| *s += n);
        self.counts.iter_mut().zip(new.counts).for_each(|(c, n)| *c += n);
        self
    }

    /// Moves centers to their means, returns the total error
    pub fn finalize(self, centers: &mut [ColorVector]) -> f64 {
        for ((center, sum), count) in centers.iter_mut().zip(self.sums).zip(self.counts) {
            if count > 0 {
                *center = sum.scale(1. / count as f32);
            }
        }
        self.diff_sum
    }
}

#[cfg(test)]
fn rng(seed: u64) -> rand_xoshiro::Xoshiro256PlusPlus {
    use rand::SeedableRng;
    rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(seed)
}

#[test]
fn few_colors_become_centers() {
    let a = ColorVector([1., 2., 3., 4.]);
    let b = ColorVector([5., 6., 7., 8.]);
    let samples = [a, b, a, a, b];
    let mut clusters = ColorClusters::new(&samples, 4, &mut rng(0)).unwrap();
    assert_eq!(&[a, b], clusters.centers());
    assert_eq!(0., clusters.iterate());
    assert_eq!(&[a, b], clusters.centers());
}

#[test]
fn rejects_bad_input() {
    assert_eq!(Some(Error::EmptyImage), ColorClusters::new(&[], 4, &mut rng(0)).err());
    let samples = [ColorVector::default()];
    assert_eq!(Some(Error::ValueOutOfRange), ColorClusters::new(&samples, 0, &mut rng(0)).err());
    assert_eq!(Some(Error::ValueOutOfRange), ColorClusters::new(&samples, MAX_COLORS + 1, &mut rng(0)).err());
}

#[test]
fn empty_cluster_keeps_center() {
    let samples = [ColorVector([0.; 4]), ColorVector([1.; 4]), ColorVector([2.; 4])];
    let far = ColorVector([1000.; 4]);
    let mut clusters = ColorClusters { centers: [ColorVector([0.; 4]), far].into_iter().collect(), samples: &samples };
    let loss = clusters.iterate();
    assert_eq!((0. + 4. + 16.) / 3., loss);
    assert_eq!(ColorVector([1.; 4]), clusters.centers()[0]);
    assert_eq!(far, clusters.centers()[1]);
}

#[test]
fn loss_never_increases() {
    let mut r = rng(42);
    let samples: Vec<_> = (0..20_000).map(|_| {
        ColorVector([r.random_range(0. ..100.), r.random_range(-50. ..50.), r.random_range(-50. ..50.), 128.])
    }).collect();
    for k in [1, 2, 16, 256] {
        let mut clusters = ColorClusters::new(&samples, k, &mut r).unwrap();
        let mut prev = clusters.iterate();
        for _ in 0..10 {
            let loss = clusters.iterate();
            assert!(loss <= prev * (1. + 1e-5) + 1e-6, "k={k}: {loss} > {prev}");
            prev = loss;
        }
    }
}

#[test]
fn separates_obvious_clusters() {
    let mut r = rng(1);
    let mut samples = Vec::new();
    for center in [[0.; 4], [50.; 4], [100.; 4]] {
        for _ in 0..3000 {
            samples.push(ColorVector(center.map(|c: f32| c + r.random_range(-1. ..1.))));
        }
    }
    let mut clusters = ColorClusters::new(&samples, 3, &mut r).unwrap();
    for _ in 0..10 {
        clusters.iterate();
    }
    let loss = clusters.iterate();
    assert!(loss < 1.5, "{loss}");
    let mut means: Vec<f32> = clusters.centers().iter().map(|c| c.0[0]).collect();
    means.sort_by(f32::total_cmp);
    for (m, expected) in means.iter().zip([0., 50., 100.]) {
        assert!((m - expected).abs() < 0.2, "{means:?}");
    }
}

#[test]
fn merge_adds_up() {
    let centers = [ColorVector([0.; 4]), ColorVector([10.; 4])];
    let mut a = Kmeans::new(2);
    a.iterate_batch(&[ColorVector([1.; 4])], &centers);
    let mut b = Kmeans::new(2);
    b.iterate_batch(&[ColorVector([9.; 4]), ColorVector([3.; 4])], &centers);
    let merged = a.merge(b);
    assert_eq!(vec![2, 1], merged.counts);
    let mut out = centers;
    assert_eq!(4. + 4. + 36., merged.finalize(&mut out));
    assert_eq!(ColorVector([2.; 4]), out[0]);
    assert_eq!(ColorVector([9.; 4]), out[1]);
}

#[test]
fn chunked_sums_are_repeatable() {
    let mut r = rng(9);
    let samples: Vec<_> = (0..CHUNK_SIZE * 7 + 13).map(|_| {
        ColorVector([r.random_range(0. ..100.), r.random_range(-80. ..80.), r.random_range(-80. ..80.), r.random_range(0. ..128.)])
    }).collect();
    let run = || {
        let mut clusters = ColorClusters::new(&samples, 24, &mut rng(3)).unwrap();
        let losses: Vec<f64> = (0..6).map(|_| clusters.iterate()).collect();
        (losses, clusters.into_centers())
    };
    let first = run();
    for _ in 0..4 {
        assert_eq!(first, run());
    }
}
