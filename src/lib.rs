//! Reduces RGBA images to a palette of a fixed size, using k-means clustering
//! seeded with k-means++, in sRGB or CIELAB.
//!
//! ```rust,ignore
//! let mut liq = kquant::new();
//! liq.set_palette_size(16)?;
//! let img = liq.new_image(pixels, width, height)?;
//! let mut res = liq.quantize(&img)?;
//! let (palette, indices) = res.remapped(&img)?;
//! ```
//!
//! Decoding and encoding image files is outside of the scope of this library.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::inline_always)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::wildcard_imports)]

mod attr;
mod colorspace;
mod error;
mod image;
mod kmeans;
mod pal;
mod quant;
mod remap;
mod rows;
mod sample;
mod seed;

/// Lower-level building blocks of [`Attributes::quantize`]
pub use crate::kmeans::ColorClusters;
/// Lower-level building blocks of [`Attributes::quantize`]
pub use crate::sample::subsample;
/// Lower-level building blocks of [`Attributes::quantize`]
pub use crate::seed::kmeans_plus_plus;

pub use crate::attr::{Attributes, ControlFlow};
pub use crate::attr::{DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_SAMPLE_PIXELS, DEFAULT_PALETTE_SIZE};
pub use crate::colorspace::{lab_to_xyz, linear_rgb_to_xyz, linear_to_srgb, srgb_to_linear, xyz_to_lab, xyz_to_linear_rgb};
pub use crate::colorspace::{ColorSpace, ColorVector, LAB_ALPHA_SCALE};
pub use crate::error::Error;
pub use crate::image::Image;
pub use crate::pal::{PalIndex, MAX_COLORS, RGBA, RGBA16};
pub use crate::quant::QuantizationResult;

#[cfg(feature = "threads")]
mod rayoff {
    pub(crate) use rayon::prelude::*;
    pub(crate) use thread_local::ThreadLocal;
}

#[cfg(not(feature = "threads"))]
mod rayoff;

/// Start here: creates new handle for library configuration
///
/// See [`Attributes`]
#[inline(always)]
#[must_use]
pub fn new() -> Attributes {
    Attributes::new()
}

#[doc(hidden)]
pub fn _unstable_internal_kmeans_bench() -> impl FnMut() {
    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(1);
    let samples: Vec<ColorVector> = (0..100_000u32)
        .map(|i| ColorSpace::Lab.to_vector8(RGBA::new(i as u8, (i >> 8) as u8, (i >> 3) as u8, 255)))
        .collect();
    move || {
        if let Ok(mut clusters) = ColorClusters::new(&samples, 256.min(MAX_COLORS), &mut rng) {
            for _ in 0..DEFAULT_MAX_ITERATIONS {
                clusters.iterate();
            }
        }
    }
}

#[test]
fn copy_img() {
    let tmp = vec![RGBA::new(1, 2, 3, 4); 10 * 100];
    let liq = Attributes::new();
    let _ = Image::new_stride_copy(&liq, &tmp, 10, 100, 10).unwrap();
}

#[test]
fn thread() {
    let liq = Attributes::new();
    std::thread::spawn(move || {
        let b = vec![RGBA::new(0, 0, 0, 0); 1];
        liq.new_image_borrowed(&b, 1, 1).unwrap();
    }).join().unwrap();
}

#[test]
fn r_callback_test() {
    use std::sync::atomic::AtomicU16;
    use std::sync::atomic::Ordering::SeqCst;
    use std::sync::Arc;

    let called = Arc::new(AtomicU16::new(0));
    let called2 = called.clone();
    let res = {
        let mut a = new();
        a.set_seed(7);
        let called = called.clone();
        let mut img = Image::new_fn(&a, move |output_row: &mut [RGBA16], y: usize| {
            assert!(y < 5);
            assert_eq!(123, output_row.len());
            for (n, out) in output_row.iter_mut().enumerate() {
                let n = n as u16;
                *out = RGBA16::new(n * 500, n * 300, n * 100, 65535);
            }
            called.fetch_add(1, SeqCst);
        }, 123, 5).unwrap();
        let res = a.quantize(&img).unwrap();
        img = Image::new_fn(&a, |row: &mut [RGBA16], _| row.fill(RGBA16::new(0, 0, 0, 65535)), 123, 5).unwrap();
        let mut res = res;
        let (_, idx) = res.remapped(&img).unwrap();
        assert!(idx.iter().all(|&i| i == idx[0]));
        res
    };
    assert_eq!(5, called2.load(SeqCst));
    assert!(called.load(SeqCst) > 0);

    let pal = res.palette();
    assert_eq!(256, pal.len());
    assert!(pal.iter().all(|c| c.a == 255));
    assert!(res.quantization_error().is_some_and(|e| e >= 0.));
    assert_eq!(pal, &res.palette_vec()[..]);
}

#[test]
fn poke_it() {
    let width = 10usize;
    let height = 10usize;
    let mut fakebitmap = vec![RGBA::new(255, 255, 255, 255); width * height];

    fakebitmap[0].r = 0x55;
    fakebitmap[0].g = 0x66;
    fakebitmap[0].b = 0x77;

    // Configure the library
    let mut liq = Attributes::new();
    liq.set_palette_size(16).unwrap();
    liq.set_color_space(ColorSpace::Rgb);

    // Describe the bitmap
    let img = liq.new_image(&fakebitmap[..], width, height).unwrap();

    // The magic happens in quantize()
    let mut res = match liq.quantize(&img) {
        Ok(res) => res,
        Err(err) => panic!("Quantization failed, because: {err:?}"),
    };

    // You can reuse the result to generate several images with the same palette
    let (palette, pixels) = res.remapped(&img).unwrap();

    assert_eq!(width * height, pixels.len());
    assert_eq!(16, palette.len());
    assert_eq!(Some(0.), res.quantization_error());
    assert_eq!(RGBA::new(0x55, 0x66, 0x77, 255), palette[0]);
    assert_eq!(RGBA::new(255, 255, 255, 255), palette[1]);
    assert!(palette[2..].iter().all(|&c| c == palette[0]));
    assert_eq!(0, pixels[0]);
    assert!(pixels[1..].iter().all(|&i| i == 1));
}

#[test]
fn two_by_two_end_to_end() {
    let red = RGBA::new(255, 0, 0, 255);
    let blue = RGBA::new(0, 0, 255, 255);
    for color_space in [ColorSpace::Rgb, ColorSpace::Lab] {
        let mut liq = new();
        liq.set_palette_size(2).unwrap();
        liq.set_color_space(color_space);
        let img = liq.new_image(vec![red, blue, blue, red], 2, 2).unwrap();
        let mut res = liq.quantize(&img).unwrap();
        let (palette, idx) = res.remapped(&img).unwrap();
        assert_eq!(2, palette.len());
        assert!(palette.contains(&red) && palette.contains(&blue), "{palette:?}");
        for (px, i) in [red, blue, blue, red].iter().zip(&idx) {
            assert_eq!(*px, palette[usize::from(*i)]);
        }
    }
}

#[test]
fn palette_size_is_exact() {
    let px: Vec<RGBA> = (0..64 * 64u32).map(|i| RGBA::new((i * 7) as u8, (i >> 4) as u8, (i * 13 >> 3) as u8, 255)).collect();
    for size in [1, 2, 3, 17, 100, MAX_COLORS as u32] {
        let mut liq = new();
        liq.set_seed(size.into());
        liq.set_palette_size(size).unwrap();
        liq.set_max_cluster_iterations(2).unwrap();
        let img = liq.new_image_borrowed(&px, 64, 64).unwrap();
        let mut res = liq.quantize(&img).unwrap();
        assert_eq!(size as usize, res.palette_len());
        let (palette, idx) = res.remapped(&img).unwrap();
        assert_eq!(size as usize, palette.len());
        assert!(idx.iter().all(|&i| usize::from(i) < palette.len()));
    }
}

#[test]
fn same_seed_same_palette() {
    let px: Vec<RGBA> = (0..5000u32).map(|i| RGBA::new(i as u8, (i / 20) as u8, (i % 77) as u8, 255)).collect();
    let quantize = |seed| {
        let mut liq = new();
        liq.set_seed(seed);
        liq.set_palette_size(8).unwrap();
        liq.set_max_sample_pixels(4000).unwrap();
        let img = liq.new_image_borrowed(&px, 100, 50).unwrap();
        liq.quantize(&img).unwrap().palette_vec()
    };
    assert_eq!(quantize(99), quantize(99));
}

#[test]
fn empty_image_fails() {
    let liq = new();
    assert_eq!(Error::EmptyImage, liq.new_image(Vec::<RGBA>::new(), 0, 0).err().unwrap());
    assert_eq!(Error::EmptyImage, Image::new_fn(&liq, |_: &mut [RGBA16], _: usize| {}, 5, 0).err().unwrap());
}
