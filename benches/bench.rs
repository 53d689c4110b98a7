#![feature(test)]

extern crate test;
use core::mem::MaybeUninit;
use test::Bencher;

use kquant::*;

fn gradient() -> (Vec<RGBA>, usize, usize) {
    let (width, height) = (512, 384);
    let px = (0..width * height).map(|i| {
        let (x, y) = (i % width, i / width);
        RGBA::new((x / 2) as u8, (y * 2 / 3) as u8, ((x ^ y) & 255) as u8, 255)
    }).collect();
    (px, width, height)
}

#[bench]
fn remap(b: &mut Bencher) {
    let (px, width, height) = gradient();
    let mut buf = vec![MaybeUninit::uninit(); width * height];
    let mut liq = Attributes::new();
    liq.set_seed(1);
    let img = liq.new_image(px, width, height).unwrap();
    liq.set_palette_size(256).unwrap();
    let mut res = liq.quantize(&img).unwrap();
    b.iter(move || {
        res.remap_into(&img, &mut buf).unwrap();
        res.remap_into(&img, &mut buf).unwrap();
    });
}

#[bench]
fn kmeans(b: &mut Bencher) {
    b.iter(_unstable_internal_kmeans_bench());
}

#[bench]
fn quantize_lab(b: &mut Bencher) {
    let (px, width, height) = gradient();
    let mut liq = Attributes::new();
    liq.set_seed(1);
    b.iter(move || {
        let img = liq.new_image_borrowed(&px, width, height).unwrap();
        liq.quantize(&img).unwrap();
    });
}

#[bench]
fn quantize_rgb(b: &mut Bencher) {
    let (px, width, height) = gradient();
    let mut liq = Attributes::new();
    liq.set_seed(1);
    liq.set_color_space(ColorSpace::Rgb);
    b.iter(move || {
        let img = liq.new_image_borrowed(&px, width, height).unwrap();
        liq.quantize(&img).unwrap();
    });
}
