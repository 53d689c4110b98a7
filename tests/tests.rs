use kquant::*;
use rgb::ComponentMap;

/// Smooth two-axis gradient with a few solid blocks on top
fn gradient(width: usize, height: usize) -> Vec<RGBA> {
    let mut px = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let block = (x / 16 + y / 16) % 5 == 0;
            px.push(if block {
                RGBA::new(20, 200, 40, 255)
            } else {
                RGBA::new((x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) * 127 / (width + height)) as u8, 255)
            });
        }
    }
    px
}

fn expand(palette: &[RGBA], idx: &[PalIndex]) -> Vec<RGBA> {
    idx.iter().map(|&i| palette[usize::from(i)]).collect()
}

fn mean_abs_diff(a: &[RGBA], b: &[RGBA]) -> f64 {
    let sum: u64 = a.iter().zip(b).map(|(a, b)| {
        let d = a.map(|c| i32::from(c)) - b.map(|c| i32::from(c));
        u64::from(d.r.unsigned_abs() + d.g.unsigned_abs() + d.b.unsigned_abs() + d.a.unsigned_abs())
    }).sum();
    sum as f64 / a.len() as f64 / 4.
}

#[test]
fn png_round_trip() {
    let (width, height) = (120, 80);
    let input = gradient(width, height);

    let mut attr = new();
    attr.set_seed(2024);
    attr.set_palette_size(32).unwrap();
    let img = attr.new_image_borrowed(&input, width, height).unwrap();
    let mut res = attr.quantize(&img).unwrap();
    let (pal, idx) = res.remapped(&img).unwrap();
    assert_eq!(32, pal.len());
    assert_eq!(width * height, idx.len());

    let buf = expand(&pal, &idx);
    let png = lodepng::encode32(&buf[..], width, height).unwrap();
    let decoded = lodepng::decode32(&png).unwrap();
    assert_eq!((width, height), (decoded.width, decoded.height));
    assert_eq!(buf, decoded.buffer);

    let diff = mean_abs_diff(&input, &decoded.buffer);
    assert!(diff < 12., "{diff}");
    assert!(res.remapping_error().is_some_and(|e| e > 0.));
}

#[test]
fn png_input_with_few_colors_is_lossless() {
    let colors = [RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 255, 255), RGBA::new(255, 0, 128, 64), RGBA::new(3, 200, 90, 0)];
    let input: Vec<RGBA> = (0..40 * 30).map(|i| colors[(i / 7) % colors.len()]).collect();
    let png = lodepng::encode32(&input[..], 40, 30).unwrap();
    let decoded = lodepng::decode32(&png).unwrap();

    for color_space in [ColorSpace::Rgb, ColorSpace::Lab] {
        let mut attr = new();
        attr.set_color_space(color_space);
        attr.set_palette_size(16).unwrap();
        let img = attr.new_image(&decoded.buffer[..], decoded.width, decoded.height).unwrap();
        let mut res = attr.quantize(&img).unwrap();
        let (pal, idx) = res.remapped(&img).unwrap();
        assert_eq!(16, pal.len());
        assert!(pal[4..].iter().all(|&c| c == pal[0]));
        for c in &colors {
            assert!(pal[..4].contains(c), "{c:?} not in {pal:?}");
        }
        assert_eq!(input, expand(&pal, &idx));
        assert_eq!(Some(0.), res.remapping_error());
    }
}

#[test]
fn more_colors_less_error() {
    let (width, height) = (64, 64);
    let input = gradient(width, height);
    let mut errors = Vec::new();
    for size in [2, 8, 64] {
        let mut attr = new();
        attr.set_seed(5);
        attr.set_palette_size(size).unwrap();
        attr.set_max_cluster_iterations(10).unwrap();
        let img = attr.new_image_borrowed(&input, width, height).unwrap();
        let mut res = attr.quantize(&img).unwrap();
        let (pal, idx) = res.remapped(&img).unwrap();
        errors.push(mean_abs_diff(&input, &expand(&pal, &idx)));
    }
    assert!(errors[0] > errors[1] && errors[1] > errors[2], "{errors:?}");
}

#[test]
fn subsampled_palette_remaps_every_pixel() {
    let (width, height) = (200, 100);
    let input = gradient(width, height);
    let mut attr = new();
    attr.set_seed(1);
    attr.set_max_sample_pixels(500).unwrap();
    attr.set_palette_size(16).unwrap();
    let img = attr.new_image_borrowed(&input, width, height).unwrap();
    let mut res = attr.quantize(&img).unwrap();

    let mut buf = Vec::new();
    let pal = res.remap_into_vec(&img, &mut buf).unwrap();
    assert_eq!(width * height, buf.len());
    assert!(buf.iter().all(|&i| usize::from(i) < pal.len()));
    // the solid block color is common enough to get its own entry
    let block = RGBA::new(20, 200, 40, 255);
    let block_px = expand(&pal, &buf[..1])[0];
    assert!(mean_abs_diff(&[block], &[block_px]) < 6., "{block_px:?}");
}

#[test]
fn palette_reused_for_another_image() {
    let mut attr = new();
    attr.set_palette_size(2).unwrap();
    attr.set_color_space(ColorSpace::Rgb);
    let black = RGBA::new(0, 0, 0, 255);
    let white = RGBA::new(255, 255, 255, 255);
    let img = attr.new_image(vec![black, white], 2, 1).unwrap();
    let mut res = attr.quantize(&img).unwrap();

    let grays: Vec<RGBA> = [10u8, 100, 200, 250].iter().map(|&g| RGBA::new(g, g, g, 255)).collect();
    let other = attr.new_image_stride(&grays, 2, 2, 2).unwrap();
    let (pal, idx) = res.remapped(&other).unwrap();
    assert_eq!(vec![black, black, white, white], expand(&pal, &idx));
}

#[test]
fn sixteen_bit_input() {
    let px16: Vec<RGBA16> = (0..256u16).map(|i| RGBA16::new(i * 256, 65535 - i * 256, 0, 65535)).collect();
    let mut attr = new();
    attr.set_palette_size(4).unwrap();
    let img = attr.new_image16(&px16, 16, 16).unwrap();
    let mut res = attr.quantize(&img).unwrap();
    let (pal, idx) = res.remapped(&img).unwrap();
    assert_eq!(4, pal.len());
    // red end and green end of the ramp land on different entries
    assert_ne!(idx[0], idx[255]);
    assert!(pal[usize::from(idx[255])].r > 180);
    assert!(pal[usize::from(idx[0])].g > 180);
}

#[test]
fn rejects_bad_config() {
    let mut attr = new();
    assert_eq!(Err(Error::ValueOutOfRange), attr.set_palette_size(0));
    assert_eq!(Err(Error::ValueOutOfRange), attr.set_max_sample_pixels(0));
    assert_eq!(DEFAULT_PALETTE_SIZE, attr.palette_size());
    assert_eq!(DEFAULT_MAX_ITERATIONS, attr.max_cluster_iterations());
    assert_eq!(DEFAULT_MAX_SAMPLE_PIXELS, attr.max_sample_pixels());
    assert_eq!(Error::BufferTooSmall, attr.new_image(vec![RGBA::new(0, 0, 0, 0); 3], 2, 2).err().unwrap());
}

#[test]
fn exposed_steps_compose() {
    use rand::SeedableRng;
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(3);
    let vectors: Vec<ColorVector> = gradient(50, 50).into_iter().map(|px| ColorSpace::Lab.to_vector8(px)).collect();
    let samples = subsample(vectors, 1000, &mut rng);
    assert_eq!(1000, samples.len());
    let seeds = kmeans_plus_plus(&samples, 8, &mut rng);
    assert_eq!(8, seeds.len());
    let mut clusters = ColorClusters::new(&samples, 8, &mut rng).unwrap();
    let first = clusters.iterate();
    let second = clusters.iterate();
    assert!(second <= first * 1.00001, "{first} {second}");
}
