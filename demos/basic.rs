fn main() {
    // Image loading/saving is outside scope of this library
    let width = 64usize;
    let height = 64usize;
    let fakebitmap: Vec<kquant::RGBA> = (0..width * height)
        .map(|i| kquant::RGBA::new((i % width * 4) as u8, (i / width * 4) as u8, 128, 255))
        .collect();

    // Configure the library
    let mut liq = kquant::new();
    liq.set_palette_size(16).unwrap();
    liq.set_max_cluster_iterations(10).unwrap();
    liq.set_log_callback(|_, msg| eprintln!("{msg}"));

    // Describe the bitmap
    let img = liq.new_image(&fakebitmap[..], width, height).unwrap();

    // The magic happens in quantize()
    let mut res = match liq.quantize(&img) {
        Ok(res) => res,
        Err(err) => panic!("Quantization failed, because: {err:?}"),
    };

    // You can reuse the result to generate several images with the same palette
    let (palette, pixels) = res.remapped(&img).unwrap();

    println!(
        "Done! Got palette {palette:?} and {} pixels after {} iterations, MSE {:0.4}",
        pixels.len(),
        res.iterations(),
        res.remapping_error().unwrap_or(0.)
    );
}
