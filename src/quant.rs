use crate::attr::Attributes;
use crate::colorspace::ColorSpace;
use crate::error::*;
use crate::image::Image;
use crate::kmeans::ColorClusters;
use crate::pal::{build_palette, Centers, PalIndex, MAX_COLORS, RGBA};
use crate::remap::remap_to_palette;
use crate::sample::subsample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fmt;
use std::mem::MaybeUninit;

/// Palette found by [`Attributes::quantize()`], and the centers it's made of
pub struct QuantizationResult {
    centers: Centers,
    palette: Vec<RGBA>,
    color_space: ColorSpace,
    palette_error: Option<f64>,
    remapping_error: Option<f64>,
    iterations: u32,
}

impl QuantizationResult {
    pub(crate) fn new(attr: &Attributes, image: &Image<'_>) -> Result<Self, Error> {
        let palette_size = attr.palette_size;
        if palette_size == 0 || usize::from(palette_size) > MAX_COLORS || attr.max_sample_pixels == 0 {
            return Err(ValueOutOfRange);
        }
        if attr.progress(0.) {
            return Err(Aborted);
        }

        let color_space = attr.color_space;
        let vectors = image.px.all_rows_f(color_space)?;
        let total_pixels = vectors.len();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(attr.seed);
        let samples = subsample(vectors, attr.max_sample_pixels, &mut rng);
        attr.verbose_print(format!("  sampled {} of {} pixels", samples.len(), total_pixels));
        if attr.progress(10.) {
            return Err(Aborted);
        }

        let mut clusters = ColorClusters::new(&samples, usize::from(palette_size), &mut rng)?;
        attr.verbose_print(format!("  seeded {} centers", clusters.centers().len()));
        if attr.progress(20.) {
            return Err(Aborted);
        }

        let (palette_error, iterations) = refine(attr, &mut clusters)?;

        let centers = clusters.into_centers();
        let palette = build_palette(&centers, color_space, palette_size);
        attr.verbose_print(format!("  palette of {} colors from {} centers", palette.len(), centers.len()));
        attr.verbose_printf_flush();

        Ok(Self {
            centers,
            palette,
            color_space,
            palette_error: Some(palette_error),
            remapping_error: None,
            iterations,
        })
    }

    /// Approximate mean square error of the palette, measured on the sampled pixels
    /// in the clustering color space
    #[must_use]
    pub fn quantization_error(&self) -> Option<f64> {
        self.palette_error
    }

    /// Mean square error of the most recent remapping, or the palette error if nothing has been remapped yet
    #[must_use]
    pub fn remapping_error(&self) -> Option<f64> {
        self.remapping_error.or(self.palette_error)
    }

    /// Number of k-means passes that ran, including the initial assignment
    #[inline]
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Color space the palette was clustered in
    #[inline]
    #[must_use]
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// The final palette. It has exactly as many entries as [`Attributes::set_palette_size()`] asked for.
    #[inline]
    #[must_use]
    pub fn palette(&self) -> &[RGBA] {
        &self.palette
    }

    /// The final palette, copied. Empty if the copy can't be allocated, which [`remapped()`][Self::remapped] reports as an error instead.
    #[must_use]
    pub fn palette_vec(&self) -> Vec<RGBA> {
        self.try_palette_vec().unwrap_or_default()
    }

    fn try_palette_vec(&self) -> Result<Vec<RGBA>, Error> {
        let mut out: Vec<RGBA> = Vec::new();
        out.try_reserve_exact(self.palette.len())?;
        out.extend_from_slice(&self.palette);
        Ok(out)
    }

    /// Number of palette entries
    #[inline]
    #[must_use]
    pub fn palette_len(&self) -> usize {
        self.palette.len()
    }

    /// Remap image into a palette + indices.
    ///
    /// Returns the palette and an uncompressed bitmap with one index per pixel.
    /// The image doesn't have to be the one the palette was made from.
    pub fn remapped(&mut self, image: &Image<'_>) -> Result<(Vec<RGBA>, Vec<PalIndex>), Error> {
        let mut buf = Vec::new();
        let pal = self.remap_into_vec(image, &mut buf)?;
        Ok((pal, buf))
    }

    /// Remap image into an existing buffer. Use [`remapped()`][Self::remapped] if you don't have a pre-allocated buffer to reuse.
    ///
    /// Returns the palette.
    #[inline]
    pub fn remap_into_vec(&mut self, image: &Image<'_>, buf: &mut Vec<PalIndex>) -> Result<Vec<RGBA>, Error> {
        let len = image.width() * image.height();
        // Capacity is essential here, as it creates uninitialized buffer
        unsafe {
            buf.clear();
            buf.try_reserve_exact(len)?;
            self.remap_into(image, &mut buf.spare_capacity_mut()[..len])?;
            buf.set_len(len);
        }
        self.try_palette_vec()
    }

    /// Remap image into an existing buffer.
    ///
    /// This is a low-level call for use when existing memory has to be reused. Use [`remapped()`][Self::remapped] or [`remap_into_vec()`][Self::remap_into_vec] if possible.
    ///
    /// Writes `width * height` indices to the start of the buffer.
    #[inline]
    pub fn remap_into(&mut self, image: &Image<'_>, output_buf: &mut [MaybeUninit<PalIndex>]) -> Result<(), Error> {
        let required_size = image.width() * image.height();
        let output_buf = output_buf.get_mut(0..required_size).ok_or(BufferTooSmall)?;

        self.remapping_error = Some(remap_to_palette(image, self.color_space, &self.centers, output_buf)?);
        Ok(())
    }
}

/// Lloyd's iterations until the error stops going down, or the limit is hit.
///
/// Returns the lowest error seen and the number of passes.
fn refine(attr: &Attributes, clusters: &mut ColorClusters<'_>) -> Result<(f64, u32), Error> {
    let max_iterations = attr.max_cluster_iterations;
    let mut loss = clusters.iterate();
    let mut iterations = 1;
    attr.verbose_print(format!("  iteration 1: MSE={loss:0.6}"));

    while iterations <= max_iterations {
        let done = 20. + 75. * iterations as f32 / (max_iterations + 1) as f32;
        if attr.progress(done) {
            return Err(Aborted);
        }

        let new_loss = clusters.iterate();
        iterations += 1;
        attr.verbose_print(format!("  iteration {iterations}: MSE={new_loss:0.6}"));
        // Lloyd's can't make it worse, so no improvement means a fixed point
        if new_loss >= loss {
            attr.verbose_print(format!("  converged after {iterations} iterations"));
            break;
        }
        loss = new_loss;
    }
    Ok((loss, iterations))
}

impl fmt::Debug for QuantizationResult {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuantizationResult(colors={}, mse={:0.6})", self.palette.len(), self.palette_error.unwrap_or(0.))
    }
}

#[cfg(test)]
fn two_color_image() -> Vec<RGBA> {
    let a = RGBA::new(200, 30, 40, 255);
    let b = RGBA::new(10, 90, 250, 128);
    vec![a, b, b, a]
}

#[test]
fn stops_when_loss_stops_falling() {
    let mut attr = Attributes::new();
    attr.set_palette_size(2).unwrap();
    attr.set_max_cluster_iterations(50).unwrap();
    let img = attr.new_image(two_color_image(), 2, 2).unwrap();
    let res = attr.quantize(&img).unwrap();
    // unique colors are exact centers, so the second pass is already no better
    assert_eq!(2, res.iterations());
    assert_eq!(Some(0.), res.quantization_error());
}

#[test]
fn zero_iterations_runs_initial_pass_only() {
    let mut attr = Attributes::new();
    attr.set_palette_size(3).unwrap();
    attr.set_max_cluster_iterations(0).unwrap();
    let px: Vec<RGBA> = (0..=255u8).map(|g| RGBA::new(g, g, g, 255)).collect();
    let img = attr.new_image(px, 16, 16).unwrap();
    let res = attr.quantize(&img).unwrap();
    assert_eq!(1, res.iterations());
    assert_eq!(3, res.palette_len());
}

#[test]
fn abort_from_progress_callback() {
    let mut attr = Attributes::new();
    attr.set_progress_callback(|percent| if percent > 15. { crate::ControlFlow::Break } else { crate::ControlFlow::Continue });
    let img = attr.new_image(two_color_image(), 2, 2).unwrap();
    assert_eq!(Aborted, attr.quantize(&img).unwrap_err());
}

#[test]
fn remap_buffer_too_small() {
    let attr = Attributes::new();
    let img = attr.new_image(two_color_image(), 2, 2).unwrap();
    let mut res = attr.quantize(&img).unwrap();
    let mut buf = [MaybeUninit::uninit(); 3];
    assert_eq!(BufferTooSmall, res.remap_into(&img, &mut buf).unwrap_err());
    let mut buf = [MaybeUninit::uninit(); 5];
    res.remap_into(&img, &mut buf).unwrap();
    assert_eq!(Some(0.), res.remapping_error());
}

#[test]
fn logs_progress() {
    use std::sync::{Arc, Mutex};
    let messages = Arc::new(Mutex::new(Vec::new()));
    let mut attr = Attributes::new();
    let m = messages.clone();
    attr.set_log_callback(move |_, msg| m.lock().unwrap().push(msg.to_string()));
    attr.set_max_sample_pixels(2).unwrap();
    let img = attr.new_image(two_color_image(), 2, 2).unwrap();
    attr.quantize(&img).unwrap();
    let messages = messages.lock().unwrap();
    assert_eq!("  sampled 2 of 4 pixels", messages[0]);
    assert!(messages.iter().any(|m| m.starts_with("  seeded ")));
    assert!(messages.iter().any(|m| m.starts_with("  iteration 1: MSE=")));
}

#[test]
fn remap_into_vec_returns_full_palette() {
    let mut attr = Attributes::new();
    attr.set_palette_size(7).unwrap();
    let img = attr.new_image(two_color_image(), 2, 2).unwrap();
    let mut res = attr.quantize(&img).unwrap();
    let mut buf = vec![9; 100];
    let pal = res.remap_into_vec(&img, &mut buf).unwrap();
    assert_eq!(7, pal.len());
    assert_eq!(res.palette(), &pal[..]);
    assert_eq!(4, buf.len());
    assert_eq!(Ok(pal), res.try_palette_vec());
}
