use crate::colorspace::ColorSpace;
use crate::error::Error;
use crate::image::Image;
use crate::pal::{PalLen, MAX_COLORS, RGBA, RGBA16};
use crate::quant::QuantizationResult;
use std::sync::Arc;

/// Number of colors in the palette, unless set otherwise
pub const DEFAULT_PALETTE_SIZE: u32 = 256;

/// Maximum number of refinement passes after the first k-means assignment
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Larger images are randomly subsampled down to this many pixels for clustering
pub const DEFAULT_MAX_SAMPLE_PIXELS: usize = 100_000;

/// Starting point and settings for the quantization process
#[derive(Clone)]
pub struct Attributes {
    pub(crate) palette_size: PalLen,
    pub(crate) max_cluster_iterations: u32,
    pub(crate) max_sample_pixels: usize,
    pub(crate) color_space: ColorSpace,
    pub(crate) seed: u64,

    progress_callback: Option<Arc<dyn Fn(f32) -> ControlFlow + Send + Sync>>,
    log_callback: Option<Arc<dyn Fn(&Attributes, &str) + Send + Sync>>,
    log_flush_callback: Option<Arc<dyn Fn(&Attributes) + Send + Sync>>,
}

impl Attributes {
    /// New handle for library configuration
    ///
    /// Every handle gets a different random seed. Use [`Attributes::set_seed`] for repeatable results.
    ///
    /// See also [`Attributes::new_image()`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            palette_size: DEFAULT_PALETTE_SIZE.min(MAX_COLORS as u32) as PalLen,
            max_cluster_iterations: DEFAULT_MAX_ITERATIONS,
            max_sample_pixels: DEFAULT_MAX_SAMPLE_PIXELS,
            color_space: ColorSpace::default(),
            seed: rand::random(),
            progress_callback: None,
            log_callback: None,
            log_flush_callback: None,
        }
    }

    /// Make an image from RGBA pixels.
    ///
    /// The `pixels` argument can be `Vec<RGBA>`, or `Box<[RGBA]>` or `&[RGBA]`.
    /// See [`Attributes::new_image_borrowed`] for a non-copying alternative.
    #[inline]
    pub fn new_image<VecRGBA>(&self, pixels: VecRGBA, width: usize, height: usize) -> Result<Image<'static>, Error> where VecRGBA: Into<Box<[RGBA]>> {
        Image::new_owned(self, pixels.into().into_vec(), width, height, width)
    }

    /// Describe dimensions of a slice of RGBA pixels
    #[inline]
    pub fn new_image_borrowed<'pixels>(&self, bitmap: &'pixels [RGBA], width: usize, height: usize) -> Result<Image<'pixels>, Error> {
        Image::new(self, bitmap, width, height)
    }

    /// Stride is in pixels. Allows defining regions of larger images or images with padding without copying.
    #[inline]
    pub fn new_image_stride<'pixels>(&self, bitmap: &'pixels [RGBA], width: usize, height: usize, stride: usize) -> Result<Image<'pixels>, Error> {
        Image::new_stride(self, bitmap, width, height, stride)
    }

    /// Describe dimensions of a slice of 16-bit RGBA pixels
    #[inline]
    pub fn new_image16<'pixels>(&self, bitmap: &'pixels [RGBA16], width: usize, height: usize) -> Result<Image<'pixels>, Error> {
        Image::new16(self, bitmap, width, height)
    }

    /// Generate palette for the image
    ///
    /// Runs the whole clustering: vectorize, subsample, seed, refine.
    /// Use [`QuantizationResult::remapped`] afterwards to get the pixels.
    pub fn quantize(&self, image: &Image<'_>) -> Result<QuantizationResult, Error> {
        QuantizationResult::new(self, image)
    }

    /// Number of colors in the output palette, 1-256 (or 1-2048 with the `large_palettes` feature).
    ///
    /// The palette always has exactly this many entries, even if the image has fewer colors.
    #[inline]
    pub fn set_palette_size(&mut self, colors: u32) -> Result<(), Error> {
        if !(1..=MAX_COLORS as u32).contains(&colors) {
            return Err(Error::ValueOutOfRange);
        }
        self.palette_size = colors as PalLen;
        Ok(())
    }

    /// How many k-means refinement passes may run after the first one. Refinement stops early
    /// as soon as an iteration doesn't reduce the error.
    ///
    /// 0 means only the initial assignment pass. The default is 5.
    #[inline]
    pub fn set_max_cluster_iterations(&mut self, iterations: u32) -> Result<(), Error> {
        if iterations > u32::from(u16::MAX) {
            return Err(Error::ValueOutOfRange);
        }
        self.max_cluster_iterations = iterations;
        Ok(())
    }

    /// Limit of pixels used for clustering. Larger images are subsampled at random.
    ///
    /// Remapping always uses all pixels. The default is 100000.
    #[inline]
    pub fn set_max_sample_pixels(&mut self, pixels: usize) -> Result<(), Error> {
        if pixels == 0 {
            return Err(Error::ValueOutOfRange);
        }
        self.max_sample_pixels = pixels;
        Ok(())
    }

    /// Space in which colors are compared and averaged. The default is [`ColorSpace::Lab`].
    #[inline(always)]
    pub fn set_color_space(&mut self, color_space: ColorSpace) {
        self.color_space = color_space;
    }

    /// Seed for sampling and k-means++ seeding. The same seed gives the same palette for the same image.
    #[inline(always)]
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Return number of colors the palette will have
    #[inline(always)]
    #[must_use]
    pub fn palette_size(&self) -> u32 {
        self.palette_size.into()
    }

    /// Return max number of refinement passes
    #[inline(always)]
    #[must_use]
    pub fn max_cluster_iterations(&self) -> u32 {
        self.max_cluster_iterations
    }

    /// Return max number of pixels used for clustering
    #[inline(always)]
    #[must_use]
    pub fn max_sample_pixels(&self) -> usize {
        self.max_sample_pixels
    }

    #[inline(always)]
    #[must_use]
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    #[inline(always)]
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Set callback function to be called every time the library wants to print a message.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_log_callback<F: Fn(&Attributes, &str) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_callback = Some(Arc::new(callback));
    }

    /// Callback for flushing output (if you buffer messages, that's the time to flush those buffers)
    #[inline]
    pub fn set_log_flush_callback<F: Fn(&Attributes) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_flush_callback = Some(Arc::new(callback));
    }

    /// Set callback function to be called every time the library makes a progress.
    /// It can be used to cancel operation early.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_progress_callback<F: Fn(f32) -> ControlFlow + Send + Sync + 'static>(&mut self, callback: F) {
        self.progress_callback = Some(Arc::new(callback));
    }

    // true == abort
    #[inline]
    #[must_use]
    pub(crate) fn progress(self: &Attributes, percent: f32) -> bool {
        if let Some(f) = &self.progress_callback {
            f(percent) == ControlFlow::Break
        } else {
            false
        }
    }

    #[inline(always)]
    pub(crate) fn verbose_print(self: &Attributes, msg: impl AsRef<str>) {
        fn _print(a: &Attributes, msg: &str) {
            if let Some(f) = &a.log_callback {
                f(a, msg);
            }
        }
        _print(self, msg.as_ref());
    }

    #[inline]
    pub(crate) fn verbose_printf_flush(self: &Attributes) {
        if let Some(f) = &self.log_flush_callback {
            f(self);
        }
    }
}

impl Drop for Attributes {
    fn drop(&mut self) {
        self.verbose_printf_flush();
    }
}

impl Default for Attributes {
    #[inline(always)]
    fn default() -> Attributes {
        Attributes::new()
    }
}

/// Result of callback in [`Attributes::set_progress_callback`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlFlow {
    /// Continue processing as normal
    Continue,
    /// Abort processing and fail
    Break,
}

#[test]
fn defaults() {
    let a = Attributes::new();
    assert_eq!(256, a.palette_size());
    assert_eq!(5, a.max_cluster_iterations());
    assert_eq!(100_000, a.max_sample_pixels());
    assert_eq!(ColorSpace::Lab, a.color_space());
}

#[test]
fn getset() {
    let mut a = Attributes::new();
    assert!(a.set_palette_size(0).is_err());
    assert!(a.set_palette_size(MAX_COLORS as u32 + 1).is_err());
    a.set_palette_size(1).unwrap();
    assert_eq!(1, a.palette_size());
    a.set_palette_size(16).unwrap();
    assert_eq!(16, a.palette_size());

    a.set_max_cluster_iterations(0).unwrap();
    assert_eq!(0, a.max_cluster_iterations());
    assert!(a.set_max_cluster_iterations(1 << 20).is_err());

    assert!(a.set_max_sample_pixels(0).is_err());
    a.set_max_sample_pixels(10).unwrap();
    assert_eq!(10, a.max_sample_pixels());

    a.set_color_space(ColorSpace::Rgb);
    assert_eq!(ColorSpace::Rgb, a.color_space());
    a.set_seed(1234);
    assert_eq!(1234, a.seed());

    let b = a.clone();
    assert_eq!(16, b.palette_size());
    assert_eq!(1234, b.seed());
}

#[test]
fn log_and_flush() {
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    let logged = Arc::new(AtomicUsize::new(0));
    let flushed = Arc::new(AtomicUsize::new(0));
    {
        let mut a = Attributes::new();
        let l = logged.clone();
        a.set_log_callback(move |_, msg| {
            assert!(!msg.is_empty());
            l.fetch_add(1, SeqCst);
        });
        let f = flushed.clone();
        a.set_log_flush_callback(move |_| {
            f.fetch_add(1, SeqCst);
        });
        a.verbose_print("  hello");
        assert!(!a.progress(50.));
        a.set_progress_callback(|_| ControlFlow::Break);
        assert!(a.progress(50.));
    }
    assert_eq!(1, logged.load(SeqCst));
    assert_eq!(1, flushed.load(SeqCst));
}
