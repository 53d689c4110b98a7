use crate::attr::Attributes;
use crate::error::*;
use crate::pal::{RGBA, RGBA16};
use crate::rows::{DynamicRows, PixelsSource};
use std::borrow::Cow;

/// Describes image dimensions and pixels for the library.
///
/// The core never decodes files. Pixels come from a slice or from a row callback.
pub struct Image<'pixels> {
    pub(crate) px: DynamicRows<'pixels>,
}

impl<'pixels> Image<'pixels> {
    /// Describe dimensions of a slice of 8-bit RGBA pixels (straight alpha, sRGB).
    ///
    /// See the [`rgb`] crate for making `[RGBA]` slices from `[u8]` slices.
    #[inline(always)]
    pub fn new(attr: &Attributes, pixels: &'pixels [RGBA], width: usize, height: usize) -> Result<Self, Error> {
        Self::new_stride(attr, pixels, width, height, width)
    }

    /// Stride is in pixels. Allows defining regions of larger images or images with padding without copying.
    ///
    /// Otherwise the same as [`Image::new`].
    #[inline]
    pub fn new_stride(attr: &Attributes, pixels: &'pixels [RGBA], width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        Self::check_buffer(attr, pixels.len(), width, height, stride)?;
        Self::new_internal(attr, PixelsSource::Pixels8 { pixels: Cow::Borrowed(pixels), stride }, width, height)
    }

    /// Create new image by copying `pixels` to an internal buffer, so that it makes a self-contained type.
    ///
    /// Otherwise the same as [`Image::new_stride`].
    #[inline]
    pub fn new_stride_copy(attr: &Attributes, pixels: &[RGBA], width: usize, height: usize, stride: usize) -> Result<Image<'static>, Error> {
        Image::new_owned(attr, pixels.to_vec(), width, height, stride)
    }

    /// Describe dimensions of a slice of 16-bit RGBA pixels (straight alpha, sRGB)
    #[inline]
    pub fn new16(attr: &Attributes, pixels: &'pixels [RGBA16], width: usize, height: usize) -> Result<Self, Error> {
        Self::new16_stride(attr, pixels, width, height, width)
    }

    /// Same as [`Image::new16`], with stride in pixels
    pub fn new16_stride(attr: &Attributes, pixels: &'pixels [RGBA16], width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        Self::check_buffer(attr, pixels.len(), width, height, stride)?;
        Self::new_internal(attr, PixelsSource::Pixels16 { pixels: Cow::Borrowed(pixels), stride }, width, height)
    }

    /// Generate rows on demand using a callback function.
    ///
    /// The callback gets a row buffer `width` pixels long and the row number, and must write every pixel.
    /// It will be called more than once per row, possibly from multiple threads at once, so it should be cheap.
    pub fn new_fn<F: 'static + Fn(&mut [RGBA16], usize) + Send + Sync>(attr: &Attributes, convert_row_fn: F, width: usize, height: usize) -> Result<Self, Error> {
        Self::new_internal(attr, PixelsSource::Callback(Box::new(convert_row_fn)), width, height)
    }

    /// Width of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn width(&self) -> usize {
        self.px.width as _
    }

    /// Height of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn height(&self) -> usize {
        self.px.height as _
    }

    fn new_internal(attr: &Attributes, pixels: PixelsSource<'pixels>, width: usize, height: usize) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            attr.verbose_print("  error: width and height must be > 0");
            return Err(EmptyImage);
        }
        if !Self::check_image_size(width, height) {
            attr.verbose_print("  error: image too large");
            return Err(ValueOutOfRange);
        }
        Ok(Self {
            px: DynamicRows::new(width as u32, height as u32, pixels),
        })
    }

    fn check_image_size(width: usize, height: usize) -> bool {
        if width.max(height) > i32::MAX as usize {
            return false;
        }
        width.checked_mul(height).is_some_and(|px| px <= isize::MAX as usize / std::mem::size_of::<crate::ColorVector>())
    }

    fn check_buffer(attr: &Attributes, len: usize, width: usize, height: usize, stride: usize) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(()); // reported as empty later
        }
        if stride < width {
            attr.verbose_print("  error: stride must be at least the width");
            return Err(ValueOutOfRange);
        }
        let required = stride.checked_mul(height - 1).and_then(|r| r.checked_add(width));
        if required.map_or(true, |required| len < required) {
            attr.verbose_print(format!("Buffer length is {len} pixels, which is not enough for {stride}×{height} RGBA pixels"));
            return Err(BufferTooSmall);
        }
        Ok(())
    }
}

impl Image<'static> {
    pub(crate) fn new_owned(attr: &Attributes, pixels: Vec<RGBA>, width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        Self::check_buffer(attr, pixels.len(), width, height, stride)?;
        Self::new_internal(attr, PixelsSource::Pixels8 { pixels: Cow::Owned(pixels), stride }, width, height)
    }
}

#[test]
fn takes_rgba() {
    let liq = Attributes::new();
    let img = vec![RGBA::new(0, 0, 0, 0); 8];

    liq.new_image_borrowed(&img, 1, 1).unwrap();
    liq.new_image_borrowed(&img, 4, 2).unwrap();
    liq.new_image_borrowed(&img, 8, 1).unwrap();
    assert_eq!(BufferTooSmall, liq.new_image_borrowed(&img, 9, 1).err().unwrap());
    assert_eq!(BufferTooSmall, liq.new_image_borrowed(&img, 4, 3).err().unwrap());
    assert_eq!(EmptyImage, liq.new_image_borrowed(&img, 0, 3).err().unwrap());
    assert_eq!(EmptyImage, liq.new_image_borrowed(&[], 0, 0).err().unwrap());
}

#[test]
fn stride() {
    let liq = Attributes::new();
    let img = vec![RGBA::new(0, 0, 0, 0); 10];
    // last row doesn't need padding
    Image::new_stride(&liq, &img, 2, 3, 4).unwrap();
    assert!(Image::new_stride(&liq, &img, 3, 3, 4).is_err());
    assert_eq!(ValueOutOfRange, Image::new_stride(&liq, &img, 3, 2, 2).err().unwrap());
    let copy = Image::new_stride_copy(&liq, &img, 2, 3, 4).unwrap();
    assert_eq!((2, 3), (copy.width(), copy.height()));
}

#[test]
fn takes_rgba16() {
    let liq = Attributes::new();
    let img = vec![RGBA16::new(0, 0, 0, 0); 6];
    let i = Image::new16(&liq, &img, 3, 2).unwrap();
    assert_eq!(3, i.width());
    assert!(Image::new16(&liq, &img, 3, 3).is_err());
}
