use crate::colorspace::{ColorSpace, ColorVector};
use crate::error::Error;
use crate::pal::{RGBA, RGBA16};
use rgb::ComponentMap;
use std::borrow::Cow;

pub(crate) type RowCallback<'a> = dyn Fn(&mut [RGBA16], usize) + Send + Sync + 'a;

pub(crate) enum PixelsSource<'pixels> {
    Pixels8 {
        pixels: Cow<'pixels, [RGBA]>,
        stride: usize,
    },
    Pixels16 {
        pixels: Cow<'pixels, [RGBA16]>,
        stride: usize,
    },
    Callback(Box<RowCallback<'pixels>>),
}

/// Rows of an image, read on demand
pub(crate) struct DynamicRows<'pixels> {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pixels: PixelsSource<'pixels>,
}

impl<'pixels> DynamicRows<'pixels> {
    #[inline]
    pub(crate) fn new(width: u32, height: u32, pixels: PixelsSource<'pixels>) -> Self {
        Self { width, height, pixels }
    }

    #[inline(always)]
    pub(crate) fn width(&self) -> usize {
        self.width as usize
    }

    /// 16-bit pixels of the row. Uses `temp_row` if the pixels aren't stored in that format.
    pub(crate) fn row_rgba16<'px>(&'px self, temp_row: &'px mut [RGBA16], row: usize) -> &'px [RGBA16] {
        let width = self.width();
        debug_assert!(temp_row.len() >= width);
        match &self.pixels {
            PixelsSource::Pixels16 { pixels, stride } => &pixels[row * stride..][..width],
            PixelsSource::Pixels8 { pixels, stride } => {
                let temp_row = &mut temp_row[..width];
                for (out, px) in temp_row.iter_mut().zip(&pixels[row * stride..][..width]) {
                    *out = px.map(|c| u16::from(c) * 257);
                }
                temp_row
            },
            PixelsSource::Callback(cb) => {
                let temp_row = &mut temp_row[..width];
                cb(temp_row, row);
                temp_row
            },
        }
    }

    /// Converts the row into clustering vectors
    pub(crate) fn row_f(&self, color_space: ColorSpace, temp_row: &mut [RGBA16], out: &mut [ColorVector], row: usize) {
        let rgba = self.row_rgba16(temp_row, row);
        for (out, &px) in out.iter_mut().zip(rgba) {
            *out = color_space.to_vector(px);
        }
    }

    /// Every pixel of the image as a vector, in row-major order
    pub(crate) fn all_rows_f(&self, color_space: ColorSpace) -> Result<Vec<ColorVector>, Error> {
        let width = self.width();
        let len = width * self.height as usize;
        let mut all = Vec::new();
        all.try_reserve_exact(len)?;
        all.resize(len, ColorVector::default());

        let mut temp_row = temp_buf(width)?;
        for (row, out) in all.chunks_exact_mut(width).enumerate() {
            self.row_f(color_space, &mut temp_row, out, row);
        }
        Ok(all)
    }
}

pub(crate) fn temp_buf(len: usize) -> Result<Box<[RGBA16]>, Error> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)?;
    v.resize(len, RGBA16::default());
    Ok(v.into_boxed_slice())
}

#[test]
fn widens_8bit_rows() {
    let pixels = [RGBA::new(0, 1, 128, 255), RGBA::new(255, 255, 255, 0), RGBA::new(9, 9, 9, 9)];
    let rows = DynamicRows::new(1, 2, PixelsSource::Pixels8 { pixels: Cow::Borrowed(&pixels[..]), stride: 2 });
    let mut tmp = temp_buf(1).unwrap();
    assert_eq!([RGBA16::new(0, 257, 128 * 257, 65535)], rows.row_rgba16(&mut tmp, 0));
    assert_eq!([RGBA16::new(9 * 257, 9 * 257, 9 * 257, 9 * 257)], rows.row_rgba16(&mut tmp, 1));
}

#[test]
fn callback_rows() {
    let rows = DynamicRows::new(3, 2, PixelsSource::Callback(Box::new(|row: &mut [RGBA16], y: usize| {
        for (x, px) in row.iter_mut().enumerate() {
            *px = RGBA16::new(x as u16, y as u16, 0, 65535);
        }
    })));
    let all = rows.all_rows_f(ColorSpace::Rgb).unwrap();
    assert_eq!(6, all.len());
    assert_eq!(ColorVector([2. / 65535., 1. / 65535., 0., 1.]), all[5]);
}
