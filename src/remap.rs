use crate::colorspace::{ColorSpace, ColorVector};
use crate::error::*;
use crate::image::Image;
use crate::pal::{nearest_center, PalIndex};
use crate::rayoff::*;
use crate::rows::temp_buf;
use std::cell::RefCell;
use std::mem::MaybeUninit;

/// Writes index of the nearest center for every pixel of the image, not just the sampled ones.
///
/// `output_pixels` must be exactly `width * height` long. Returns mean squared error of the mapping.
#[inline(never)]
pub(crate) fn remap_to_palette(image: &Image<'_>, color_space: ColorSpace, centers: &[ColorVector], output_pixels: &mut [MaybeUninit<PalIndex>]) -> Result<f64, Error> {
    let width = image.width();
    debug_assert_eq!(output_pixels.len(), width * image.height());

    if centers.is_empty() {
        return Err(Error::EmptyImage);
    }
    if centers.len() > usize::from(PalIndex::MAX) + 1 {
        return Err(Error::Unsupported);
    }

    let tls = ThreadLocal::new();
    let per_thread_buffers = move || -> Result<_, Error> { Ok(RefCell::new(temp_buf(width)?)) };
    // fail early, before spawning the rows
    tls.get_or_try(per_thread_buffers)?;

    let remapping_error = output_pixels.par_chunks_mut(width).enumerate().map(|(row, output_pixels_row)| {
        let Ok(temp_row) = tls.get_or_try(per_thread_buffers) else {
            return f64::NAN;
        };
        let temp_row = &mut *temp_row.borrow_mut();

        let mut remapping_error = 0.;
        for (px, out) in image.px.row_rgba16(temp_row, row).iter().zip(output_pixels_row) {
            let (matched, diff) = nearest_center(centers, &color_space.to_vector(*px));
            remapping_error += f64::from(diff);
            out.write(matched as PalIndex);
        }
        remapping_error
    })
    .sum::<f64>();

    if remapping_error.is_nan() {
        return Err(Error::OutOfMemory);
    }
    Ok(remapping_error / (image.width() * image.height()) as f64)
}

#[test]
fn every_pixel_gets_nearest() {
    use crate::pal::RGBA;
    let attr = crate::Attributes::new();
    let pixels = [
        RGBA::new(250, 0, 0, 255), RGBA::new(0, 0, 240, 255), RGBA::new(255, 10, 10, 255),
        RGBA::new(0, 5, 255, 255), RGBA::new(1, 2, 3, 255), RGBA::new(255, 0, 0, 255),
    ];
    let img = attr.new_image_borrowed(&pixels, 3, 2).unwrap();
    let centers = [
        ColorSpace::Rgb.to_vector8(RGBA::new(255, 0, 0, 255)),
        ColorSpace::Rgb.to_vector8(RGBA::new(0, 0, 255, 255)),
        ColorSpace::Rgb.to_vector8(RGBA::new(0, 0, 0, 255)),
    ];
    let mut out = vec![MaybeUninit::uninit(); 6];
    let mse = remap_to_palette(&img, ColorSpace::Rgb, &centers, &mut out).unwrap();
    let out: Vec<PalIndex> = out.into_iter().map(|i| unsafe { i.assume_init() }).collect();
    assert_eq!(vec![0, 1, 0, 1, 2, 0], out);
    assert!(mse > 0. && mse < 0.01, "{mse}");
}

#[test]
fn exact_colors_have_no_error() {
    use crate::pal::RGBA;
    let attr = crate::Attributes::new();
    let pixels = [RGBA::new(10, 20, 30, 255), RGBA::new(200, 100, 50, 128)];
    let img = attr.new_image_borrowed(&pixels, 1, 2).unwrap();
    let centers = [ColorSpace::Lab.to_vector8(pixels[1]), ColorSpace::Lab.to_vector8(pixels[0])];
    let mut out = [MaybeUninit::uninit(); 2];
    assert_eq!(0., remap_to_palette(&img, ColorSpace::Lab, &centers, &mut out).unwrap());
    assert_eq!([1, 0], out.map(|i| unsafe { i.assume_init() }));
}
