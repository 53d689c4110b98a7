use crate::colorspace::{ColorSpace, ColorVector};
use arrayvec::ArrayVec;

/// 8-bit RGBA in sRGB, straight alpha. Palette entries use this format.
pub type RGBA = rgb::RGBA<u8>;

/// 16-bit RGBA in sRGB, straight alpha
pub type RGBA16 = rgb::RGBA<u16>;

#[cfg(feature = "large_palettes")]
pub type PalIndex = u16;

#[cfg(not(feature = "large_palettes"))]
pub type PalIndex = u8;

pub type PalLen = u16;

/// Centers are stored inline, and really large palettes would blow up the stack
pub const MAX_COLORS: usize = if PalIndex::MAX == 255 { 256 } else { 2048 };

/// Cluster centers in the clustering color space, in palette order
pub(crate) type Centers = ArrayVec<ColorVector, MAX_COLORS>;

/// Index of the center closest to `px`, and the squared distance to it.
///
/// On ties the lowest index wins.
#[inline]
pub(crate) fn nearest_center(centers: &[ColorVector], px: &ColorVector) -> (usize, f32) {
    let mut best_idx = 0;
    let mut best_dist = f32::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let dist = px.dist_squared(center);
        if dist < best_dist || i == 0 {
            best_dist = dist;
            best_idx = i;
        }
    }
    (best_idx, best_dist)
}

/// Converts centers to displayable colors, always returning exactly `palette_size` entries.
///
/// If clustering ended up with fewer centers, the rest is filled with copies of the first color.
pub(crate) fn build_palette(centers: &[ColorVector], color_space: ColorSpace, palette_size: PalLen) -> Vec<RGBA> {
    let palette_size = usize::from(palette_size);
    debug_assert!(centers.len() <= palette_size);

    let mut palette: Vec<RGBA> = centers.iter().take(palette_size).map(|&c| color_space.to_color(c)).collect();
    let filler = palette.first().copied().unwrap_or_default();
    palette.resize(palette_size, filler);
    palette
}

#[test]
fn nearest_prefers_lowest_index() {
    let centers = [ColorVector([1.; 4]), ColorVector([0.; 4]), ColorVector([0.; 4])];
    assert_eq!((1, 0.), nearest_center(&centers, &ColorVector([0.; 4])));
    assert_eq!(0, nearest_center(&centers, &ColorVector([0.5; 4])).0);
    assert_eq!(0, nearest_center(&centers[..1], &ColorVector([f32::NAN; 4])).0);
}

#[test]
fn palette_is_padded() {
    let centers = [ColorVector([1., 0., 0., 1.]), ColorVector([0., 0., 1., 1.])];
    let pal = build_palette(&centers, ColorSpace::Rgb, 5);
    assert_eq!(5, pal.len());
    assert_eq!(RGBA::new(255, 0, 0, 255), pal[0]);
    assert_eq!(RGBA::new(0, 0, 255, 255), pal[1]);
    assert!(pal[2..].iter().all(|&c| c == pal[0]));

    assert_eq!(1, build_palette(&centers[..1], ColorSpace::Lab, 1).len());
}

#[test]
fn max_colors_matches_index_type() {
    assert!(MAX_COLORS - 1 <= PalIndex::MAX as usize);
}
