use crate::pal::{RGBA, RGBA16};
use rgb::ComponentMap;
use std::ops::{Add, AddAssign, Mul};

/// Alpha is scaled up to be comparable with L*a*b* axes, which span roughly 0..100
pub const LAB_ALPHA_SCALE: f32 = 128.;

/// D65 reference white, with Y normalized to 1
const WHITE_X: f32 = 0.950489;
const WHITE_Y: f32 = 1.;
const WHITE_Z: f32 = 1.088840;

// 6/29, the knee of the CIE f(t) function
const LAB_DELTA: f32 = 6. / 29.;

/// 4xf32 color in the clustering space.
///
/// In [`ColorSpace::Rgb`] the components are gamma-encoded R, G, B and linear alpha in 0..1.
/// In [`ColorSpace::Lab`] they are L\*, a\*, b\* and alpha × [`LAB_ALPHA_SCALE`].
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ColorVector(pub [f32; 4]);

impl ColorVector {
    #[inline(always)]
    #[must_use]
    pub fn scale(self, s: f32) -> Self {
        Self(self.0.map(|c| c * s))
    }

    /// Sum of squared differences of all four components
    #[inline(always)]
    #[must_use]
    pub fn dist_squared(&self, other: &Self) -> f32 {
        let [a, b, c, d] = self.0;
        let [e, f, g, h] = other.0;
        (a - e) * (a - e) + (b - f) * (b - f) + (c - g) * (c - g) + (d - h) * (d - h)
    }

    /// Bit pattern usable as a hash key. `-0.` and `0.` are the same color.
    #[inline]
    pub(crate) fn key(&self) -> [u32; 4] {
        self.0.map(|c| (c + 0.).to_bits())
    }
}

impl Add for ColorVector {
    type Output = Self;

    #[inline(always)]
    fn add(self, other: Self) -> Self {
        let [a, b, c, d] = self.0;
        let [e, f, g, h] = other.0;
        Self([a + e, b + f, c + g, d + h])
    }
}

impl AddAssign for ColorVector {
    #[inline(always)]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Mul<f32> for ColorVector {
    type Output = Self;

    #[inline(always)]
    fn mul(self, s: f32) -> Self {
        self.scale(s)
    }
}

/// Space in which colors are averaged and compared
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ColorSpace {
    /// Gamma-encoded sRGB channels, used as-is. Fast, but averages are perceptually uneven.
    Rgb,
    /// CIE L\*a\*b\* (D65). Distances roughly follow perceived difference.
    #[default]
    Lab,
}

impl ColorSpace {
    /// Converts a 16-bit straight-alpha pixel to a clustering vector
    #[must_use]
    pub fn to_vector(self, px: RGBA16) -> ColorVector {
        let px = px.map(|c| f32::from(c) / 65535.);
        match self {
            Self::Rgb => ColorVector([px.r, px.g, px.b, px.a]),
            Self::Lab => {
                let linear = srgb_to_linear([px.r, px.g, px.b]);
                let [l, a, b] = xyz_to_lab(linear_rgb_to_xyz(linear));
                ColorVector([l, a, b, px.a * LAB_ALPHA_SCALE])
            },
        }
    }

    /// Same as [`ColorSpace::to_vector`] for 8-bit pixels
    #[inline]
    #[must_use]
    pub fn to_vector8(self, px: RGBA) -> ColorVector {
        self.to_vector(px.map(|c| u16::from(c) * 257))
    }

    /// Converts a vector back to a displayable 8-bit color.
    ///
    /// Averages of in-gamut colors may end up out of gamut, so the channels are clamped.
    #[must_use]
    pub fn to_color(self, v: ColorVector) -> RGBA {
        let [r, g, b, a] = match self {
            Self::Rgb => v.0,
            Self::Lab => {
                let [l, a, b, alpha] = v.0;
                let [r, g, b] = linear_to_srgb(xyz_to_linear_rgb(lab_to_xyz([l, a, b])));
                [r, g, b, alpha / LAB_ALPHA_SCALE]
            },
        };
        RGBA::new(quantize_channel(r), quantize_channel(g), quantize_channel(b), quantize_channel(a))
    }
}

/// 255.999 rounds 1.0 down to 255 instead of overflowing
#[inline]
fn quantize_channel(x: f32) -> u8 {
    if x.is_nan() {
        return 0;
    }
    (x.clamp(0., 1.) * 255.999) as u8
}

#[inline]
fn gamma_expand(u: f32) -> f32 {
    if u <= 0.04045 {
        u / 12.92
    } else {
        ((f64::from(u) + 0.055) / 1.055).powf(2.4) as f32
    }
}

#[inline]
fn gamma_compress(u: f32) -> f32 {
    if u <= 0.0031308 {
        12.92 * u
    } else {
        (1.055 * f64::from(u).powf(1. / 2.4) - 0.055) as f32
    }
}

/// sRGB transfer function, 0..1 in and out
#[must_use]
pub fn srgb_to_linear(srgb: [f32; 3]) -> [f32; 3] {
    srgb.map(gamma_expand)
}

/// Inverse of [`srgb_to_linear`]
#[must_use]
pub fn linear_to_srgb(rgb: [f32; 3]) -> [f32; 3] {
    rgb.map(gamma_compress)
}

/// Linear sRGB primaries (D65) to CIE XYZ
#[must_use]
pub fn linear_rgb_to_xyz([r, g, b]: [f32; 3]) -> [f32; 3] {
    [
        0.41239080 * r + 0.35758434 * g + 0.18048079 * b,
        0.21263901 * r + 0.71516868 * g + 0.07219232 * b,
        0.01933082 * r + 0.11919478 * g + 0.95053215 * b,
    ]
}

/// Inverse of [`linear_rgb_to_xyz`]
#[must_use]
pub fn xyz_to_linear_rgb([x, y, z]: [f32; 3]) -> [f32; 3] {
    [
        3.24096994 * x - 1.53738318 * y - 0.49861076 * z,
        -0.96924364 * x + 1.8759675 * y + 0.04155506 * z,
        0.05563008 * x - 0.20397696 * y + 1.05697151 * z,
    ]
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > LAB_DELTA * LAB_DELTA * LAB_DELTA {
        t.cbrt()
    } else {
        t / (3. * LAB_DELTA * LAB_DELTA) + 4. / 29.
    }
}

#[inline]
fn lab_f_inv(t: f32) -> f32 {
    if t > LAB_DELTA {
        t * t * t
    } else {
        3. * LAB_DELTA * LAB_DELTA * (t - 4. / 29.)
    }
}

/// CIE XYZ (Y in 0..1) to L\*a\*b\* relative to D65 white
#[must_use]
pub fn xyz_to_lab([x, y, z]: [f32; 3]) -> [f32; 3] {
    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y / WHITE_Y);
    let fz = lab_f(z / WHITE_Z);
    [116. * fy - 16., 500. * (fx - fy), 200. * (fy - fz)]
}

/// Inverse of [`xyz_to_lab`]
#[must_use]
pub fn lab_to_xyz([l, a, b]: [f32; 3]) -> [f32; 3] {
    let fy = (l + 16.) / 116.;
    let fx = fy + a / 500.;
    let fz = fy - b / 200.;
    [WHITE_X * lab_f_inv(fx), WHITE_Y * lab_f_inv(fy), WHITE_Z * lab_f_inv(fz)]
}

#[cfg(test)]
fn assert_close(expected: [f32; 3], actual: [f32; 3], tolerance: f32) {
    for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
        assert!((e - a).abs() <= tolerance, "component {i}: expected {e} but got {a}");
    }
}

#[test]
fn xyz_to_lab_known_value() {
    let lab = xyz_to_lab([0.77, 0.9278, 0.1385]);
    assert_close([97.138_25, -21.555_908, 94.482_48], lab, 0.01);
}

#[test]
fn lab_xyz_inverses() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(1);
    for _ in 0..1000 {
        let xyz: [f32; 3] = [rng.random(), rng.random(), rng.random()];
        assert_close(xyz, lab_to_xyz(xyz_to_lab(xyz)), 1e-4);
    }
    // the linear segment near black
    let dark = [0.001, 0.002, 0.0005];
    assert_close(dark, lab_to_xyz(xyz_to_lab(dark)), 1e-6);
}

#[test]
fn xyz_rgb_inverses() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(2);
    for _ in 0..1000 {
        let rgb: [f32; 3] = [rng.random(), rng.random(), rng.random()];
        assert_close(rgb, xyz_to_linear_rgb(linear_rgb_to_xyz(rgb)), 1e-4);
    }
}

#[test]
fn gamma_inverses() {
    for i in 0..=1000 {
        let u = i as f32 / 1000.;
        assert_close([u; 3], linear_to_srgb(srgb_to_linear([u; 3])), 1e-5);
    }
    assert_eq!(0., gamma_expand(0.));
    assert!((gamma_expand(1.) - 1.).abs() < 1e-6);
}

#[test]
fn full_chain_inverse() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(3);
    for _ in 0..1000 {
        let srgb: [f32; 3] = [rng.random(), rng.random(), rng.random()];
        let lab = xyz_to_lab(linear_rgb_to_xyz(srgb_to_linear(srgb)));
        let back = linear_to_srgb(xyz_to_linear_rgb(lab_to_xyz(lab)));
        assert_close(srgb, back, 1e-4);
        let lab2 = xyz_to_lab(linear_rgb_to_xyz(srgb_to_linear(back)));
        assert_close(lab, lab2, 1e-2);
    }
}

#[test]
fn white_and_black_in_lab() {
    let white = ColorSpace::Lab.to_vector8(RGBA::new(255, 255, 255, 255));
    assert!((white.0[0] - 100.).abs() < 0.01);
    assert!(white.0[1].abs() < 0.05 && white.0[2].abs() < 0.05);
    assert_eq!(LAB_ALPHA_SCALE, white.0[3]);

    let black = ColorSpace::Lab.to_vector8(RGBA::new(0, 0, 0, 0));
    assert!(black.0.iter().all(|c| c.abs() < 1e-4));
}

#[test]
fn rgb_mode_is_exact_for_8bit() {
    for i in 0..=255u8 {
        let c = RGBA::new(i, 255 - i, i / 2, 255 - i / 3);
        assert_eq!(c, ColorSpace::Rgb.to_color(ColorSpace::Rgb.to_vector8(c)));
    }
}

#[test]
fn lab_mode_round_trips_8bit() {
    for i in (0..=255u8).step_by(5) {
        for j in (0..=255u8).step_by(51) {
            let c = RGBA::new(i, j, 255 - i, j);
            assert_eq!(c, ColorSpace::Lab.to_color(ColorSpace::Lab.to_vector8(c)));
        }
    }
    for c in [RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 255, 255), RGBA::new(255, 0, 0, 255), RGBA::new(0, 0, 255, 0)] {
        assert_eq!(c, ColorSpace::Lab.to_color(ColorSpace::Lab.to_vector8(c)));
    }
}

#[test]
fn out_of_gamut_is_clamped() {
    assert_eq!(RGBA::new(255, 0, 255, 255), ColorSpace::Rgb.to_color(ColorVector([1.5, -0.5, 7., 1.])));
    let px = ColorSpace::Lab.to_color(ColorVector([50., 120., -120., 300.]));
    assert_eq!(255, px.a);
}

#[test]
fn vector_arithmetic() {
    let a = ColorVector([1., 2., 3., 4.]);
    let b = ColorVector([0.5, 0.5, 0.5, 0.5]);
    assert_eq!(ColorVector([1.5, 2.5, 3.5, 4.5]), a + b);
    assert_eq!(ColorVector([2., 4., 6., 8.]), a * 2.);
    assert_eq!(0.25 + 2.25 + 6.25 + 12.25, a.dist_squared(&b));
    assert_eq!(ColorVector([0.; 4]).key(), ColorVector([-0.; 4]).key());
}
