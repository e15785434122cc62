//! Pixel filters used while erasing. Blur and bilateral smoothing come from
//! `imageproc`; texture scoring and averaging are plain per-pixel passes.

use image::{GrayImage, Rgb, RgbImage};
use imageproc::filter::bilateral::GaussianEuclideanColorDistance;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32};

/// Index into `0..n` with mirror reflection that does not repeat the edge
/// sample (`dcb|abcd|cba`)
pub(crate) fn reflect_101(i: i64, n: usize) -> usize {
    let n = n as i64;
    if n <= 1 {
        return 0;
    }

    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// BT.601 luma, rounded like an 8-bit grayscale conversion
pub(crate) fn luma(px: &Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round().min(255.0) as u8
}

/// Population standard deviation of the grayscale image
pub fn texture_score(image: &RgbImage) -> f64 {
    let n = image.width() as u64 * image.height() as u64;
    if n == 0 {
        return 0.0;
    }

    let (sum, sum_sq) = image.pixels().fold((0f64, 0f64), |(s, sq), px| {
        let v = luma(px) as f64;
        (s + v, sq + v * v)
    });

    let mean = sum / n as f64;
    (sum_sq / n as f64 - mean * mean).max(0.0).sqrt()
}

/// Per-channel average of two equally sized images, rounded
pub fn blend_equal(a: &RgbImage, b: &RgbImage) -> RgbImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());

    let mut out = a.clone();
    for (dst, src) in out.pixels_mut().zip(b.pixels()) {
        for c in 0..3 {
            dst[c] = ((dst[c] as f32 * 0.5 + src[c] as f32 * 0.5).round()).clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Sigma an unspecified-sigma Gaussian gets for a `ksize` kernel
pub(crate) fn sigma_for_kernel(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian falloff of an 8-bit mask, as alpha in `0.0..=1.0`
///
/// Sigma follows from the `ksize` kernel size; borders repeat the edge sample.
pub fn soft_alpha(mask: &GrayImage, ksize: usize) -> Vec<f32> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }

    gaussian_blur_f32(mask, sigma_for_kernel(ksize))
        .pixels()
        .map(|px| px[0] as f32 / 255.0)
        .collect()
}

/// Edge-preserving bilateral smoothing over a `diameter` wide window
///
/// Neighbors are weighted by spatial distance and by the Euclidean color
/// difference to the center pixel.
pub fn bilateral_smooth(image: &RgbImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let radius = (diameter / 2).clamp(1, u8::MAX as u32) as u8;
    bilateral_filter(image, radius, sigma_space, GaussianEuclideanColorDistance::new(sigma_color))
}
