//! 8-bit Lab conversion and luma histogram equalization

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram_mut;

use crate::postprocess::traits::PostFilter;
use crate::video::types::Frame;

const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;
const LAB_EPSILON: f32 = 0.008856;
const LAB_KAPPA: f32 = 903.3;

/// A Lab image stored as three 8-bit planes
///
/// Scaling follows the usual 8-bit convention: `L * 255 / 100`, `a + 128`, `b + 128`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabPlanes {
    pub width: u32,
    pub height: u32,
    pub l: Vec<u8>,
    pub a: Vec<u8>,
    pub b: Vec<u8>,
}

fn to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn from_linear(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(f: f32) -> f32 {
    let cube = f * f * f;
    if cube > LAB_EPSILON {
        cube
    } else {
        (f - 16.0 / 116.0) / 7.787
    }
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

pub fn rgb_to_lab(px: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = px.0.map(|c| to_linear(c as f32 / 255.0));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / WHITE_X;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > LAB_EPSILON { 116.0 * fy - 16.0 } else { LAB_KAPPA * y };
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);

    [to_u8(l * 255.0 / 100.0), to_u8(a + 128.0), to_u8(bb + 128.0)]
}

pub fn lab_to_rgb(lab: [u8; 3]) -> Rgb<u8> {
    let l = lab[0] as f32 * 100.0 / 255.0;
    let a = lab[1] as f32 - 128.0;
    let b = lab[2] as f32 - 128.0;

    let fy = (l + 16.0) / 116.0;
    let y = if l > LAB_KAPPA * LAB_EPSILON { fy * fy * fy } else { l / LAB_KAPPA };
    let x = lab_f_inv(fy + a / 500.0) * WHITE_X;
    let z = lab_f_inv(fy - b / 200.0) * WHITE_Z;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875991 * y + 0.041556 * z;
    let bl = 0.055648 * x - 0.204043 * y + 1.057311 * z;

    Rgb([r, g, bl].map(|c| to_u8(from_linear(c.clamp(0.0, 1.0)) * 255.0)))
}

impl LabPlanes {
    pub fn from_image(image: &RgbImage) -> Self {
        let n = image.width() as usize * image.height() as usize;
        let mut planes = Self {
            width: image.width(),
            height: image.height(),
            l: Vec::with_capacity(n),
            a: Vec::with_capacity(n),
            b: Vec::with_capacity(n),
        };

        for px in image.pixels() {
            let [l, a, b] = rgb_to_lab(*px);
            planes.l.push(l);
            planes.a.push(a);
            planes.b.push(b);
        }
        planes
    }

    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = y as usize * self.width as usize + x as usize;
            lab_to_rgb([self.l[i], self.a[i], self.b[i]])
        })
    }
}

/// Histogram equalization of one 8-bit channel, in place
///
/// Levels are remapped through the cumulative distribution so the brightest
/// occupied level lands on 255. A single-level channel is left unchanged.
pub fn equalize_hist(channel: &mut [u8]) {
    let Some(&first) = channel.first() else {
        return;
    };
    if channel.iter().all(|&v| v == first) {
        return;
    }

    let Some(mut plane) = GrayImage::from_raw(channel.len() as u32, 1, channel.to_vec()) else {
        return;
    };
    equalize_histogram_mut(&mut plane);
    channel.copy_from_slice(plane.as_raw());
}

/// Automatic color correction: equalize Lab lightness, keep chroma
pub struct ColorCorrect;

impl ColorCorrect {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ColorCorrect {
    fn default() -> Self {
        Self::new()
    }
}

impl PostFilter for ColorCorrect {
    fn name(&self) -> &str {
        "color_correct"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        let mut lab = LabPlanes::from_image(frame.as_image());
        equalize_hist(&mut lab.l);
        Frame::new(lab.to_image())
    }
}
