//! Non-local means denoising on Lab planes

use crate::erase::filters::reflect_101;
use crate::postprocess::color::LabPlanes;
use crate::postprocess::traits::PostFilter;
use crate::video::types::Frame;

/// Filter strength for lightness
pub const LUMA_STRENGTH: f32 = 10.0;

/// Filter strength for the chroma planes
pub const CHROMA_STRENGTH: f32 = 10.0;

/// Side of the patch compared between pixels
pub const TEMPLATE_SIZE: usize = 7;

/// Side of the window searched for similar patches
pub const SEARCH_SIZE: usize = 21;

/// Colored non-local means
///
/// The frame is converted to Lab; lightness and the two chroma planes are
/// denoised separately (chroma jointly), then converted back.
pub struct Denoise {
    luma_strength: f32,
    chroma_strength: f32,
    template_size: usize,
    search_size: usize,
}

impl Denoise {
    pub fn new() -> Self {
        Self {
            luma_strength: LUMA_STRENGTH,
            chroma_strength: CHROMA_STRENGTH,
            template_size: TEMPLATE_SIZE,
            search_size: SEARCH_SIZE,
        }
    }

    fn denoise_planes(&self, planes: &[&[u8]], width: usize, height: usize, strength: f32) -> Vec<Vec<u8>> {
        let n = width * height;
        let channels = planes.len() as f32;
        let search_half = (self.search_size / 2) as i64;
        let template_half = self.template_size / 2;
        let inv_h2 = 1.0 / (strength * strength);

        let mut weight_sum = vec![0f32; n];
        let mut acc = vec![vec![0f32; n]; planes.len()];
        let mut diff = vec![0f32; n];
        let mut integral = vec![0f64; (width + 1) * (height + 1)];

        for dy in -search_half..=search_half {
            for dx in -search_half..=search_half {
                // Per-pixel squared distance to the shifted image
                for y in 0..height {
                    let sy = reflect_101(y as i64 + dy, height);
                    for x in 0..width {
                        let sx = reflect_101(x as i64 + dx, width);
                        let d: f32 = planes
                            .iter()
                            .map(|p| {
                                let e = p[y * width + x] as f32 - p[sy * width + sx] as f32;
                                e * e
                            })
                            .sum();
                        diff[y * width + x] = d / channels;
                    }
                }

                summed_area(&diff, width, height, &mut integral);

                for y in 0..height {
                    let sy = reflect_101(y as i64 + dy, height);
                    let y0 = y.saturating_sub(template_half);
                    let y1 = (y + template_half + 1).min(height);
                    for x in 0..width {
                        let sx = reflect_101(x as i64 + dx, width);
                        let x0 = x.saturating_sub(template_half);
                        let x1 = (x + template_half + 1).min(width);

                        let area = ((y1 - y0) * (x1 - x0)) as f64;
                        let patch = box_sum(&integral, width, x0, y0, x1, y1) / area;
                        let w = (-(patch as f32) * inv_h2).exp();

                        let i = y * width + x;
                        weight_sum[i] += w;
                        for (plane, out) in planes.iter().zip(acc.iter_mut()) {
                            out[i] += w * plane[sy * width + sx] as f32;
                        }
                    }
                }
            }
        }

        acc.into_iter()
            .map(|plane| {
                plane
                    .iter()
                    .zip(&weight_sum)
                    .map(|(v, w)| (v / w).round().clamp(0.0, 255.0) as u8)
                    .collect()
            })
            .collect()
    }
}

impl Default for Denoise {
    fn default() -> Self {
        Self::new()
    }
}

fn summed_area(values: &[f32], width: usize, height: usize, integral: &mut [f64]) {
    let stride = width + 1;
    integral[..stride].iter_mut().for_each(|v| *v = 0.0);
    for y in 0..height {
        let mut row = 0f64;
        integral[(y + 1) * stride] = 0.0;
        for x in 0..width {
            row += values[y * width + x] as f64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }
}

fn box_sum(integral: &[f64], width: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
    let stride = width + 1;
    integral[y1 * stride + x1] - integral[y0 * stride + x1] - integral[y1 * stride + x0] + integral[y0 * stride + x0]
}

impl PostFilter for Denoise {
    fn name(&self) -> &str {
        "denoise"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        if width == 0 || height == 0 {
            return frame.clone();
        }

        let mut lab = LabPlanes::from_image(frame.as_image());

        let mut luma = self.denoise_planes(&[lab.l.as_slice()], width, height, self.luma_strength);
        let mut chroma = self.denoise_planes(&[lab.a.as_slice(), lab.b.as_slice()], width, height, self.chroma_strength);

        lab.l = luma.remove(0);
        lab.b = chroma.remove(1);
        lab.a = chroma.remove(0);

        Frame::new(lab.to_image())
    }
}
