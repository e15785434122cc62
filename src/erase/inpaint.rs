//! Fast-marching inpainting.
//!
//! Masked pixels are filled in order of their distance from the mask
//! boundary. The arrival time `T` is propagated with a first-order eikonal
//! solver; every pixel is reconstructed as it is reached, from already known
//! pixels inside a circular neighborhood. The two techniques differ only in
//! how neighbors are weighted:
//!
//! - **Telea**: direction along the distance gradient, inverse cube distance,
//!   and level-set proximity.
//! - **Navier-Stokes**: inverse cube distance and alignment with the image
//!   isophote at the neighbor, so edges that hit the mask are continued
//!   into it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, Rgb, RgbImage};

use crate::erase::traits::{Inpaint, Technique};

const UNREACHED: f32 = 1.0e6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Known,
    Band,
    Inside,
}

#[derive(Debug, Clone, Copy)]
struct Arrival {
    t: f32,
    idx: usize,
}

impl PartialEq for Arrival {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Arrival {}

impl PartialOrd for Arrival {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Arrival {
    // Min-heap on arrival time, ties broken by scan order
    fn cmp(&self, other: &Self) -> Ordering {
        other.t.total_cmp(&self.t).then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Pure-Rust fast-marching inpainter implementing both techniques
#[derive(Debug, Clone, Copy, Default)]
pub struct FastMarchingInpainter;

impl FastMarchingInpainter {
    pub fn new() -> Self {
        Self
    }
}

impl Inpaint for FastMarchingInpainter {
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32, technique: Technique) -> RgbImage {
        debug_assert_eq!(image.dimensions(), mask.dimensions());
        Marcher::new(image, mask, radius, technique).run()
    }
}

struct Marcher {
    width: usize,
    height: usize,
    radius: i64,
    technique: Technique,
    state: Vec<State>,
    t: Vec<f32>,
    pixels: Vec<[f32; 3]>,
    heap: BinaryHeap<Arrival>,
}

impl Marcher {
    fn new(image: &RgbImage, mask: &GrayImage, radius: u32, technique: Technique) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);

        let pixels = image
            .pixels()
            .map(|px| [px[0] as f32, px[1] as f32, px[2] as f32])
            .collect();

        let state: Vec<State> = mask
            .pixels()
            .map(|m| if m[0] != 0 { State::Inside } else { State::Known })
            .collect();
        let t = state
            .iter()
            .map(|s| if *s == State::Inside { UNREACHED } else { 0.0 })
            .collect();

        let mut marcher = Self {
            width,
            height,
            radius: radius.max(1) as i64,
            technique,
            state,
            t,
            pixels,
            heap: BinaryHeap::new(),
        };
        marcher.seed_band();
        marcher
    }

    /// Known pixels touching the mask form the initial narrow band
    fn seed_band(&mut self) {
        for idx in 0..self.state.len() {
            if self.state[idx] != State::Inside {
                continue;
            }
            for n in self.neighbors(idx).into_iter().flatten() {
                if self.state[n] == State::Known {
                    self.state[n] = State::Band;
                    self.heap.push(Arrival { t: 0.0, idx: n });
                }
            }
        }
    }

    fn neighbors(&self, idx: usize) -> [Option<usize>; 4] {
        let (x, y) = (idx % self.width, idx / self.width);
        [
            (x > 0).then(|| idx - 1),
            (x + 1 < self.width).then(|| idx + 1),
            (y > 0).then(|| idx - self.width),
            (y + 1 < self.height).then(|| idx + self.width),
        ]
    }

    fn run(mut self) -> RgbImage {
        while let Some(Arrival { idx, .. }) = self.heap.pop() {
            if self.state[idx] == State::Known {
                continue;
            }
            self.state[idx] = State::Known;

            for n in self.neighbors(idx).into_iter().flatten() {
                if self.state[n] != State::Inside {
                    continue;
                }
                self.t[n] = self.arrival_time(n);
                self.fill(n);
                self.state[n] = State::Band;
                self.heap.push(Arrival { t: self.t[n], idx: n });
            }
        }

        self.into_image()
    }

    fn is_reached(&self, idx: Option<usize>) -> Option<f32> {
        idx.filter(|&i| self.state[i] != State::Inside).map(|i| self.t[i])
    }

    /// Smallest eikonal solution over the four quadrant pairs
    fn arrival_time(&self, idx: usize) -> f32 {
        let [left, right, up, down] = self.neighbors(idx);
        let pairs = [(left, up), (right, up), (left, down), (right, down)];

        pairs
            .iter()
            .map(|&(a, b)| solve_eikonal(self.is_reached(a), self.is_reached(b)))
            .fold(UNREACHED, f32::min)
    }

    /// Central difference of `T` where both sides are reached, one-sided otherwise
    fn distance_gradient(&self, idx: usize) -> (f32, f32) {
        let [left, right, up, down] = self.neighbors(idx);
        let t = self.t[idx];
        let diff = |lo: Option<f32>, hi: Option<f32>| match (lo, hi) {
            (Some(lo), Some(hi)) => (hi - lo) * 0.5,
            (None, Some(hi)) => hi - t,
            (Some(lo), None) => t - lo,
            (None, None) => 0.0,
        };
        (
            diff(self.is_reached(left), self.is_reached(right)),
            diff(self.is_reached(up), self.is_reached(down)),
        )
    }

    fn intensity(&self, idx: usize) -> f32 {
        let [r, g, b] = self.pixels[idx];
        0.299 * r + 0.587 * g + 0.114 * b
    }

    /// Image gradient at a known pixel, using known neighbors only
    fn image_gradient(&self, idx: usize) -> (f32, f32) {
        let [left, right, up, down] = self.neighbors(idx);
        let known = |n: Option<usize>| n.filter(|&i| self.state[i] != State::Inside).map(|i| self.intensity(i));
        let v = self.intensity(idx);
        let diff = |lo: Option<f32>, hi: Option<f32>| match (lo, hi) {
            (Some(lo), Some(hi)) => (hi - lo) * 0.5,
            (None, Some(hi)) => hi - v,
            (Some(lo), None) => v - lo,
            (None, None) => 0.0,
        };
        (diff(known(left), known(right)), diff(known(up), known(down)))
    }

    fn fill(&mut self, idx: usize) {
        let (x, y) = ((idx % self.width) as i64, (idx / self.width) as i64);
        let grad_t = self.distance_gradient(idx);
        let t = self.t[idx];
        let r2_max = self.radius * self.radius;

        let mut acc = [0f32; 3];
        let mut weight_sum = 0f32;

        for ny in (y - self.radius).max(0)..=(y + self.radius).min(self.height as i64 - 1) {
            for nx in (x - self.radius).max(0)..=(x + self.radius).min(self.width as i64 - 1) {
                let (rx, ry) = ((x - nx) as f32, (y - ny) as f32);
                let d2 = (x - nx).pow(2) + (y - ny).pow(2);
                if d2 == 0 || d2 > r2_max {
                    continue;
                }

                let n = ny as usize * self.width + nx as usize;
                if self.state[n] == State::Inside {
                    continue;
                }

                let len2 = d2 as f32;
                let dst = 1.0 / (len2 * len2.sqrt());

                let w = match self.technique {
                    Technique::Telea => {
                        let mut dir = rx * grad_t.0 + ry * grad_t.1;
                        if dir.abs() <= 0.01 {
                            dir = 1.0e-6;
                        }
                        let lev = 1.0 / (1.0 + (self.t[n] - t).abs());
                        (dir * dst * lev).abs()
                    }
                    Technique::NavierStokes => {
                        // Isophote is the gradient rotated by 90 degrees
                        let (gx, gy) = self.image_gradient(n);
                        let (ix, iy) = (-gy, gx);
                        let iso_len = (ix * ix + iy * iy).sqrt();
                        let align = if iso_len > 1.0e-3 {
                            (rx * ix + ry * iy).abs() / (iso_len * len2.sqrt())
                        } else {
                            0.0
                        };
                        dst * (align + 0.05)
                    }
                };

                let px = self.pixels[n];
                for c in 0..3 {
                    acc[c] += w * px[c];
                }
                weight_sum += w;
            }
        }

        if weight_sum > 0.0 {
            for c in 0..3 {
                self.pixels[idx][c] = acc[c] / weight_sum;
            }
        }
    }

    fn into_image(self) -> RgbImage {
        let width = self.width;
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let px = self.pixels[y as usize * width + x as usize];
            Rgb(px.map(|v| v.round().clamp(0.0, 255.0) as u8))
        })
    }
}

/// First-order upwind solution of `|grad T| = 1` from two neighbors
fn solve_eikonal(a: Option<f32>, b: Option<f32>) -> f32 {
    match (a, b) {
        (Some(t1), Some(t2)) => {
            let disc = 2.0 - (t1 - t2) * (t1 - t2);
            if disc < 0.0 {
                return 1.0 + t1.min(t2);
            }
            let r = disc.sqrt();
            let s = (t1 + t2 - r) * 0.5;
            if s >= t1 && s >= t2 {
                s
            } else if s + r >= t1 && s + r >= t2 {
                s + r
            } else {
                1.0 + t1.min(t2)
            }
        }
        (Some(t), None) | (None, Some(t)) => 1.0 + t,
        (None, None) => UNREACHED,
    }
}
