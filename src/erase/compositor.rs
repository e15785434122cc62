use std::sync::Arc;

use image::{imageops, GrayImage, Luma, RgbImage};
use tracing::trace;

use crate::areas::{AreaSet, Rectangle};
use crate::config::{InpaintMethod, ProcessingConfig};
use crate::erase::filters::{bilateral_smooth, blend_equal, soft_alpha, texture_score};
use crate::erase::inpaint::FastMarchingInpainter;
use crate::erase::traits::{Inpaint, Technique};
use crate::video::types::Frame;

/// Neighborhood radius handed to the inpainter
pub const INPAINT_RADIUS: u32 = 7;

/// Texture score above which mixed mode uses Telea alone
pub const TEXTURE_THRESHOLD: f64 = 30.0;

/// Bilateral filter sigma, used for both color and space
pub const BILATERAL_SIGMA: f32 = 100.0;

/// Kernel size of the Gaussian that softens the blend mask
pub const BLEND_KERNEL: usize = 31;

/// A margin-expanded area clipped to the frame, with the original area in
/// region-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Masked part, relative to the region origin and clipped to it
    pub mask: Rectangle,
}

impl WorkingRegion {
    /// Expand `rect` by `margin` on all sides and clip to a `frame_w` x `frame_h` frame
    ///
    /// Returns `None` when nothing of the area lies inside the frame.
    pub fn locate(rect: &Rectangle, margin: u32, frame_w: u32, frame_h: u32) -> Option<Self> {
        if rect.is_empty() || rect.x >= frame_w || rect.y >= frame_h {
            return None;
        }

        let x1 = rect.x.saturating_sub(margin);
        let y1 = rect.y.saturating_sub(margin);
        let x2 = rect.right().saturating_add(margin).min(frame_w);
        let y2 = rect.bottom().saturating_add(margin).min(frame_h);

        let (width, height) = (x2 - x1, y2 - y1);
        let mask_x = rect.x - x1;
        let mask_y = rect.y - y1;
        let mask = Rectangle::new(
            mask_x,
            mask_y,
            rect.w.min(width - mask_x),
            rect.h.min(height - mask_y),
        );

        Some(Self { x: x1, y: y1, width, height, mask })
    }

    fn contains_mask(&self, x: u32, y: u32) -> bool {
        (self.mask.x..self.mask.right()).contains(&x) && (self.mask.y..self.mask.bottom()).contains(&y)
    }
}

/// Erases watermark areas from frames
///
/// Areas are processed in [`AreaSet`] order, each one working on the frame
/// as left by the previous ones.
#[derive(Clone)]
pub struct FrameCompositor {
    method: InpaintMethod,
    blur_strength: u32,
    margin: u32,
    inpainter: Arc<dyn Inpaint>,
}

impl std::fmt::Debug for FrameCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCompositor")
            .field("method", &self.method)
            .field("blur_strength", &self.blur_strength)
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}

impl FrameCompositor {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self::with_inpainter(config, Arc::new(FastMarchingInpainter::new()))
    }

    pub fn with_inpainter(config: &ProcessingConfig, inpainter: Arc<dyn Inpaint>) -> Self {
        Self {
            method: config.inpaint_method,
            blur_strength: config.blur_strength,
            margin: config.margin,
            inpainter,
        }
    }

    /// Erase every area of `areas` from `frame` in place
    pub fn erase(&self, frame: &mut Frame, areas: &AreaSet) {
        for rect in areas.iter() {
            self.erase_area(frame.as_image_mut(), rect);
        }
    }

    fn erase_area(&self, image: &mut RgbImage, rect: &Rectangle) {
        let Some(region) = WorkingRegion::locate(rect, self.margin, image.width(), image.height()) else {
            trace!("Area {} lies outside the frame, skipping", rect);
            return;
        };

        let original = imageops::crop_imm(&*image, region.x, region.y, region.width, region.height).to_image();

        let mask = GrayImage::from_fn(region.width, region.height, |x, y| {
            if region.contains_mask(x, y) { Luma([255]) } else { Luma([0]) }
        });

        let mut inpainted = self.inpaint_region(&original, &mask);

        if self.blur_strength > 1 {
            self.smooth_masked(&mut inpainted, &region.mask);
        }

        let alpha = soft_alpha(&mask, BLEND_KERNEL);
        let blended = composite(&inpainted, &original, &alpha);

        for (x, y, px) in blended.enumerate_pixels() {
            image.put_pixel(region.x + x, region.y + y, *px);
        }
    }

    fn inpaint_region(&self, region: &RgbImage, mask: &GrayImage) -> RgbImage {
        let run = |technique: Technique| {
            trace!("Inpainting {}x{} region with {}", region.width(), region.height(), technique.name());
            self.inpainter.inpaint(region, mask, INPAINT_RADIUS, technique)
        };

        match self.method {
            InpaintMethod::Telea => run(Technique::Telea),
            InpaintMethod::NavierStokes => run(Technique::NavierStokes),
            InpaintMethod::Mixed => {
                let score = texture_score(region);
                trace!("Texture score {:.1}", score);
                if score > TEXTURE_THRESHOLD {
                    run(Technique::Telea)
                } else {
                    blend_equal(&run(Technique::NavierStokes), &run(Technique::Telea))
                }
            }
        }
    }

    /// Bilateral smoothing of the masked sub-region only
    fn smooth_masked(&self, image: &mut RgbImage, mask: &Rectangle) {
        if mask.is_empty() {
            return;
        }

        let roi = imageops::crop_imm(&*image, mask.x, mask.y, mask.w, mask.h).to_image();
        let smoothed = bilateral_smooth(&roi, self.blur_strength, BILATERAL_SIGMA, BILATERAL_SIGMA);

        for (x, y, px) in smoothed.enumerate_pixels() {
            image.put_pixel(mask.x + x, mask.y + y, *px);
        }
    }
}

/// `inpainted * alpha + original * (1 - alpha)` per channel
pub(crate) fn composite(inpainted: &RgbImage, original: &RgbImage, alpha: &[f32]) -> RgbImage {
    let mut out = original.clone();
    for ((dst, src), &a) in out.pixels_mut().zip(inpainted.pixels()).zip(alpha) {
        let a = a.clamp(0.0, 1.0);
        for c in 0..3 {
            let v = src[c] as f32 * a + dst[c] as f32 * (1.0 - a);
            dst[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::Mutex;

    /// Records requested techniques and paints a solid color per technique
    #[derive(Default)]
    struct RecordingInpainter {
        calls: Mutex<Vec<Technique>>,
        first_pixels: Mutex<Vec<[u8; 3]>>,
    }

    impl RecordingInpainter {
        fn calls(&self) -> Vec<Technique> {
            self.calls.lock().unwrap().clone()
        }

        fn first_pixels(&self) -> Vec<[u8; 3]> {
            self.first_pixels.lock().unwrap().clone()
        }
    }

    impl Inpaint for RecordingInpainter {
        fn inpaint(&self, image: &RgbImage, mask: &GrayImage, _radius: u32, technique: Technique) -> RgbImage {
            self.calls.lock().unwrap().push(technique);
            self.first_pixels.lock().unwrap().push(image.get_pixel(0, 0).0);
            let fill = match technique {
                Technique::Telea => Rgb([250, 250, 250]),
                Technique::NavierStokes => Rgb([0, 0, 0]),
            };
            let mut out = image.clone();
            for (x, y, m) in mask.enumerate_pixels() {
                if m[0] != 0 {
                    out.put_pixel(x, y, fill);
                }
            }
            out
        }
    }

    fn config(method: InpaintMethod, blur: u32, margin: u32) -> ProcessingConfig {
        ProcessingConfig { inpaint_method: method, blur_strength: blur, margin, ..ProcessingConfig::default() }
    }

    fn checkerboard(w: u32, h: u32) -> Frame {
        Frame::new(RgbImage::from_fn(w, h, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        }))
    }

    #[test]
    fn test_region_clamped_at_frame_edges() {
        let region = WorkingRegion::locate(&Rectangle::new(2, 3, 10, 10), 20, 50, 40).unwrap();
        assert_eq!((region.x, region.y, region.width, region.height), (0, 0, 32, 33));
        assert_eq!(region.mask, Rectangle::new(2, 3, 10, 10));

        let region = WorkingRegion::locate(&Rectangle::new(40, 30, 10, 10), 20, 50, 40).unwrap();
        assert_eq!((region.x, region.y, region.width, region.height), (20, 10, 30, 30));
        assert_eq!(region.mask, Rectangle::new(20, 20, 10, 10));
    }

    #[test]
    fn test_region_clips_area_overhanging_frame() {
        let region = WorkingRegion::locate(&Rectangle::new(45, 35, 100, 100), 5, 50, 40).unwrap();
        assert_eq!((region.x, region.y, region.width, region.height), (40, 30, 10, 10));
        assert_eq!(region.mask, Rectangle::new(5, 5, 5, 5));

        assert!(WorkingRegion::locate(&Rectangle::new(60, 0, 5, 5), 100, 50, 40).is_none());
        assert!(WorkingRegion::locate(&Rectangle::new(0, 0, 0, 5), 3, 50, 40).is_none());
    }

    #[test]
    fn test_erase_near_edges_does_not_panic() {
        let compositor = FrameCompositor::new(&config(InpaintMethod::Telea, 5, 50));
        let mut frame = checkerboard(32, 24);
        let areas = AreaSet::new(vec![
            Rectangle::new(0, 0, 12, 12),
            Rectangle::new(28, 20, 40, 40),
            Rectangle::new(100, 100, 5, 5),
        ]);
        compositor.erase(&mut frame, &areas);
        assert_eq!((frame.width(), frame.height()), (32, 24));
    }

    #[test]
    fn test_flat_region_selects_blend_of_both() {
        let inpainter = Arc::new(RecordingInpainter::default());
        let compositor = FrameCompositor::with_inpainter(&config(InpaintMethod::Mixed, 1, 4), inpainter.clone());

        let mut frame = Frame::new_filled(40, 40, [128, 128, 128]);
        compositor.erase(&mut frame, &AreaSet::new(vec![Rectangle::new(10, 10, 12, 12)]));

        assert_eq!(inpainter.calls(), vec![Technique::NavierStokes, Technique::Telea]);
        // Stub fills average to 125; the soft alpha pulls toward the original 128
        let center = frame.get_pixel(16, 16)[0];
        assert!((125..128).contains(&center), "center {}", center);
    }

    #[test]
    fn test_textured_region_selects_telea() {
        let inpainter = Arc::new(RecordingInpainter::default());
        let compositor = FrameCompositor::with_inpainter(&config(InpaintMethod::Mixed, 1, 4), inpainter.clone());

        let mut frame = checkerboard(40, 40);
        compositor.erase(&mut frame, &AreaSet::new(vec![Rectangle::new(10, 10, 12, 12)]));

        assert_eq!(inpainter.calls(), vec![Technique::Telea]);
    }

    #[test]
    fn test_fixed_methods_call_single_technique() {
        for (method, expected) in [
            (InpaintMethod::Telea, Technique::Telea),
            (InpaintMethod::NavierStokes, Technique::NavierStokes),
        ] {
            let inpainter = Arc::new(RecordingInpainter::default());
            let compositor = FrameCompositor::with_inpainter(&config(method, 1, 2), inpainter.clone());
            let mut frame = Frame::new_filled(20, 20, [1, 2, 3]);
            compositor.erase(&mut frame, &AreaSet::new(vec![Rectangle::new(5, 5, 5, 5)]));
            assert_eq!(inpainter.calls(), vec![expected]);
        }
    }

    #[test]
    fn test_later_areas_see_earlier_edits() {
        let inpainter = Arc::new(RecordingInpainter::default());
        let compositor = FrameCompositor::with_inpainter(&config(InpaintMethod::Telea, 1, 0), inpainter.clone());

        let mut frame = Frame::new_filled(60, 60, [10, 10, 10]);
        let areas = AreaSet::new(vec![Rectangle::new(10, 10, 30, 30), Rectangle::new(20, 20, 10, 10)]);
        compositor.erase(&mut frame, &areas);

        // The second area lies inside the first and receives the first pass output
        let seen = inpainter.first_pixels();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], [10, 10, 10]);
        assert!(seen[1][0] >= 248, "second area saw {:?}", seen[1]);
        assert!(frame.get_pixel(12, 25)[0] >= 248);
    }

    #[test]
    fn test_output_between_inpainted_and_original() {
        let inpainter = Arc::new(RecordingInpainter::default());
        let compositor = FrameCompositor::with_inpainter(&config(InpaintMethod::Telea, 1, 10), inpainter.clone());

        let original = Frame::new(RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90])));
        let mut frame = original.clone();
        let rect = Rectangle::new(20, 15, 16, 12);
        compositor.erase(&mut frame, &AreaSet::new(vec![rect]));

        let region = WorkingRegion::locate(&rect, 10, 64, 48).unwrap();
        for y in 0..48 {
            for x in 0..64 {
                let orig = original.get_pixel(x, y);
                let out = frame.get_pixel(x, y);
                let in_mask = x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom();
                let inside_region = x >= region.x && x < region.x + region.width
                    && y >= region.y && y < region.y + region.height;

                if !inside_region {
                    assert_eq!(out, orig);
                    continue;
                }

                let inpainted = if in_mask { [250, 250, 250] } else { orig };
                for c in 0..3 {
                    let lo = orig[c].min(inpainted[c]);
                    let hi = orig[c].max(inpainted[c]);
                    assert!((lo..=hi).contains(&out[c]), "pixel ({x},{y}) ch {c}: {} not in {lo}..={hi}", out[c]);
                }
            }
        }
    }

    #[test]
    fn test_erase_is_deterministic() {
        let compositor = FrameCompositor::new(&config(InpaintMethod::Mixed, 5, 6));
        let areas = AreaSet::new(vec![Rectangle::new(8, 8, 10, 6)]);

        let mut a = checkerboard(32, 24);
        let mut b = a.clone();
        compositor.erase(&mut a, &areas);
        compositor.erase(&mut b, &areas);
        assert_eq!(a, b);
    }
}
