use image::RgbImage;
use imageproc::filter::filter_clamped;
use imageproc::kernel::Kernel;

use crate::postprocess::traits::PostFilter;
use crate::video::types::Frame;

/// 3x3 sharpening kernel, row major
pub const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// Fixed-kernel sharpening, borders repeat the edge sample
pub struct Sharpen;

impl Sharpen {
    pub fn new() -> Self {
        Self
    }

    fn convolve(&self, image: &RgbImage) -> RgbImage {
        filter_clamped::<_, i32, u8>(image, Kernel::new(&SHARPEN_KERNEL, 3, 3))
    }
}

impl Default for Sharpen {
    fn default() -> Self {
        Self::new()
    }
}

impl PostFilter for Sharpen {
    fn name(&self) -> &str {
        "sharpen"
    }

    fn apply(&self, frame: &Frame) -> Frame {
        Frame::new(self.convolve(frame.as_image()))
    }
}
