use image::{imageops, ImageBuffer, Rgb, RgbImage};

/// Longer side of a preview frame, in pixels
pub const PREVIEW_MAX_SIDE: u32 = 500;

/// Represents a single video frame
///
/// This is a thin wrapper around an RGB image buffer. Frames move by value
/// through the pipeline (source, job, result, sink) and are never shared
/// mutably between threads.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        Self { buffer: ImageBuffer::new(width, height) }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb(color));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Consume the frame, returning the image buffer
    pub fn into_image(self) -> RgbImage {
        self.buffer
    }

    /// Number of bytes in one packed rgb24 frame of this size
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Raw packed rgb24 bytes
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Create a frame from packed rgb24 bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Downscaled copy whose longer side is at most `max_side`
    pub fn thumbnail(&self, max_side: u32) -> Frame {
        let longest = self.width().max(self.height());
        if longest <= max_side || longest == 0 {
            return self.clone();
        }

        let scale = max_side as f64 / longest as f64;
        let width = ((self.width() as f64 * scale) as u32).max(1);
        let height = ((self.height() as f64 * scale) as u32).max(1);
        let resized = imageops::resize(&self.buffer, width, height, imageops::FilterType::Triangle);
        Frame::new(resized)
    }

    /// Save the frame as an image file (format from extension)
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Metadata of an opened video source
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
    pub codec: String,
}

impl VideoMetadata {
    pub fn frame_bytes(&self) -> usize {
        Frame::byte_len(self.width, self.height)
    }
}

/// A frame submitted for processing, tagged with its position in the input
#[derive(Debug)]
pub struct FrameJob {
    pub sequence_index: u64,
    pub frame: Frame,
}

/// A processed frame, tagged with the index of the job it came from
#[derive(Debug)]
pub struct FrameResult {
    pub sequence_index: u64,
    pub frame: Frame,
}

/// Downscaled frame delivered to preview consumers
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub frame: Frame,
    pub index: u64,
    pub total: u64,
}

impl PreviewFrame {
    pub fn from_frame(frame: &Frame, index: u64, total: u64) -> Self {
        Self {
            frame: frame.thumbnail(PREVIEW_MAX_SIDE),
            index,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_bytes_roundtrip_size() {
        let frame = Frame::new_filled(4, 3, [1, 2, 3]);
        assert_eq!(frame.as_rgb_bytes().len(), Frame::byte_len(4, 3));

        let rebuilt = Frame::from_rgb_bytes(4, 3, frame.as_rgb_bytes().to_vec()).unwrap();
        assert_eq!(rebuilt, frame);
        assert!(Frame::from_rgb_bytes(4, 3, vec![0; 5]).is_none());
    }

    #[test]
    fn test_thumbnail_limits_longer_side() {
        let frame = Frame::new_black(1000, 400);
        let thumb = frame.thumbnail(PREVIEW_MAX_SIDE);
        assert_eq!(thumb.width(), 500);
        assert_eq!(thumb.height(), 200);

        let small = Frame::new_black(100, 50);
        assert_eq!(small.thumbnail(PREVIEW_MAX_SIDE).width(), 100);
    }
}
