use image::{GrayImage, RgbImage};

/// One concrete inpainting technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Technique {
    Telea,
    NavierStokes,
}

impl Technique {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Telea => "telea",
            Self::NavierStokes => "navier_stokes",
        }
    }
}

/// Reconstructs masked pixels from their surroundings
///
/// Implementations must be pure: the same image, mask, radius and technique
/// always produce the same output. Workers share one instance, so it must be
/// `Send + Sync`.
pub trait Inpaint: Send + Sync {
    /// Fill every pixel where `mask` is non-zero
    ///
    /// # Arguments
    ///
    /// * `image` - The region to repair; pixels under the mask are ignored as input
    /// * `mask` - Same size as `image`; non-zero marks pixels to reconstruct
    /// * `radius` - Neighborhood radius considered for each reconstructed pixel
    /// * `technique` - Which algorithm to run
    ///
    /// Returns a new image of the same size; unmasked pixels are copied unchanged.
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, radius: u32, technique: Technique) -> RgbImage;
}
