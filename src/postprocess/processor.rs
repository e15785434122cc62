use tracing::debug;

use crate::config::ProcessingConfig;
use crate::postprocess::color::ColorCorrect;
use crate::postprocess::denoise::Denoise;
use crate::postprocess::sharpen::Sharpen;
use crate::postprocess::traits::PostFilter;
use crate::video::types::Frame;

/// Runs the enabled post filters in their fixed order:
/// denoise, then sharpen, then color correction
pub struct PostProcessor {
    filters: Vec<Box<dyn PostFilter>>,
}

impl PostProcessor {
    pub fn new(config: &ProcessingConfig) -> Self {
        let mut filters: Vec<Box<dyn PostFilter>> = Vec::new();

        if config.denoise {
            filters.push(Box::new(Denoise::new()));
        }
        if config.sharpen {
            filters.push(Box::new(Sharpen::new()));
        }
        if config.color_correct {
            filters.push(Box::new(ColorCorrect::new()));
        }

        let processor = Self { filters };
        debug!("Post filters: {:?}", processor.filter_names());
        processor
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn process(&self, frame: Frame) -> Frame {
        self.filters.iter().fold(frame, |frame, filter| filter.apply(&frame))
    }
}

impl std::fmt::Debug for PostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostProcessor").field("filters", &self.filter_names()).finish()
    }
}
