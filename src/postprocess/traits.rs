use crate::video::types::Frame;

/// A cosmetic frame filter applied after erasure
///
/// Filters are pure `Frame -> Frame` transforms. They are lossy and not
/// idempotent: running a filter twice generally differs from running it once.
pub trait PostFilter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Produce the filtered frame
    fn apply(&self, frame: &Frame) -> Frame;
}
