use super::{Policy, Size};
use crate::core::{DisplaySurface, SizeCalculator};

/// Size calculator driven by what the surface reports about itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedSizeCalculator;

impl SizeCalculator for FixedSizeCalculator {
    fn measure(&self, target: &dyn DisplaySurface) -> Option<Size> {
        target.measured_size().filter(|size| !size.is_empty())
    }

    fn max_size(&self, target: &dyn DisplaySurface) -> Option<Size> {
        target.fixed_size().filter(|size| !size.is_empty())
    }

    fn default_max_size(&self, policy: &Policy) -> Size {
        policy.default_max_size
    }
}
