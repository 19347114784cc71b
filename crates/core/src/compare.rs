//! Before/after split view state.
//!
//! Purely presentational: the divider position is a ratio of the view
//! width, kept inside `[MIN_RATIO, MAX_RATIO]` so neither side collapses.

/// Smallest divider ratio.
pub const MIN_RATIO: f32 = 0.05;

/// Largest divider ratio.
pub const MAX_RATIO: f32 = 0.95;

/// Clip insets, in percent, for the two stacked images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipInsets {
    /// Right inset of the "before" layer.
    pub before_right: f32,
    /// Left inset of the "after" layer.
    pub after_left: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareView {
    ratio: f32,
}

impl Default for CompareView {
    fn default() -> Self {
        Self { ratio: 0.5 }
    }
}

impl CompareView {
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() {
            self.ratio = ratio.clamp(MIN_RATIO, MAX_RATIO);
        }
    }

    /// Move the divider to pointer position `x` over a view spanning
    /// `left .. left + width`.
    pub fn drag_to(&mut self, x: f32, left: f32, width: f32) {
        if width > 0.0 {
            self.set_ratio((x - left) / width);
        }
    }

    pub fn insets(&self) -> ClipInsets {
        ClipInsets {
            before_right: 100.0 * (1.0 - self.ratio),
            after_left: 100.0 * self.ratio,
        }
    }
}
