//! Per-stage progress tracking.

use super::types::ProgressEvent;

/// Keeps the percentages reported by one stage non-decreasing.
///
/// Values are clamped to `[0, 100]`. Negative inputs are treated as
/// indeterminate and only pass through while nothing concrete has been
/// reported yet.
#[derive(Debug, Clone, Default)]
pub struct StageProgress {
    last: Option<f32>,
}

impl StageProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the percent to report for `raw`.
    pub fn observe(&mut self, raw: f32) -> f32 {
        if raw.is_nan() || raw < 0.0 {
            return match self.last {
                Some(last) if last >= 0.0 => last,
                _ => {
                    self.last = Some(ProgressEvent::INDETERMINATE);
                    ProgressEvent::INDETERMINATE
                }
            };
        }

        let clamped = raw.min(100.0);
        let next = match self.last {
            Some(last) if last > clamped => last,
            _ => clamped,
        };
        self.last = Some(next);
        next
    }

    /// Last reported value, if any.
    pub fn last(&self) -> Option<f32> {
        self.last
    }
}

/// Percentage of `done` over `total`, or indeterminate when the total is
/// unknown or zero.
pub fn percent_of(done: u64, total: Option<u64>) -> f32 {
    match total {
        Some(total) if total > 0 => ((done as f64 / total as f64) * 100.0).min(100.0) as f32,
        _ => ProgressEvent::INDETERMINATE,
    }
}
