//! Progress and cancellation channel between the pipeline and its host.
//!
//! Defines a [`Feedback`] trait that decouples progress reporting and
//! cancellation from any specific front end (e.g., `indicatif` progress
//! bars, a host GIS dialog, or silence).

/// Channel for reporting progress and polling for cancellation.
///
/// Implementations must be `Send + Sync` so they can be shared with a
/// signal handler through an `Arc`.
pub trait Feedback: Send + Sync {
    /// Reports overall completion as an integer percentage.
    fn set_progress(&self, percent: u8);

    /// Whether the host asked the run to stop. Polled once per feature.
    fn is_canceled(&self) -> bool;

    /// Shows a human-readable status message.
    fn push_info(&self, msg: &str);

    /// Shows a human-readable error message.
    fn report_error(&self, msg: &str);
}

/// A no-op implementation of [`Feedback`] that ignores all updates and
/// is never canceled.
pub struct NullFeedback;

impl Feedback for NullFeedback {
    fn set_progress(&self, _percent: u8) {}
    fn is_canceled(&self) -> bool {
        false
    }
    fn push_info(&self, _msg: &str) {}
    fn report_error(&self, _msg: &str) {}
}
