#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the OSM address tools.
//!
//! Provides an `indicatif`-backed [`Feedback`] implementation plus
//! [`init_logger`], which sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while the progress bar redraws.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use osm_address_enrich::Feedback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`Feedback`].
///
/// The bar runs from 0 to 100. Cancellation is an atomic flag that a
/// signal handler (see [`IndicatifFeedback::cancel_on_ctrl_c`]) or any
/// other thread can raise.
pub struct IndicatifFeedback {
    bar: ProgressBar,
    canceled: Arc<AtomicBool>,
}

impl IndicatifFeedback {
    #[must_use]
    pub fn percent_bar(multi: &MultiProgress, message: &str) -> Arc<Self> {
        let bar = multi.add(ProgressBar::new(100));
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.cyan/dim} {pos}% [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message(message.to_string());

        Arc::new(Self::with_bar(bar))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Asks the running pipeline to stop before its next feature.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    /// Spawns a task on the current Tokio runtime that calls
    /// [`IndicatifFeedback::cancel`] on the first Ctrl-C.
    pub fn cancel_on_ctrl_c(self: &Arc<Self>) {
        let feedback = Arc::clone(self);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::warn!("Interrupt received, stopping after the current feature");
                    feedback.cancel();
                }
                Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
            }
        });
    }

    pub fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

impl Feedback for IndicatifFeedback {
    fn set_progress(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn push_info(&self, msg: &str) {
        log::info!("{msg}");
        self.bar.set_message(msg.to_string());
    }

    fn report_error(&self, msg: &str) {
        log::error!("{msg}");
        self.bar.abandon_with_message(msg.to_string());
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when several tests initialize logging.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
