//! VOB Core - Backend logic for Video Overlay Batch
//!
//! Everything here is frontend-agnostic; a desktop shell or a CLI sits
//! on top without this crate knowing.
//!
//! One batch run: a [`batch::BatchRequest`] plus a [`batch::BatchContext`]
//! go into the [`batch::BatchCoordinator`], which probes each base item,
//! picks overlay templates, plans the composition, and drives `ffmpeg`
//! under a [`supervisor::ProcessSupervisor`].

pub mod batch;
pub mod composition;
pub mod config;
pub mod logging;
pub mod models;
pub mod overlays;
pub mod probe;
pub mod supervisor;
pub mod timing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
