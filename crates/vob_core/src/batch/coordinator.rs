//! Batch dispatch across a bounded worker pool.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::batch::context::BatchContext;
use crate::batch::errors::{BatchError, BatchResult, JobError, JobResult};
use crate::batch::types::{BatchReport, BatchRequest, JobReport};
use crate::composition::{
    build_composition_plan, CompositionInput, FfmpegOptionsBuilder, LayerSelection,
};
use crate::logging::JobLogger;
use crate::models::{ClipTrim, MediaItem, OverlayClip, OverlayLayer};
use crate::overlays;
use crate::probe;
use crate::supervisor::{
    EncodeCommand, ProcessSupervisor, ProgressFn, RunOutcome, SupervisorConfig,
};

/// Encoder binary every job drives.
const ENCODE_TOOL: &str = "ffmpeg";

/// Runs every item of a request to completion across a worker pool.
///
/// The coordinator owns no mutable state of its own; everything shared
/// between workers lives in the [`BatchContext`].
pub struct BatchCoordinator {
    request: BatchRequest,
}

impl BatchCoordinator {
    pub fn new(request: BatchRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &BatchRequest {
        &self.request
    }

    /// Validate the request, run every job, and seal the report.
    ///
    /// Rejects up front, before anything is dispatched or any directory is
    /// created, when no items were selected or no requested layer has a
    /// usable candidate set. After dispatch, a failed job never aborts the
    /// rest of the batch; cancellation stops dispatch and forwards to
    /// running jobs through the context.
    pub fn run(&self, ctx: BatchContext) -> BatchResult<BatchReport> {
        if self.request.items.is_empty() {
            return Err(BatchError::NoItems);
        }

        let layer_dirs: HashMap<OverlayLayer, PathBuf> = self
            .request
            .layers
            .iter()
            .map(|(layer, request)| (*layer, request.directory.clone()))
            .collect();
        let candidates = overlays::collect_candidates(&layer_dirs);
        if candidates.is_empty() {
            return Err(BatchError::NoValidOverlays);
        }

        fs::create_dir_all(&self.request.output_dir)
            .map_err(|e| BatchError::setup(&self.request.output_dir, e))?;
        fs::create_dir_all(&self.request.logs_dir)
            .map_err(|e| BatchError::setup(&self.request.logs_dir, e))?;

        let total = self.request.items.len();
        let workers = self.request.max_workers.max(1).min(total);
        tracing::info!("Dispatching {total} job(s) across {workers} worker(s)");

        let queue: Mutex<VecDeque<&PathBuf>> = Mutex::new(self.request.items.iter().collect());
        let dispatched = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if ctx.is_cancelled() {
                        break;
                    }
                    let next = queue.lock().pop_front();
                    let Some(item) = next else { break };

                    let number = dispatched.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!("Processing job {number}/{total}: {}", item.display());

                    let report = self.process_item(item, &candidates, &ctx);
                    if report.success {
                        tracing::info!("Job {number}/{total} completed: {}", report.item);
                    } else {
                        tracing::warn!(
                            "Job {number}/{total} did not complete: {}: {}",
                            report.item,
                            report.message
                        );
                    }
                    ctx.record(report);
                });
            }
        });

        Ok(ctx.into_report(self.request.output_dir.clone()))
    }

    fn process_item(
        &self,
        item: &Path,
        candidates: &HashMap<OverlayLayer, Vec<PathBuf>>,
        ctx: &BatchContext,
    ) -> JobReport {
        let name = item_name(item);
        match self.run_job(&name, item, candidates, ctx) {
            Ok(report) => report,
            Err(error) => JobReport::failure(&name, error.to_string()),
        }
    }

    /// Prepare and encode one item.
    ///
    /// Errors here are pre-encode aborts; encode outcomes (success,
    /// failure, cancellation) come back as `Ok` reports.
    fn run_job(
        &self,
        name: &str,
        item: &Path,
        candidates: &HashMap<OverlayLayer, Vec<PathBuf>>,
        ctx: &BatchContext,
    ) -> JobResult<JobReport> {
        let logger = Arc::new(JobLogger::new(
            name,
            &self.request.logs_dir,
            self.request.log_config.clone(),
            None,
        )?);

        logger.phase("Preparation");
        let base_duration = match probe::media_duration(item) {
            Ok(duration) => duration,
            Err(error) => {
                logger.error(&format!("Could not read the base duration: {error}"));
                return Err(error.into());
            }
        };
        logger.info(&format!("Base duration: {base_duration:.2}s"));
        let base = MediaItem::new(item, base_duration);

        let mut rng = rand::rng();
        let mut selections = Vec::new();
        for layer in OverlayLayer::STACKING_ORDER {
            let Some(layer_request) = self.request.layers.get(&layer) else {
                continue;
            };
            let Some(pool) = candidates.get(&layer) else {
                continue;
            };
            let Some(clip_path) =
                overlays::select_clip(pool, layer_request.forced.as_deref(), &mut rng)
            else {
                continue;
            };

            // An unreadable template still composites; the planner treats it
            // as running for the whole base.
            let clip_duration = match probe::media_duration(clip_path) {
                Ok(duration) => duration,
                Err(error) => {
                    logger.warn(&format!(
                        "Could not probe {}: {error}; assuming the base duration",
                        clip_path.display()
                    ));
                    base_duration
                }
            };

            logger.info(&format!("{layer} layer: {}", item_name(clip_path)));
            selections.push(LayerSelection {
                layer,
                clip: OverlayClip::new(clip_path.clone(), clip_duration),
            });
        }

        if selections.is_empty() {
            logger.error("No overlay clip was available for any requested layer");
            return Err(JobError::NoOverlays);
        }

        let trims: HashMap<OverlayLayer, ClipTrim> = self
            .request
            .layers
            .iter()
            .filter_map(|(layer, request)| request.trim.map(|trim| (*layer, trim)))
            .collect();

        logger.phase("Planning");
        let input = CompositionInput {
            base: &base,
            selections,
            policy: self.request.policy,
            trims: &trims,
            output_dir: &self.request.output_dir,
        };
        let plan = match build_composition_plan(input, &mut rng) {
            Ok(plan) => plan,
            Err(error) => {
                logger.error(&error.to_string());
                return Err(error.into());
            }
        };
        for placement in &plan.placements {
            logger.info(&format!(
                "{} layer at {:.2}s for {:.2}s",
                placement.layer, placement.timing.start_offset, placement.timing.trim_duration
            ));
        }

        logger.phase("Encoding");
        let tokens = FfmpegOptionsBuilder::new(&plan, &self.request.encode).build();
        logger.log_ffmpeg_command(&tokens);
        let command = EncodeCommand::new(ENCODE_TOOL, tokens).with_output(&plan.output_path);

        let config = SupervisorConfig::for_media_duration(base_duration)
            .with_retries(self.request.job_retries);
        let supervisor = Arc::new(ProcessSupervisor::new(config));
        ctx.register_supervisor(&supervisor);

        let outcome = supervisor.run(&command, job_progress(name, ctx, &logger));
        let report = match outcome {
            RunOutcome::Success => {
                logger.success("Encode completed");
                JobReport::success(name, &plan.output_path)
            }
            RunOutcome::Cancelled => {
                logger.warn("Cancelled before completion");
                JobReport::cancelled(name)
            }
            RunOutcome::Failed { category, message } => {
                logger.error(&format!("Encode failed ({category}): {message}"));
                JobReport::failure(name, message)
            }
        };
        logger.close();
        Ok(report)
    }
}

/// Progress sink bridging one supervisor to the job log and the batch
/// callback.
fn job_progress(name: &str, ctx: &BatchContext, logger: &Arc<JobLogger>) -> ProgressFn {
    let job = name.to_string();
    let sink = ctx.progress_sink();
    let logger = Arc::clone(logger);
    Arc::new(move |percent, message| {
        logger.progress(percent);
        if let Some(callback) = &sink {
            callback(&job, percent, message);
        }
    })
}

fn item_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}
