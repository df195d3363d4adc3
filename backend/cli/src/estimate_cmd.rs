//! CLI Estimate Command
//!
//! Submits photos from disk, shows the previews, requests one estimate and
//! renders each phase change until the request settles.

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use kaitai_core::{EstimationClient, Phase, MAX_IMAGES};
use kaitai_media::{detect_mime_type, is_image, SelectedFile};
use kaitai_session::{Estimator, SubmitOutcome};

use crate::terminal_output::{note_info, note_warn, render_previews, render_session};

/// Split paths into image files and the rest, by extension.
pub fn filter_images(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
    paths
        .into_iter()
        .partition(|path| is_image(detect_mime_type(path)))
}

/// Process exit status for the phase an estimate ended in.
pub fn exit_status(phase: Phase) -> u8 {
    match phase {
        Phase::Error => 1,
        Phase::Idle | Phase::Loading | Phase::Success => 0,
    }
}

pub async fn run<C: EstimationClient>(
    estimator: &Estimator<C>,
    paths: Vec<PathBuf>,
    json: bool,
) -> Result<Phase> {
    let (images, ignored) = filter_images(paths);
    for path in &ignored {
        note_warn(&format!("{} is not an image; skipping", path.display()));
    }

    let report = estimator
        .submit_files(images.into_iter().map(SelectedFile::from).collect())
        .await;
    if report.skipped() > 0 {
        note_warn(&format!("{} file(s) could not be read", report.skipped()));
    }
    if let SubmitOutcome::Appended(appended) = &report.outcome {
        if !appended.dropped.is_empty() {
            note_warn(&format!(
                "Only the first {MAX_IMAGES} photos are used; {} were not added",
                appended.dropped.len()
            ));
        }
    }

    let before = estimator.snapshot();
    if !json && !before.images.is_empty() {
        print!("{}", render_previews(&before.images));
    }

    let mut rx = estimator.subscribe();
    let mut last = before.phase;
    let watcher = tokio::spawn(async move {
        loop {
            let phase = rx.borrow_and_update().phase;
            if phase != last {
                debug!(from = %last, to = %phase, "Phase changed");
                if phase == Phase::Loading {
                    note_info("Requesting estimate from the AI service...");
                }
                last = phase;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    });

    let state = estimator.get_estimate().await;
    watcher.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render_session(&state));
    }
    Ok(state.phase)
}
