use std::ffi::OsString;
use std::fs;
use std::time::Instant;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::Settings;
use crate::error::NutritionError;
use crate::fs_util;
use crate::source::DatasetClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquireAction {
    Present,
    Download,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcquireResult {
    pub action: AcquireAction,
    pub dataset_path: Utf8PathBuf,
    pub moved_from: Option<Utf8PathBuf>,
    pub removed: Vec<String>,
}

/// Makes sure the dataset file sits in the workspace. A present file is left
/// untouched and the client is never called.
pub fn ensure_dataset<C: DatasetClient + ?Sized>(
    settings: &Settings,
    client: &C,
    sink: &dyn ProgressSink,
) -> Result<AcquireResult, NutritionError> {
    let target = settings.dataset_path();
    if target.as_std_path().exists() {
        tracing::info!(path = %target, "dataset already present");
        sink.event(ProgressEvent::new(format!("Using existing {target}")));
        return Ok(AcquireResult {
            action: AcquireAction::Present,
            dataset_path: target,
            moved_from: None,
            removed: Vec::new(),
        });
    }

    sink.event(ProgressEvent::new(format!(
        "{} not found. Downloading...",
        settings.dataset_file
    )));
    fs::create_dir_all(settings.workspace.as_std_path())
        .map_err(|err| NutritionError::Filesystem(err.to_string()))?;

    let archive_path = settings.archive_path();
    let start = Instant::now();
    client.download_archive(&settings.dataset_url, archive_path.as_std_path())?;
    sink.event(ProgressEvent {
        message: format!("Downloaded {archive_path}"),
        elapsed: Some(start.elapsed()),
    });

    let entries = fs_util::list_zip_entries(archive_path.as_std_path())?;
    let existing = fs_util::dir_entry_names(settings.workspace.as_std_path())?;
    let created: Vec<OsString> = fs_util::top_level_names(&entries)
        .into_iter()
        .filter(|name| !existing.contains(name))
        .collect();

    if let Err(err) =
        fs_util::extract_zip(archive_path.as_std_path(), settings.workspace.as_std_path())
    {
        for name in &created {
            fs_util::remove_path(&settings.workspace.as_std_path().join(name))?;
        }
        tracing::warn!(error = %err, "extraction failed, removed partial output");
        return Err(err);
    }
    tracing::debug!(entries = entries.len(), "archive extracted");
    sink.event(ProgressEvent::new("Extracted files".to_string()));

    let selected = fs_util::select_entry(&entries, settings.dataset_file.as_str())
        .map(|relative| settings.workspace.as_std_path().join(relative));
    let mut moved_from = None;
    if let Some(found) = &selected {
        if found.as_path() != target.as_std_path() {
            fs::rename(found, target.as_std_path())
                .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
            sink.event(ProgressEvent::new(format!(
                "Moved {} to {target}",
                settings.dataset_file
            )));
            moved_from = Utf8PathBuf::from_path_buf(found.clone()).ok();
        }
    }

    fs_util::remove_path(archive_path.as_std_path())?;
    sink.event(ProgressEvent::new("Removed zip file".to_string()));

    // Only entries the archive introduced; anything already in the workspace stays.
    let mut removed = Vec::new();
    for name in created {
        let path = settings.workspace.as_std_path().join(&name);
        if path == target.as_std_path() {
            continue;
        }
        fs_util::remove_path(&path)?;
        removed.push(name.to_string_lossy().into_owned());
    }
    tracing::debug!(?removed, "removed extraction artifacts");

    if selected.is_none() {
        return Err(NutritionError::DatasetMissing {
            file_name: settings.dataset_file.to_string(),
        });
    }

    sink.event(ProgressEvent::new("Setup complete!".to_string()));
    Ok(AcquireResult {
        action: AcquireAction::Download,
        dataset_path: target,
        moved_from,
        removed,
    })
}
