use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::error::NutritionError;

/// Lists entry paths from the central directory without decompressing
/// anything. Entries escaping the archive root are rejected up front.
pub fn list_zip_entries(zip_path: &Path) -> Result<Vec<PathBuf>, NutritionError> {
    let mut archive = open_zip(zip_path)?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|err| NutritionError::Archive(err.to_string()))?;
        match entry.enclosed_name() {
            Some(path) => entries.push(path),
            None => {
                return Err(NutritionError::Archive(format!(
                    "zip entry {} escapes the extraction directory",
                    entry.name()
                )));
            }
        }
    }
    Ok(entries)
}

/// Extracts every entry under `target_dir`. A corrupt entry fails with
/// [`NutritionError::Archive`] and may leave earlier entries on disk.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), NutritionError> {
    let mut archive = open_zip(zip_path)?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| NutritionError::Archive(err.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(NutritionError::Archive(
                "zip entry path traversal detected".to_string(),
            ));
        };
        let entry_path = target_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| NutritionError::Archive(format!("{}: {err}", relative.display())))?;
    }
    Ok(())
}

fn open_zip(zip_path: &Path) -> Result<ZipArchive<fs::File>, NutritionError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        NutritionError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    ZipArchive::new(file).map_err(|err| NutritionError::Archive(err.to_string()))
}

/// Picks the entry named `file_name` closest to the archive root; ties go to
/// the lexicographically smallest path.
pub fn select_entry<'a>(entries: &'a [PathBuf], file_name: &str) -> Option<&'a PathBuf> {
    entries
        .iter()
        .filter(|path| {
            path.file_name()
                .map(|name| name == file_name)
                .unwrap_or(false)
        })
        .min_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        })
}

/// First path component of each entry, deduplicated.
pub fn top_level_names(entries: &[PathBuf]) -> BTreeSet<OsString> {
    entries
        .iter()
        .filter_map(|path| match path.components().next() {
            Some(Component::Normal(name)) => Some(name.to_os_string()),
            _ => None,
        })
        .collect()
}

/// Names directly under `dir`; a missing directory has none.
pub fn dir_entry_names(dir: &Path) -> Result<BTreeSet<OsString>, NutritionError> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(err) => return Err(NutritionError::Filesystem(err.to_string())),
    };
    read_dir
        .map(|entry| {
            entry
                .map(|entry| entry.file_name())
                .map_err(|err| NutritionError::Filesystem(err.to_string()))
        })
        .collect()
}

pub fn remove_path(path: &Path) -> Result<(), NutritionError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(NutritionError::Filesystem(err.to_string())),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|err| NutritionError::Filesystem(format!("remove {}: {err}", path.display())))
}
