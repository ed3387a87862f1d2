use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::NutritionError;
use crate::table::Column;

/// The per-user application-data directory that holds the database.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: Utf8PathBuf,
}

impl Store {
    pub fn new(app_name: &str, vendor_name: &str) -> Result<Self, NutritionError> {
        let dirs = BaseDirs::new().ok_or(NutritionError::DataDirUnavailable)?;
        let data_dir = Utf8PathBuf::from_path_buf(platform_data_dir(&dirs, app_name, vendor_name))
            .map_err(|_| NutritionError::Filesystem("invalid data directory path".to_string()))?;
        Ok(Self { data_dir })
    }

    pub fn new_with_path(data_dir: Utf8PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, NutritionError> {
        match &settings.data_dir {
            Some(dir) => Ok(Self::new_with_path(dir.clone())),
            None => Self::new(&settings.app_name, &settings.vendor_name),
        }
    }

    pub fn database_path(&self, file_name: &str) -> Utf8PathBuf {
        self.data_dir.join(file_name)
    }

    pub fn metadata_path(&self, database_file: &str) -> Utf8PathBuf {
        self.database_path(database_file).with_extension("meta.json")
    }

    /// Creates the directory and its parents; an existing directory is left as is.
    pub fn ensure_data_dir(&self) -> Result<(), NutritionError> {
        fs::create_dir_all(self.data_dir.as_std_path())
            .map_err(|err| NutritionError::Filesystem(err.to_string()))
    }

    pub fn write_metadata(path: &Utf8Path, metadata: &Metadata) -> Result<(), NutritionError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(metadata)
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn read_metadata(path: &Utf8Path) -> Result<Metadata, NutritionError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| NutritionError::Filesystem(err.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub dataset_file: String,
    pub table: String,
    pub rows: usize,
    pub columns: Vec<MetadataColumn>,
    pub created_at: String,
    pub tool: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataColumn {
    pub name: String,
    pub kind: String,
}

impl From<&Column> for MetadataColumn {
    fn from(value: &Column) -> Self {
        Self {
            name: value.name.clone(),
            kind: value.kind.to_string(),
        }
    }
}

/// Follows the usual per-user data locations: `~/.local/share/<app>` (or
/// `$XDG_DATA_HOME`), `~/Library/Application Support/<app>` and
/// `%LOCALAPPDATA%\<vendor>\<app>`.
pub fn platform_data_dir(dirs: &BaseDirs, app_name: &str, vendor_name: &str) -> PathBuf {
    if cfg!(windows) {
        dirs.data_local_dir().join(vendor_name).join(app_name)
    } else {
        dirs.data_dir().join(app_name)
    }
}
