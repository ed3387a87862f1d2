use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{ColumnKind, FileName, TableName};
use crate::error::NutritionError;

pub const DEFAULT_DATASET_URL: &str =
    "https://downloads.opennutrition.app/opennutrition-dataset-2025.1.zip";
pub const DEFAULT_DATASET_FILE: &str = "opennutrition_foods.tsv";
pub const DEFAULT_DATABASE_FILE: &str = "opennutrition_foods.db";
pub const DEFAULT_TABLE_NAME: &str = "opennutrition_foods";
pub const DEFAULT_APP_NAME: &str = "DailyMealPlannerExtended";
pub const DEFAULT_VENDOR_NAME: &str = "DailyMealPlanner";
pub const CONFIG_FILE_NAME: &str = "opennutrition-db.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dataset_url: Option<String>,
    #[serde(default)]
    pub dataset_file: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub vendor_name: Option<String>,
    #[serde(default)]
    pub database_file: Option<String>,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Column name to kind (`integer`, `real`, `boolean`, `text`).
    #[serde(default)]
    pub schema: BTreeMap<String, String>,
}

/// Values supplied on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub workspace: Option<Utf8PathBuf>,
    pub dataset_url: Option<String>,
    pub data_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub dataset_url: String,
    pub dataset_file: FileName,
    pub workspace: Utf8PathBuf,
    pub app_name: String,
    pub vendor_name: String,
    pub database_file: FileName,
    pub table_name: TableName,
    /// Replaces the platform application-data directory when set.
    pub data_dir: Option<Utf8PathBuf>,
    pub schema: BTreeMap<String, ColumnKind>,
}

impl Settings {
    pub fn with_workspace(workspace: Utf8PathBuf) -> Self {
        Self {
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            dataset_file: FileName::new_unchecked(DEFAULT_DATASET_FILE),
            workspace,
            app_name: DEFAULT_APP_NAME.to_string(),
            vendor_name: DEFAULT_VENDOR_NAME.to_string(),
            database_file: FileName::new_unchecked(DEFAULT_DATABASE_FILE),
            table_name: TableName::new_unchecked(DEFAULT_TABLE_NAME),
            data_dir: None,
            schema: BTreeMap::new(),
        }
    }

    pub fn dataset_path(&self) -> Utf8PathBuf {
        self.workspace.join(self.dataset_file.as_str())
    }

    pub fn archive_path(&self) -> Utf8PathBuf {
        self.workspace.join(archive_file_name(&self.dataset_url))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: SettingsOverrides,
    ) -> Result<Settings, NutritionError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| NutritionError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| NutritionError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: SettingsOverrides,
    ) -> Result<Settings, NutritionError> {
        let workspace = match overrides.workspace {
            Some(dir) => dir,
            None => match config.workspace {
                Some(dir) => Utf8PathBuf::from(dir),
                None => current_dir()?,
            },
        };

        let mut settings = Settings::with_workspace(workspace);
        if let Some(url) = overrides.dataset_url.or(config.dataset_url) {
            settings.dataset_url = url;
        }
        if let Some(file) = config.dataset_file {
            settings.dataset_file = file.parse()?;
        }
        if let Some(app_name) = config.app_name {
            settings.app_name = app_name;
        }
        if let Some(vendor_name) = config.vendor_name {
            settings.vendor_name = vendor_name;
        }
        if let Some(file) = config.database_file {
            settings.database_file = file.parse()?;
        }
        if let Some(table) = config.table_name {
            settings.table_name = table.parse()?;
        }
        settings.data_dir = overrides
            .data_dir
            .or_else(|| config.data_dir.map(Utf8PathBuf::from));
        settings.schema = config
            .schema
            .into_iter()
            .map(|(column, kind)| Ok((column, kind.parse::<ColumnKind>()?)))
            .collect::<Result<BTreeMap<_, _>, NutritionError>>()?;

        Ok(settings)
    }
}

fn current_dir() -> Result<Utf8PathBuf, NutritionError> {
    let cwd =
        std::env::current_dir().map_err(|err| NutritionError::Filesystem(err.to_string()))?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|_| NutritionError::Filesystem("invalid workspace path".to_string()))
}

/// Last path segment of the download URL, without query or fragment.
pub fn archive_file_name(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    without_suffix
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
        .unwrap_or_else(|| "dataset.zip".to_string())
}
