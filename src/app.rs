use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::acquire::{self, AcquireResult};
use crate::config::Settings;
use crate::database::Database;
use crate::error::NutritionError;
use crate::source::DatasetClient;
use crate::store::{Metadata, MetadataColumn, Store};
use crate::table::{self, Column, Table};

#[derive(Debug, Clone, Serialize)]
pub struct SetupResult {
    pub dataset: AcquireResult,
    pub database: MaterializeResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializeResult {
    pub database_path: Utf8PathBuf,
    pub metadata_path: Utf8PathBuf,
    pub table: String,
    pub rows: usize,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(message: String) -> Self {
        Self {
            message,
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// The whole setup pipeline: acquire, parse, materialize.
pub struct App<C: DatasetClient> {
    settings: Settings,
    store: Store,
    client: C,
}

impl<C: DatasetClient> App<C> {
    pub fn new(settings: Settings, store: Store, client: C) -> Self {
        Self {
            settings,
            store,
            client,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn run(&self, sink: &dyn ProgressSink) -> Result<SetupResult, NutritionError> {
        let dataset = self.acquire(sink)?;
        let table = self.parse(sink)?;
        let database = self.materialize(&table, sink)?;
        Ok(SetupResult { dataset, database })
    }

    pub fn acquire(&self, sink: &dyn ProgressSink) -> Result<AcquireResult, NutritionError> {
        acquire::ensure_dataset(&self.settings, &self.client, sink)
    }

    pub fn parse(&self, sink: &dyn ProgressSink) -> Result<Table, NutritionError> {
        let path = self.settings.dataset_path();
        tracing::info!(path = %path, "parsing dataset");
        let table = table::read_tsv(path.as_std_path(), &self.settings.schema)?;
        sink.event(ProgressEvent::new(format!(
            "Loaded {} rows x {} columns from {}",
            table.row_count(),
            table.column_count(),
            self.settings.dataset_file
        )));
        Ok(table)
    }

    pub fn materialize(
        &self,
        table: &Table,
        sink: &dyn ProgressSink,
    ) -> Result<MaterializeResult, NutritionError> {
        self.store.ensure_data_dir()?;
        let database_path = self.store.database_path(self.settings.database_file.as_str());
        let metadata_path = self.store.metadata_path(self.settings.database_file.as_str());
        tracing::info!(path = %database_path, "writing database");

        let mut database = Database::open(database_path.as_std_path())?;
        let rows = database.replace_table(&self.settings.table_name, table)?;

        let metadata = Metadata {
            source: self.settings.dataset_url.clone(),
            dataset_file: self.settings.dataset_file.to_string(),
            table: self.settings.table_name.to_string(),
            rows,
            columns: table.columns().iter().map(MetadataColumn::from).collect(),
            created_at: iso_timestamp(),
            tool: format!("opennutrition-db/{}", env!("CARGO_PKG_VERSION")),
        };
        Store::write_metadata(&metadata_path, &metadata)?;
        sink.event(ProgressEvent::new(format!(
            "Wrote {rows} rows to table {}",
            self.settings.table_name
        )));

        Ok(MaterializeResult {
            database_path,
            metadata_path,
            table: self.settings.table_name.to_string(),
            rows,
            columns: table.columns().to_vec(),
        })
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;
    use crate::output::JsonOutput;

    #[derive(Default)]
    struct RefusingClient {
        calls: Mutex<usize>,
    }

    impl DatasetClient for RefusingClient {
        fn download_archive(&self, _url: &str, _destination: &Path) -> Result<(), NutritionError> {
            *self.calls.lock().unwrap() += 1;
            Err(NutritionError::DownloadHttp("offline".to_string()))
        }
    }

    #[test]
    fn run_with_present_dataset_skips_network() {
        let temp = tempfile::tempdir().unwrap();
        let workspace = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
        std::fs::create_dir_all(workspace.as_std_path()).unwrap();
        let settings = Settings::with_workspace(workspace);
        std::fs::write(
            settings.dataset_path().as_std_path(),
            "name\tcalories\nApple\t52\n",
        )
        .unwrap();
        let store = Store::new_with_path(
            Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap(),
        );

        let app = App::new(settings, store, RefusingClient::default());
        let result = app.run(&JsonOutput).unwrap();

        assert_eq!(*app.client.calls.lock().unwrap(), 0);
        assert_eq!(result.database.rows, 1);
        assert!(result.database.database_path.as_std_path().exists());
        assert!(result.database.metadata_path.as_std_path().exists());
    }
}
