use std::path::Path;

use camino::Utf8PathBuf;

use opennutrition_db::app::{App, ProgressEvent, ProgressSink};
use opennutrition_db::config::Settings;
use opennutrition_db::database::Database;
use opennutrition_db::error::NutritionError;
use opennutrition_db::source::DatasetClient;
use opennutrition_db::store::Store;

const FOODS: &str = "name\tcalories\tprotein\nApple\t52\t0.3\nBanana\t89\t1.1\nCarrot\t41\t0.9\n";

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

struct OfflineClient;

impl DatasetClient for OfflineClient {
    fn download_archive(&self, _url: &str, _destination: &Path) -> Result<(), NutritionError> {
        Err(NutritionError::DownloadHttp("offline".to_string()))
    }
}

fn app_with_dataset(temp: &tempfile::TempDir, data_dir: Utf8PathBuf) -> App<OfflineClient> {
    let workspace = Utf8PathBuf::from_path_buf(temp.path().join("work")).unwrap();
    std::fs::create_dir_all(workspace.as_std_path()).unwrap();
    let settings = Settings::with_workspace(workspace);
    std::fs::write(settings.dataset_path().as_std_path(), FOODS).unwrap();
    App::new(settings, Store::new_with_path(data_dir), OfflineClient)
}

#[test]
fn rerun_replaces_table() {
    let temp = tempfile::tempdir().unwrap();
    let data_dir = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let app = app_with_dataset(&temp, data_dir);

    let first = app.run(&NoopSink).unwrap();
    let second = app.run(&NoopSink).unwrap();
    assert_eq!(first.database.rows, 3);
    assert_eq!(second.database.rows, 3);

    let db = Database::open(second.database.database_path.as_std_path()).unwrap();
    let table = &app.settings().table_name;
    assert_eq!(db.table_names().unwrap(), vec![table.to_string()]);
    assert_eq!(db.row_count(table).unwrap(), 3);
    let first_name: String = db
        .connection()
        .query_row(
            &format!("SELECT name FROM {} LIMIT 1", table.quoted()),
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(first_name, "Apple");
}

#[test]
fn creates_missing_data_dir_with_parents() {
    let temp = tempfile::tempdir().unwrap();
    let data_dir = Utf8PathBuf::from_path_buf(
        temp.path()
            .join("share")
            .join("DailyMealPlanner")
            .join("DailyMealPlannerExtended"),
    )
    .unwrap();
    let app = app_with_dataset(&temp, data_dir.clone());

    let result = app.run(&NoopSink).unwrap();

    assert!(data_dir.as_std_path().is_dir());
    assert_eq!(
        result.database.database_path,
        data_dir.join("opennutrition_foods.db")
    );
    let meta = Store::read_metadata(&result.database.metadata_path).unwrap();
    assert_eq!(meta.rows, 3);
    assert_eq!(meta.table, "opennutrition_foods");
    assert_eq!(meta.columns.len(), 3);
}

#[cfg(unix)]
#[test]
fn existing_data_dir_keeps_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let data_dir = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    std::fs::create_dir_all(data_dir.as_std_path()).unwrap();
    std::fs::set_permissions(
        data_dir.as_std_path(),
        std::fs::Permissions::from_mode(0o750),
    )
    .unwrap();
    let app = app_with_dataset(&temp, data_dir.clone());

    app.run(&NoopSink).unwrap();

    let mode = std::fs::metadata(data_dir.as_std_path())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o750);
}

#[test]
fn setup_result_serializes_paths_as_strings() {
    let temp = tempfile::tempdir().unwrap();
    let data_dir = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let app = app_with_dataset(&temp, data_dir.clone());

    let result = app.run(&NoopSink).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["dataset"]["action"], "present");
    assert_eq!(
        json["database"]["database_path"],
        data_dir.join("opennutrition_foods.db").as_str()
    );
    assert_eq!(json["database"]["columns"][1]["kind"], "integer");
}
