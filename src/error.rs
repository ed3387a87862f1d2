use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NutritionError {
    #[error("dataset download failed: {0}")]
    #[diagnostic(help("check your network connection or pass --url"))]
    DownloadHttp(String),

    #[error("dataset server returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error("invalid dataset archive: {0}")]
    Archive(String),

    #[error("archive does not contain {file_name}")]
    DatasetMissing { file_name: String },

    #[error("failed to parse dataset at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("line {line}: column {column} expects {expected}, found {value:?}")]
    SchemaMismatch {
        line: u64,
        column: String,
        expected: String,
        value: String,
    },

    #[error("dataset has no header row")]
    EmptyDataset,

    #[error("database error: {0}")]
    Database(String),

    #[error("unable to resolve application data directory")]
    DataDirUnavailable,

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid column kind: {0}")]
    InvalidColumnKind(String),

    #[error("invalid table name: {0}")]
    InvalidTableName(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),
}

impl NutritionError {
    /// Process exit status: 3 for network failures, 2 when the dataset or the
    /// config cannot be obtained, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            NutritionError::DownloadHttp(_) | NutritionError::DownloadStatus { .. } => 3,
            NutritionError::DatasetMissing { .. }
            | NutritionError::ConfigRead(_)
            | NutritionError::ConfigParse(_) => 2,
            _ => 1,
        }
    }
}

impl From<rusqlite::Error> for NutritionError {
    fn from(err: rusqlite::Error) -> Self {
        NutritionError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_stage() {
        assert_eq!(NutritionError::DownloadHttp("timeout".to_string()).exit_code(), 3);
        assert_eq!(
            NutritionError::DownloadStatus {
                status: 503,
                message: "busy".to_string(),
            }
            .exit_code(),
            3
        );
        assert_eq!(
            NutritionError::DatasetMissing {
                file_name: "opennutrition_foods.tsv".to_string(),
            }
            .exit_code(),
            2
        );
        assert_eq!(
            NutritionError::ConfigRead(PathBuf::from("opennutrition-db.json")).exit_code(),
            2
        );
        assert_eq!(NutritionError::ConfigParse("eof".to_string()).exit_code(), 2);
        assert_eq!(NutritionError::Archive("bad crc".to_string()).exit_code(), 1);
        assert_eq!(NutritionError::EmptyDataset.exit_code(), 1);
    }
}
