use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::NutritionError;

pub trait DatasetClient: Send + Sync {
    fn download_archive(&self, url: &str, destination: &Path) -> Result<(), NutritionError>;
}

#[derive(Clone)]
pub struct DatasetHttpClient {
    client: Client,
}

impl DatasetHttpClient {
    pub fn new() -> Result<Self, NutritionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("opennutrition-db/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| NutritionError::DownloadHttp(err.to_string()))?,
        );
        // The archive is large; only bound connection setup tightly.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|err| NutritionError::DownloadHttp(err.to_string()))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn write_response_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        destination: &Path,
    ) -> Result<(), NutritionError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "dataset request failed".to_string());
            return Err(NutritionError::DownloadStatus { status, message });
        }

        let parent = destination
            .parent()
            .ok_or_else(|| NutritionError::Filesystem("invalid download path".to_string()))?;
        std::fs::create_dir_all(parent)
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".opennutrition-download")
            .tempfile_in(parent)
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        let bytes = std::io::copy(&mut response, temp.as_file_mut())
            .map_err(|err| NutritionError::DownloadHttp(err.to_string()))?;
        tracing::debug!(bytes, "archive body received");
        temp.persist(destination)
            .map_err(|err| NutritionError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl DatasetClient for DatasetHttpClient {
    fn download_archive(&self, url: &str, destination: &Path) -> Result<(), NutritionError> {
        tracing::info!(url, "downloading dataset archive");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| NutritionError::DownloadHttp(err.to_string()))?;
        self.write_response_to_file(response, destination)
    }
}
