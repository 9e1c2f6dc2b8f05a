//! Client for the Earth Engine REST API.
//!
//! Expressions are encoded with [`super::encode`] and evaluated remotely. The
//! service never returns pixels directly here; results leave through map tiles
//! or an export task.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{encode, Backend, ExportTask, LayerSource};
use crate::{
    error::BackendError,
    export::{ExportFormat, ExportRequest},
    expr::Image,
    geometry::Feature,
    legend::VisParams,
    raster::Raster,
    region::RegionFilter,
};

pub const DEFAULT_BASE_URL: &str = "https://earthengine.googleapis.com";

/// Public catalog assets (boundary datasets) live under this project.
const PUBLIC_PROJECT: &str = "earthengine-public";

pub struct EarthEngineBackend {
    client: Client,
    base_url: String,
    project: String,
    token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeaturesPage {
    #[serde(default)]
    features: Vec<Feature>,
    next_page_token: Option<String>,
}

/// Both the maps and the export endpoints answer with a resource name.
#[derive(Deserialize)]
struct Named {
    name: String,
}

impl EarthEngineBackend {
    pub fn new(project: &str, token: &str) -> Self {
        EarthEngineBackend {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            project: project.to_string(),
            token: token.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn features_url(&self, dataset: &str) -> String {
        format!(
            "{}/v1/projects/{PUBLIC_PROJECT}/assets/{dataset}:listFeatures",
            self.base_url
        )
    }

    fn project_url(&self, method: &str) -> String {
        format!("{}/v1/projects/{}/{method}", self.base_url, self.project)
    }

    fn tile_template(&self, map_name: &str) -> String {
        format!("{}/v1/{map_name}/tiles/{{z}}/{{x}}/{{y}}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Http {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

/// `field="value"`, with quotes and backslashes in the value escaped.
fn feature_filter(filter: &RegionFilter) -> String {
    let value = filter.value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{}=\"{value}\"", filter.field)
}

fn map_request_body(image: &Image, vis: &VisParams) -> Value {
    json!({
        "expression": encode::expression(image),
        "fileFormat": "AUTO_JPEG_PNG",
        "visualizationOptions": {
            "ranges": [{ "min": vis.min, "max": vis.max }],
            "paletteColors": vis.palette.iter().map(|c| c.hex()).collect::<Vec<_>>(),
        },
    })
}

fn export_request_body(request: &ExportRequest) -> Value {
    let mut drive = json!({ "filenamePrefix": request.description });
    if let Some(folder) = &request.folder {
        drive["folder"] = json!(folder);
    }

    let mut body = json!({
        "expression": encode::export_expression(&request.image, &request.region, request.scale),
        "description": request.description,
        "fileExportOptions": {
            "fileFormat": request.format.api_name(),
            "driveDestination": drive,
        },
    });
    if let Some(max_pixels) = request.max_pixels {
        body["maxPixels"] = json!(max_pixels.to_string());
    }

    body
}

/// Pulls `error.message` out of a Google API error body, falling back to the
/// raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl Backend for EarthEngineBackend {
    fn name(&self) -> &str {
        "earthengine"
    }

    async fn list_features(&self, filter: &RegionFilter) -> Result<Vec<Feature>, BackendError> {
        let url = self.features_url(&filter.dataset);
        let mut features = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("filter", feature_filter(filter))];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let page: FeaturesPage = self
                .send(self.client.get(&url).query(&query))
                .await?
                .json()
                .await?;
            debug!(count = page.features.len(), "received feature page");
            features.extend(page.features);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(features)
    }

    async fn compute(&self, _image: &Image) -> Result<Raster, BackendError> {
        Err(BackendError::Unsupported {
            backend: self.name().to_string(),
            operation: "compute".to_string(),
        })
    }

    async fn create_map_layer(
        &self,
        image: &Image,
        vis: &VisParams,
    ) -> Result<LayerSource, BackendError> {
        let request = self
            .client
            .post(self.project_url("maps"))
            .json(&map_request_body(image, vis));
        let map: Named = self.send(request).await?.json().await?;
        info!(map = %map.name, "map created");

        Ok(LayerSource::Tiles {
            url_template: self.tile_template(&map.name),
        })
    }

    async fn start_export(&self, request: &ExportRequest) -> Result<ExportTask, BackendError> {
        let body = export_request_body(request);
        let operation: Named = self
            .send(self.client.post(self.project_url("image:export")).json(&body))
            .await?
            .json()
            .await?;
        info!(operation = %operation.name, "export submitted");

        let destination = match &request.folder {
            Some(folder) => format!("drive:{folder}/{}", request.file_name()),
            None => format!("drive:{}", request.file_name()),
        };

        Ok(ExportTask {
            id: operation.name,
            destination,
        })
    }

    fn supports_format(&self, format: ExportFormat) -> bool {
        matches!(format, ExportFormat::GeoTiff | ExportFormat::TfRecord)
    }
}

// -- Tests -------------------------------------------------------------------
