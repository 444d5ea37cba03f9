use super::types::{
    DocNamePreview, ErrorBody, IssueIdPreview, ListResponse, PhotoUpload, ReportFileUpload,
    ReportSummary, StationInfoResponse, StatusPatch, SubmitRequest, SubmitResponse,
};
use super::MaintenanceApi;
use crate::error::{ImpsError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use imps_common::{CmStatus, ReportKind, ReportType, Station};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// reqwest によるAPIクライアント
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImpsError::Config(format!("HTTPクライアント初期化失敗: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn report_url(&self, report_type: ReportType, tail: &str) -> String {
        self.url(&format!("/{}report/{}", report_type.path_prefix(), tail))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn get(&self, url: String) -> RequestBuilder {
        debug!("GET {}", url);
        self.authorized(self.client.get(url))
    }

    fn post(&self, url: String) -> RequestBuilder {
        debug!("POST {}", url);
        self.authorized(self.client.post(url))
    }

    async fn send(builder: RequestBuilder) -> Result<Response> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.message())
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("error").to_string()
                } else {
                    text
                }
            });

        Err(ImpsError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
        let resp = Self::send(builder).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| ImpsError::ApiParse(e.to_string()))
    }

    fn date_param(report_type: ReportType) -> &'static str {
        match report_type.kind {
            ReportKind::Pm => "pm_date",
            ReportKind::Cm => "found_date",
        }
    }

    async fn file_part(path: &std::path::Path, mime: &str) -> Result<Part> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ImpsError::ImageLoad(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".into());
        Ok(Part::bytes(bytes).file_name(file_name).mime_str(mime)?)
    }
}

#[async_trait]
impl MaintenanceApi for HttpApi {
    async fn station_info(&self, station_id: &str) -> Result<Station> {
        let builder = self
            .get(self.url("/station/info/public"))
            .query(&[("station_id", station_id)]);
        let resp: StationInfoResponse = Self::send_json(builder).await?;
        resp.into_station()
    }

    async fn preview_issue_id(
        &self,
        report_type: ReportType,
        station_id: &str,
        date: NaiveDate,
    ) -> Result<String> {
        let date = date.format("%Y-%m-%d").to_string();
        let builder = self
            .get(self.report_url(report_type, "preview-issueid"))
            .query(&[("station_id", station_id), (Self::date_param(report_type), date.as_str())]);
        let resp: IssueIdPreview = Self::send_json(builder).await?;
        Ok(resp.issue_id)
    }

    async fn preview_doc_name(
        &self,
        report_type: ReportType,
        station_id: &str,
        date: NaiveDate,
    ) -> Result<String> {
        let date = date.format("%Y-%m-%d").to_string();
        let builder = self
            .get(self.report_url(report_type, "preview-docname"))
            .query(&[("station_id", station_id), (Self::date_param(report_type), date.as_str())]);
        let resp: DocNamePreview = Self::send_json(builder).await?;
        Ok(resp.doc_name)
    }

    async fn list_reports(&self, report_type: ReportType, station_id: &str) -> Result<Vec<ReportSummary>> {
        let builder = self
            .get(self.report_url(report_type, "list"))
            .query(&[("station_id", station_id)]);
        let resp: ListResponse = Self::send_json(builder).await?;
        Ok(resp.into())
    }

    async fn list_uploads(&self, report_type: ReportType, station_id: &str) -> Result<Vec<ReportSummary>> {
        let builder = self
            .get(self.report_url(report_type, "upload-files"))
            .query(&[("station_id", station_id)]);
        let resp: ListResponse = Self::send_json(builder).await?;
        Ok(resp.into())
    }

    async fn submit(&self, report_type: ReportType, request: &SubmitRequest) -> Result<SubmitResponse> {
        let builder = self.post(self.report_url(report_type, "submit")).json(request);
        Self::send_json(builder).await
    }

    async fn upload_photos(
        &self,
        report_type: ReportType,
        report_id: &str,
        upload: &PhotoUpload,
    ) -> Result<()> {
        let mut form = Form::new()
            .text("station_id", upload.station_id.clone())
            .text("group", upload.group.clone());
        for file in &upload.files {
            form = form.part("files", Self::file_part(&file.path, &file.mime).await?);
        }

        let builder = self
            .post(self.report_url(report_type, &format!("{}/photos", report_id)))
            .multipart(form);
        Self::send(builder).await?;
        Ok(())
    }

    async fn finalize(&self, report_type: ReportType, report_id: &str, station_id: &str) -> Result<()> {
        let builder = self
            .post(self.report_url(report_type, &format!("{}/finalize", report_id)))
            .form(&[("station_id", station_id)]);
        Self::send(builder).await?;
        Ok(())
    }

    async fn patch_status(&self, report_type: ReportType, report_id: &str, status: CmStatus) -> Result<()> {
        let url = self.report_url(report_type, &format!("{}/status", report_id));
        debug!("PATCH {}", url);
        let builder = self
            .authorized(self.client.patch(url))
            .json(&StatusPatch { status });
        Self::send(builder).await?;
        Ok(())
    }

    async fn upload_report_files(&self, report_type: ReportType, upload: &ReportFileUpload) -> Result<()> {
        let mut form = Form::new()
            .text("station_id", upload.station_id.clone())
            .text("reportDate", upload.report_date.format("%Y-%m-%d").to_string());
        for path in &upload.files {
            form = form.part("files", Self::file_part(path, "application/pdf").await?);
        }

        let builder = self
            .post(self.report_url(report_type, "upload-files"))
            .multipart(form);
        Self::send(builder).await?;
        Ok(())
    }
}
