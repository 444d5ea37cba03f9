//! 呼び出しを記録するテスト用API
//!
//! 指定したエンドポイント（または写真グループ）だけを失敗させられる。

use super::types::{PhotoUpload, ReportFileUpload, ReportSummary, SubmitRequest, SubmitResponse};
use super::MaintenanceApi;
use crate::error::{ImpsError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use imps_common::{CmStatus, ReportType, Station};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    StationInfo,
    PreviewIssueId,
    PreviewDocName,
    ListReports,
    ListUploads,
    Submit,
    UploadPhotos,
    Finalize,
    PatchStatus,
    UploadReportFiles,
}

/// 記録された呼び出し
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    StationInfo { station_id: String },
    PreviewIssueId { station_id: String, date: NaiveDate },
    PreviewDocName { station_id: String, date: NaiveDate },
    ListReports { station_id: String },
    ListUploads { station_id: String },
    Submit { station_id: String, path_prefix: String },
    UploadPhotos { report_id: String, station_id: String, group: String, files: usize },
    Finalize { report_id: String, station_id: String },
    PatchStatus { report_id: String, status: CmStatus },
    UploadReportFiles { station_id: String, files: usize },
}

/// 失敗のさせ方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// HTTPステータスで失敗
    Status(u16),
    /// 接続できない（fetch の reject 相当）
    Unreachable,
}

impl Failure {
    fn to_error(self) -> ImpsError {
        match self {
            Failure::Status(status) => ImpsError::Http {
                status,
                message: "mock failure".into(),
            },
            Failure::Unreachable => ImpsError::Network("connection refused".into()),
        }
    }
}

pub struct MockApi {
    station: Station,
    report_id: String,
    issue_id_preview: Option<String>,
    doc_name_preview: Option<String>,
    reports: Vec<ReportSummary>,
    uploads: Vec<ReportSummary>,
    failures: HashMap<Endpoint, Failure>,
    failing_groups: HashSet<String>,
    station_delay: Option<Duration>,
    calls: Mutex<Vec<ApiCall>>,
    submitted: Mutex<Vec<SubmitRequest>>,
}

impl MockApi {
    pub fn new(station: Station) -> Self {
        Self {
            station,
            report_id: "R-0001".into(),
            issue_id_preview: None,
            doc_name_preview: None,
            reports: Vec::new(),
            uploads: Vec::new(),
            failures: HashMap::new(),
            failing_groups: HashSet::new(),
            station_delay: None,
            calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_report_id(mut self, report_id: &str) -> Self {
        self.report_id = report_id.to_string();
        self
    }

    pub fn with_previews(mut self, issue_id: &str, doc_name: &str) -> Self {
        self.issue_id_preview = Some(issue_id.to_string());
        self.doc_name_preview = Some(doc_name.to_string());
        self
    }

    pub fn with_reports(mut self, reports: Vec<ReportSummary>) -> Self {
        self.reports = reports;
        self
    }

    pub fn with_uploads(mut self, uploads: Vec<ReportSummary>) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn failing(mut self, endpoint: Endpoint, failure: Failure) -> Self {
        self.failures.insert(endpoint, failure);
        self
    }

    /// 特定の写真グループのアップロードだけ失敗させる
    pub fn failing_group(mut self, group: &str) -> Self {
        self.failing_groups.insert(group.to_string());
        self
    }

    /// ステーション情報の応答を遅らせる
    pub fn with_station_delay(mut self, delay: Duration) -> Self {
        self.station_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, call: ApiCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, endpoint: Endpoint) -> Result<()> {
        match self.failures.get(&endpoint) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MaintenanceApi for MockApi {
    async fn station_info(&self, station_id: &str) -> Result<Station> {
        self.record(ApiCall::StationInfo {
            station_id: station_id.to_string(),
        });
        if let Some(delay) = self.station_delay {
            tokio::time::sleep(delay).await;
        }
        self.check(Endpoint::StationInfo)?;
        Ok(self.station.clone())
    }

    async fn preview_issue_id(
        &self,
        _report_type: ReportType,
        station_id: &str,
        date: NaiveDate,
    ) -> Result<String> {
        self.record(ApiCall::PreviewIssueId {
            station_id: station_id.to_string(),
            date,
        });
        self.check(Endpoint::PreviewIssueId)?;
        self.issue_id_preview
            .clone()
            .ok_or_else(|| Failure::Status(404).to_error())
    }

    async fn preview_doc_name(
        &self,
        _report_type: ReportType,
        station_id: &str,
        date: NaiveDate,
    ) -> Result<String> {
        self.record(ApiCall::PreviewDocName {
            station_id: station_id.to_string(),
            date,
        });
        self.check(Endpoint::PreviewDocName)?;
        self.doc_name_preview
            .clone()
            .ok_or_else(|| Failure::Status(404).to_error())
    }

    async fn list_reports(&self, _report_type: ReportType, station_id: &str) -> Result<Vec<ReportSummary>> {
        self.record(ApiCall::ListReports {
            station_id: station_id.to_string(),
        });
        self.check(Endpoint::ListReports)?;
        Ok(self.reports.clone())
    }

    async fn list_uploads(&self, _report_type: ReportType, station_id: &str) -> Result<Vec<ReportSummary>> {
        self.record(ApiCall::ListUploads {
            station_id: station_id.to_string(),
        });
        self.check(Endpoint::ListUploads)?;
        Ok(self.uploads.clone())
    }

    async fn submit(&self, report_type: ReportType, request: &SubmitRequest) -> Result<SubmitResponse> {
        self.record(ApiCall::Submit {
            station_id: request.station_id.clone(),
            path_prefix: report_type.path_prefix(),
        });
        self.check(Endpoint::Submit)?;
        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(request.clone());
        }
        Ok(SubmitResponse {
            report_id: self.report_id.clone(),
        })
    }

    async fn upload_photos(
        &self,
        _report_type: ReportType,
        report_id: &str,
        upload: &PhotoUpload,
    ) -> Result<()> {
        self.record(ApiCall::UploadPhotos {
            report_id: report_id.to_string(),
            station_id: upload.station_id.clone(),
            group: upload.group.clone(),
            files: upload.files.len(),
        });
        self.check(Endpoint::UploadPhotos)?;
        if self.failing_groups.contains(&upload.group) {
            return Err(Failure::Status(500).to_error());
        }
        Ok(())
    }

    async fn finalize(&self, _report_type: ReportType, report_id: &str, station_id: &str) -> Result<()> {
        self.record(ApiCall::Finalize {
            report_id: report_id.to_string(),
            station_id: station_id.to_string(),
        });
        self.check(Endpoint::Finalize)
    }

    async fn patch_status(&self, _report_type: ReportType, report_id: &str, status: CmStatus) -> Result<()> {
        self.record(ApiCall::PatchStatus {
            report_id: report_id.to_string(),
            status,
        });
        self.check(Endpoint::PatchStatus)
    }

    async fn upload_report_files(&self, _report_type: ReportType, upload: &ReportFileUpload) -> Result<()> {
        self.record(ApiCall::UploadReportFiles {
            station_id: upload.station_id.clone(),
            files: upload.files.len(),
        });
        self.check(Endpoint::UploadReportFiles)
    }
}
