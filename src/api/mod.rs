//! 保守点検バックエンドのAPIクライアント
//!
//! テストでは `mock::MockApi` に差し替える。

mod http;
pub mod mock;
pub mod types;

pub use http::HttpApi;
pub use types::{PhotoUpload, ReportFileUpload, ReportSummary, SubmitRequest, SubmitResponse};

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use imps_common::{CmStatus, ReportType, Station};

#[async_trait]
pub trait MaintenanceApi: Send + Sync {
    async fn station_info(&self, station_id: &str) -> Result<Station>;

    async fn preview_issue_id(
        &self,
        report_type: ReportType,
        station_id: &str,
        date: NaiveDate,
    ) -> Result<String>;

    async fn preview_doc_name(
        &self,
        report_type: ReportType,
        station_id: &str,
        date: NaiveDate,
    ) -> Result<String>;

    async fn list_reports(&self, report_type: ReportType, station_id: &str) -> Result<Vec<ReportSummary>>;

    /// アップロード済み報告書ファイルの一覧
    async fn list_uploads(&self, report_type: ReportType, station_id: &str) -> Result<Vec<ReportSummary>>;

    async fn submit(&self, report_type: ReportType, request: &SubmitRequest) -> Result<SubmitResponse>;

    async fn upload_photos(
        &self,
        report_type: ReportType,
        report_id: &str,
        upload: &PhotoUpload,
    ) -> Result<()>;

    async fn finalize(&self, report_type: ReportType, report_id: &str, station_id: &str) -> Result<()>;

    async fn patch_status(&self, report_type: ReportType, report_id: &str, status: CmStatus) -> Result<()>;

    async fn upload_report_files(&self, report_type: ReportType, upload: &ReportFileUpload) -> Result<()>;
}
