//! APIの要求・応答型
//!
//! バックエンドの応答はここで型付きにデコードし、以降のコードは既知の形だけを扱う。

use crate::error::{ImpsError, Result};
use crate::measurement::SubmittedMeasurement;
use chrono::NaiveDate;
use imps_common::{CmStatus, Job, Station};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// `GET /station/info/public` の応答（包まれた形・素の形の両方を受ける）
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StationInfoResponse {
    Wrapped { station: Station },
    Bare(Station),
}

impl StationInfoResponse {
    pub(crate) fn into_station(self) -> Result<Station> {
        let station = match self {
            StationInfoResponse::Wrapped { station } => station,
            StationInfoResponse::Bare(station) => station,
        };
        if station.station_id.trim().is_empty() {
            return Err(ImpsError::ApiParse("station_id がありません".into()));
        }
        Ok(station)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueIdPreview {
    pub issue_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocNamePreview {
    #[serde(alias = "document_name")]
    pub doc_name: String,
}

/// 一覧の1行（報告書・アップロード済みファイル共通）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSummary {
    #[serde(alias = "_id")]
    pub id: String,
    pub issue_id: String,
    pub doc_name: String,
    pub status: Option<CmStatus>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListResponse {
    Items { items: Vec<ReportSummary> },
    Bare(Vec<ReportSummary>),
}

impl From<ListResponse> for Vec<ReportSummary> {
    fn from(resp: ListResponse) -> Self {
        match resp {
            ListResponse::Items { items } => items,
            ListResponse::Bare(items) => items,
        }
    }
}

/// 提出本体（JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    pub station_id: String,
    pub issue_id: String,
    pub doc_name: String,
    pub inspector: String,
    pub inspection_date: Option<NaiveDate>,
    pub job: Job,
    /// 計測グループ → 項目 → 数値化した値
    pub measurements: BTreeMap<String, BTreeMap<String, SubmittedMeasurement>>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResponse {
    #[serde(alias = "id")]
    pub report_id: String,
}

/// 1グループ分の写真アップロード
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub station_id: String,
    pub group: String,
    pub files: Vec<crate::photo::PhotoFile>,
}

/// 作成済み報告書ファイル（PDF等）のアップロード
#[derive(Debug, Clone)]
pub struct ReportFileUpload {
    pub station_id: String,
    pub report_date: NaiveDate,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusPatch {
    pub status: CmStatus,
}

/// エラー応答の本文
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn message(&self) -> Option<String> {
        if let Some(msg) = &self.message {
            return Some(msg.clone());
        }
        match &self.detail {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }
}
