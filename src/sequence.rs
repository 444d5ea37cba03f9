//! 発行番号（Issue ID）・文書名の採番プレビュー
//!
//! まずサーバーのプレビューAPIを使い、使えないときだけ
//! 既存の報告書一覧・アップロード済み一覧から次の番号を計算する。
//!
//! - 発行番号: `{PM|CM}-{機器コード}-{YY}{MM}-{NN}`
//! - 文書名: `{station_id}_{N}/{YYYY}`

use crate::api::{MaintenanceApi, ReportSummary};
use chrono::{Datelike, NaiveDate};
use imps_common::ReportType;
use regex::Regex;
use tracing::{debug, warn};

lazy_static::lazy_static! {
    static ref ISSUE_ID_RE: Regex = Regex::new(r"^(?P<prefix>[A-Z]{2}-[A-Z]{2}-\d{4})-(?P<seq>\d+)$").unwrap();
    static ref DOC_NAME_RE: Regex = Regex::new(r"^(?P<station>.+)_(?P<seq>\d+)/(?P<year>\d{4})$").unwrap();
}

/// 採番値の出どころ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewSource {
    Server,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePreview {
    pub value: String,
    pub source: PreviewSource,
}

/// 年月まで含めた発行番号プレフィックス（例: `PM-MB-2510`）
pub fn issue_period_prefix(report_type: ReportType, date: NaiveDate) -> String {
    format!("{}-{}", report_type.issue_prefix(), date.format("%y%m"))
}

/// 連番の次の値。桁あふれする番号は無視する
fn next_seq(seq: &str) -> Option<u64> {
    seq.parse::<u64>().ok()?.checked_add(1)
}

/// 既存の発行番号から次の番号を計算
pub fn next_issue_id<'a, I>(report_type: ReportType, date: NaiveDate, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = issue_period_prefix(report_type, date);
    let next = existing
        .into_iter()
        .filter_map(|id| ISSUE_ID_RE.captures(id.trim()))
        .filter(|cap| cap["prefix"] == prefix)
        .filter_map(|cap| next_seq(&cap["seq"]))
        .max()
        .unwrap_or(1);

    format!("{}-{:02}", prefix, next)
}

/// 既存の文書名から次の文書名を計算（ステーション・年ごとの連番）
pub fn next_doc_name<'a, I>(station_id: &str, date: NaiveDate, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let year = date.year();
    let next = existing
        .into_iter()
        .filter_map(|name| DOC_NAME_RE.captures(name.trim()))
        .filter(|cap| &cap["station"] == station_id)
        .filter(|cap| cap["year"].parse::<i32>().ok() == Some(year))
        .filter_map(|cap| next_seq(&cap["seq"]))
        .max()
        .unwrap_or(1);

    format!("{}_{}/{}", station_id, next, year)
}

/// 報告書一覧とアップロード済み一覧を並行取得（片方の失敗は空として扱う）
async fn fetch_known(
    api: &dyn MaintenanceApi,
    report_type: ReportType,
    station_id: &str,
) -> Vec<ReportSummary> {
    let (reports, uploads) = tokio::join!(
        api.list_reports(report_type, station_id),
        api.list_uploads(report_type, station_id),
    );

    let mut known = reports.unwrap_or_else(|e| {
        warn!("報告書一覧の取得に失敗: {}", e);
        Vec::new()
    });
    known.extend(uploads.unwrap_or_else(|e| {
        warn!("アップロード済み一覧の取得に失敗: {}", e);
        Vec::new()
    }));
    known
}

pub async fn preview_issue_id(
    api: &dyn MaintenanceApi,
    report_type: ReportType,
    station_id: &str,
    date: NaiveDate,
) -> SequencePreview {
    match api.preview_issue_id(report_type, station_id, date).await {
        Ok(value) if !value.trim().is_empty() => {
            debug!("発行番号プレビュー: {}", value);
            return SequencePreview {
                value,
                source: PreviewSource::Server,
            };
        }
        Ok(_) => warn!("発行番号プレビューが空のため、一覧から計算します"),
        Err(e) => warn!("発行番号プレビューに失敗、一覧から計算します: {}", e),
    }

    let known = fetch_known(api, report_type, station_id).await;
    SequencePreview {
        value: next_issue_id(report_type, date, known.iter().map(|r| r.issue_id.as_str())),
        source: PreviewSource::Fallback,
    }
}

pub async fn preview_doc_name(
    api: &dyn MaintenanceApi,
    report_type: ReportType,
    station_id: &str,
    date: NaiveDate,
) -> SequencePreview {
    match api.preview_doc_name(report_type, station_id, date).await {
        Ok(value) if !value.trim().is_empty() => {
            return SequencePreview {
                value,
                source: PreviewSource::Server,
            };
        }
        Ok(_) => warn!("文書名プレビューが空のため、一覧から計算します"),
        Err(e) => warn!("文書名プレビューに失敗、一覧から計算します: {}", e),
    }

    let known = fetch_known(api, report_type, station_id).await;
    SequencePreview {
        value: next_doc_name(station_id, date, known.iter().map(|r| r.doc_name.as_str())),
        source: PreviewSource::Fallback,
    }
}
