//! 点検チェックリストの型定義
//!
//! CLIとAPIクライアントで共有される型:
//! - ReportType: PM/CM × 機器種別（エンドポイント・採番プレフィックスを決める）
//! - Job: 入力途中のチェックリスト回答一式
//! - Station: バックエンドから取得する参照専用のステーション情報

use crate::error::Error;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 点検区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// 予防保全（Preventive Maintenance）
    Pm,
    /// 事後保全（Corrective Maintenance）
    Cm,
}

impl ReportKind {
    /// 採番に使う大文字コード
    pub fn code(&self) -> &'static str {
        match self {
            ReportKind::Pm => "PM",
            ReportKind::Cm => "CM",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::Pm => "pm",
            ReportKind::Cm => "cm",
        }
    }
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pm" => Ok(ReportKind::Pm),
            "cm" => Ok(ReportKind::Cm),
            _ => Err(Error::Parse(format!("不明な点検区分: {}. pm または cm を指定してください", s))),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 点検対象の機器種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentType {
    Charger,
    Mdb,
    Ccb,
    #[serde(rename = "cbbox")]
    CbBox,
    Station,
    Ac,
}

impl EquipmentType {
    pub const ALL: [EquipmentType; 6] = [
        EquipmentType::Charger,
        EquipmentType::Mdb,
        EquipmentType::Ccb,
        EquipmentType::CbBox,
        EquipmentType::Station,
        EquipmentType::Ac,
    ];

    /// 発行番号（Issue ID）に埋め込む2文字コード
    pub fn code(&self) -> &'static str {
        match self {
            EquipmentType::Charger => "CG",
            EquipmentType::Mdb => "MB",
            EquipmentType::Ccb => "CC",
            EquipmentType::CbBox => "CB",
            EquipmentType::Station => "ST",
            EquipmentType::Ac => "AC",
        }
    }

    /// URL・ストレージキーに使う小文字名
    pub fn slug(&self) -> &'static str {
        match self {
            EquipmentType::Charger => "charger",
            EquipmentType::Mdb => "mdb",
            EquipmentType::Ccb => "ccb",
            EquipmentType::CbBox => "cbbox",
            EquipmentType::Station => "station",
            EquipmentType::Ac => "ac",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EquipmentType::Charger => "Charger",
            EquipmentType::Mdb => "MDB",
            EquipmentType::Ccb => "CCB",
            EquipmentType::CbBox => "CB-BOX",
            EquipmentType::Station => "Station",
            EquipmentType::Ac => "AC",
        }
    }
}

impl FromStr for EquipmentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], "");
        EquipmentType::ALL
            .into_iter()
            .find(|e| e.slug() == normalized || e.code().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| Error::Parse(format!("不明な機器種別: {}", s)))
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 報告書の種類（点検区分 × 機器種別）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportType {
    pub kind: ReportKind,
    pub equipment: EquipmentType,
}

impl ReportType {
    pub fn new(kind: ReportKind, equipment: EquipmentType) -> Self {
        Self { kind, equipment }
    }

    /// `/{prefix}report/...` の prefix 部分
    ///
    /// 充電器は区分名のみ（`pmreport`）、それ以外は機器名を前置する（`mdbpmreport`）。
    pub fn path_prefix(&self) -> String {
        match self.equipment {
            EquipmentType::Charger => self.kind.slug().to_string(),
            other => format!("{}{}", other.slug(), self.kind.slug()),
        }
    }

    /// 発行番号のプレフィックス（例: `PM-MB`）
    pub fn issue_prefix(&self) -> String {
        format!("{}-{}", self.kind.code(), self.equipment.code())
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.equipment)
    }
}

/// Pass/Fail/NA の3値（＋未回答）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PfStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
    #[serde(rename = "NA")]
    Na,
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl PfStatus {
    pub fn is_answered(&self) -> bool {
        !matches!(self, PfStatus::Unset)
    }
}

impl FromStr for PfStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pass" | "p" => Ok(PfStatus::Pass),
            "fail" | "f" => Ok(PfStatus::Fail),
            "na" | "n/a" | "n" => Ok(PfStatus::Na),
            "" => Ok(PfStatus::Unset),
            _ => Err(Error::Parse(format!("不明な判定: {}", s))),
        }
    }
}

impl fmt::Display for PfStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PfStatus::Pass => "PASS",
            PfStatus::Fail => "FAIL",
            PfStatus::Na => "N/A",
            PfStatus::Unset => "-",
        };
        f.pad(s)
    }
}

/// 1設問の回答
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Answer {
    pub status: PfStatus,
    pub remark: String,
}

/// 設備リストの1行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentEntry {
    pub name: String,
    pub brand: String,
    pub model: String,
    pub serial_no: String,
}

/// 入力途中のチェックリスト回答一式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Job {
    pub station_id: String,
    pub station_name: String,
    pub inspection_date: Option<NaiveDate>,
    pub inspector: String,
    pub issue_id: String,
    pub doc_name: String,
    /// 設問キー → 回答
    pub answers: BTreeMap<String, Answer>,
    pub equipment: Vec<EquipmentEntry>,
    /// 是正処置（自由記述）
    pub corrective_actions: Vec<String>,
}

impl Job {
    /// ステーション情報から初期値を埋めた Job を作る
    pub fn for_station(station: &Station) -> Self {
        Self {
            station_id: station.station_id.clone(),
            station_name: station.station_name.clone(),
            ..Default::default()
        }
    }

    pub fn status_of(&self, key: &str) -> PfStatus {
        self.answers.get(key).map(|a| a.status).unwrap_or_default()
    }

    pub fn set_status(&mut self, key: &str, status: PfStatus) {
        self.answers.entry(key.to_string()).or_default().status = status;
    }

    pub fn set_remark(&mut self, key: &str, remark: &str) {
        self.answers.entry(key.to_string()).or_default().remark = remark.to_string();
    }
}

/// CM報告書のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CmStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

impl CmStatus {
    /// 提出済み報告書で許可されるステータス遷移か
    pub fn can_transition_to(&self, next: CmStatus) -> bool {
        matches!(
            (self, next),
            (CmStatus::Open, CmStatus::InProgress) | (CmStatus::InProgress, CmStatus::Closed)
        )
    }
}

impl FromStr for CmStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "open" => Ok(CmStatus::Open),
            "in progress" | "inprogress" => Ok(CmStatus::InProgress),
            "closed" => Ok(CmStatus::Closed),
            _ => Err(Error::Parse(format!("不明なステータス: {}", s))),
        }
    }
}

impl fmt::Display for CmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmStatus::Open => "Open",
            CmStatus::InProgress => "In Progress",
            CmStatus::Closed => "Closed",
        };
        f.write_str(s)
    }
}

/// ステーション情報（参照専用）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Station {
    pub station_id: String,
    pub station_name: String,
    #[serde(alias = "SN", alias = "sn")]
    pub serial_number: String,
    pub model: String,
    pub brand: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_prefix() {
        let charger = ReportType::new(ReportKind::Pm, EquipmentType::Charger);
        assert_eq!(charger.path_prefix(), "pm");

        let mdb = ReportType::new(ReportKind::Pm, EquipmentType::Mdb);
        assert_eq!(mdb.path_prefix(), "mdbpm");

        let cm = ReportType::new(ReportKind::Cm, EquipmentType::CbBox);
        assert_eq!(cm.path_prefix(), "cbboxcm");
    }

    #[test]
    fn test_issue_prefix() {
        let rt = ReportType::new(ReportKind::Pm, EquipmentType::Mdb);
        assert_eq!(rt.issue_prefix(), "PM-MB");
        let rt = ReportType::new(ReportKind::Cm, EquipmentType::Charger);
        assert_eq!(rt.issue_prefix(), "CM-CG");
    }

    #[test]
    fn test_equipment_from_str() {
        assert_eq!("mdb".parse::<EquipmentType>().unwrap(), EquipmentType::Mdb);
        assert_eq!("CB-BOX".parse::<EquipmentType>().unwrap(), EquipmentType::CbBox);
        assert_eq!("cb_box".parse::<EquipmentType>().unwrap(), EquipmentType::CbBox);
        assert_eq!("CG".parse::<EquipmentType>().unwrap(), EquipmentType::Charger);
        assert!("pump".parse::<EquipmentType>().is_err());
    }

    /// 解析に失敗した値はすべて Parse エラーとして返る
    #[test]
    fn test_from_str_failures_are_parse_errors() {
        assert!(matches!("xm".parse::<ReportKind>(), Err(Error::Parse(_))));
        assert!(matches!("pump".parse::<EquipmentType>(), Err(Error::Parse(_))));
        assert!(matches!("maybe".parse::<PfStatus>(), Err(Error::Parse(_))));
        assert!(matches!("Reopened".parse::<CmStatus>(), Err(Error::Parse(_))));
    }

    #[test]
    fn test_pf_status_serde() {
        let json = serde_json::to_string(&PfStatus::Na).unwrap();
        assert_eq!(json, "\"NA\"");
        let unset: PfStatus = serde_json::from_str("\"\"").unwrap();
        assert_eq!(unset, PfStatus::Unset);
        assert!(!unset.is_answered());
        assert!(PfStatus::Fail.is_answered());
    }

    #[test]
    fn test_job_set_status_and_remark() {
        let mut job = Job::default();
        assert_eq!(job.status_of("r1_1"), PfStatus::Unset);

        job.set_status("r1_1", PfStatus::Fail);
        job.set_remark("r1_1", "端子の緩み");

        let answer = &job.answers["r1_1"];
        assert_eq!(answer.status, PfStatus::Fail);
        assert_eq!(answer.remark, "端子の緩み");
    }

    #[test]
    fn test_cm_status_transition() {
        assert!(CmStatus::Open.can_transition_to(CmStatus::InProgress));
        assert!(CmStatus::InProgress.can_transition_to(CmStatus::Closed));
        assert!(!CmStatus::Open.can_transition_to(CmStatus::Closed));
        assert!(!CmStatus::Closed.can_transition_to(CmStatus::Open));
        assert_eq!("in-progress".parse::<CmStatus>().unwrap(), CmStatus::InProgress);
        assert_eq!(
            serde_json::to_string(&CmStatus::InProgress).unwrap(),
            "\"In Progress\""
        );
    }

    #[test]
    fn test_station_alias() {
        let json = r#"{"station_id":"STA1","station_name":"Bangna","SN":"SN-001","model":"DC120"}"#;
        let station: Station = serde_json::from_str(json).unwrap();
        assert_eq!(station.serial_number, "SN-001");
        assert_eq!(station.brand, "");
    }
}
