//! 提出前の入力チェック
//!
//! 未入力の項目を列挙して返す。サーバーには一切問い合わせない。

use crate::measurement::MeasurementGrid;
use crate::photo::PhotoBoard;
use crate::template::ChecklistTemplate;
use imps_common::Job;
use std::collections::BTreeMap;
use std::fmt;

/// 未入力の項目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingItem {
    InspectionDate,
    Inspector,
    Answer { key: String, label: String },
    Measurement { group: String, field: String },
    Photo { item_key: String, title: String },
    Summary,
}

impl fmt::Display for MissingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingItem::InspectionDate => write!(f, "点検日"),
            MissingItem::Inspector => write!(f, "点検者"),
            MissingItem::Answer { key, label } => write!(f, "判定 {} ({})", key, label),
            MissingItem::Measurement { group, field } => write!(f, "計測値 {}/{}", group, field),
            MissingItem::Photo { item_key, title } => write!(f, "写真 {} ({})", item_key, title),
            MissingItem::Summary => write!(f, "総評"),
        }
    }
}

/// 未回答の Pass/Fail 設問（テンプレート順）
pub fn missing_answers(template: &ChecklistTemplate, job: &Job) -> Vec<MissingItem> {
    template
        .items
        .iter()
        .flat_map(|item| item.questions.iter())
        .filter(|q| !job.status_of(&q.key).is_answered())
        .map(|q| MissingItem::Answer {
            key: q.key.clone(),
            label: q.label.clone(),
        })
        .collect()
}

pub fn missing_measurements(grids: &BTreeMap<String, MeasurementGrid>) -> Vec<MissingItem> {
    grids
        .iter()
        .flat_map(|(group, grid)| {
            grid.missing_fields()
                .into_iter()
                .map(move |field| MissingItem::Measurement {
                    group: group.clone(),
                    field,
                })
        })
        .collect()
}

pub fn missing_photos(template: &ChecklistTemplate, photos: &PhotoBoard) -> Vec<MissingItem> {
    template
        .items
        .iter()
        .filter(|item| item.photo_required && photos.count(&item.key()) == 0)
        .map(|item| MissingItem::Photo {
            item_key: item.key(),
            title: item.title.clone(),
        })
        .collect()
}

/// フォーム全体の未入力項目
pub fn validate(
    template: &ChecklistTemplate,
    job: &Job,
    grids: &BTreeMap<String, MeasurementGrid>,
    photos: &PhotoBoard,
    summary: &str,
) -> Vec<MissingItem> {
    let mut missing = Vec::new();

    if job.inspection_date.is_none() {
        missing.push(MissingItem::InspectionDate);
    }
    if job.inspector.trim().is_empty() {
        missing.push(MissingItem::Inspector);
    }
    missing.extend(missing_answers(template, job));
    missing.extend(missing_measurements(grids));
    missing.extend(missing_photos(template, photos));
    if template.require_summary && summary.trim().is_empty() {
        missing.push(MissingItem::Summary);
    }

    missing
}
