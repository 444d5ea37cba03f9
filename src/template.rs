//! 点検チェックリストのテンプレート
//!
//! 機器種別ごとの点検項目（番号・設問・写真必須か）と計測グループを定義する。
//! 組み込みテンプレートのほか、JSONファイルから読み込める。

use crate::error::{ImpsError, Result};
use crate::measurement::{MeasurementGrid, Unit};
use crate::pass_fail::PassFailRow;
use imps_common::{EquipmentType, ReportKind, ReportType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub remark: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub photo_required: bool,
}

impl ChecklistItem {
    /// 写真リストのキー
    pub fn key(&self) -> String {
        format!("r{}", self.number)
    }

    /// 写真アップロード時のグループ名
    pub fn photo_group(&self) -> String {
        format!("g{}", self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSpec {
    pub group: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unit: Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistTemplate {
    pub report_type: ReportType,
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub measurements: Vec<MeasurementSpec>,
    #[serde(default = "default_true")]
    pub require_summary: bool,
}

fn default_true() -> bool {
    true
}

impl ChecklistTemplate {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImpsError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let template: ChecklistTemplate = serde_json::from_str(&content)?;
        template.validate()?;
        Ok(template)
    }

    /// 番号・設問キー・計測項目の重複を検査
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(ImpsError::InvalidTemplate("点検項目がありません".into()));
        }

        let mut numbers = HashSet::new();
        let mut keys = HashSet::new();
        for item in &self.items {
            if !numbers.insert(item.number) {
                return Err(ImpsError::InvalidTemplate(format!("項目番号が重複: {}", item.number)));
            }
            for q in &item.questions {
                if !keys.insert(q.key.as_str()) {
                    return Err(ImpsError::InvalidTemplate(format!("設問キーが重複: {}", q.key)));
                }
            }
        }

        let mut groups = HashSet::new();
        for spec in &self.measurements {
            if !groups.insert(spec.group.as_str()) {
                return Err(ImpsError::InvalidTemplate(format!("計測グループが重複: {}", spec.group)));
            }
            if spec.fields.is_empty() {
                return Err(ImpsError::InvalidTemplate(format!("計測項目がありません: {}", spec.group)));
            }
        }
        Ok(())
    }

    pub fn item(&self, number: u32) -> Option<&ChecklistItem> {
        self.items.iter().find(|i| i.number == number)
    }

    pub fn item_by_key(&self, key: &str) -> Option<&ChecklistItem> {
        self.items.iter().find(|i| i.key() == key)
    }

    pub fn rows(&self) -> Vec<PassFailRow> {
        self.items
            .iter()
            .flat_map(|item| item.questions.iter())
            .map(|q| {
                let row = PassFailRow::new(&q.key, &q.label);
                if q.remark {
                    row.with_remark()
                } else {
                    row
                }
            })
            .collect()
    }

    /// 空のグリッド（計測グループ名 → グリッド）
    pub fn measurement_grids(&self) -> BTreeMap<String, MeasurementGrid> {
        self.measurements
            .iter()
            .map(|spec| {
                (
                    spec.group.clone(),
                    MeasurementGrid::with_fields(spec.fields.iter().cloned(), spec.unit),
                )
            })
            .collect()
    }

    pub fn builtin(report_type: ReportType) -> Self {
        match report_type.kind {
            ReportKind::Cm => cm_template(report_type),
            ReportKind::Pm => pm_template(report_type),
        }
    }
}

fn item(number: u32, title: &str, questions: &[&str], photo_required: bool) -> ChecklistItem {
    ChecklistItem {
        number,
        title: title.to_string(),
        questions: questions
            .iter()
            .enumerate()
            .map(|(i, label)| Question {
                key: format!("r{}_{}", number, i + 1),
                label: label.to_string(),
                remark: true,
            })
            .collect(),
        photo_required,
    }
}

fn measurement(group: &str, fields: &[&str], unit: Unit) -> MeasurementSpec {
    MeasurementSpec {
        group: group.to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
        unit,
    }
}

const PHASE_VOLTAGES: &[&str] = &["L1-N", "L2-N", "L3-N", "L1-L2", "L2-L3", "L3-L1", "N-G"];

fn pm_template(report_type: ReportType) -> ChecklistTemplate {
    let (items, measurements) = match report_type.equipment {
        EquipmentType::Charger => (
            vec![
                item(1, "Enclosure & signage", &["Enclosure free of damage/corrosion", "Warning labels legible"], true),
                item(2, "Charging cables & connectors", &["Cable insulation intact", "Connector pins clean"], true),
                item(3, "Emergency stop", &["E-stop cuts output"], true),
                item(4, "Cooling system", &["Fans running", "Air filter clean"], true),
                item(5, "Display & HMI", &["Screen readable", "RFID reader responds"], false),
                item(6, "Grounding", &["PE connection tight"], true),
            ],
            vec![
                measurement("input_voltage", PHASE_VOLTAGES, Unit::V),
                measurement("insulation", &["DC+ - PE", "DC- - PE"], Unit::MegaOhm),
            ],
        ),
        EquipmentType::Mdb => (
            vec![
                item(1, "Panel exterior", &["Door & lock condition", "No water ingress"], true),
                item(2, "Main breaker", &["Breaker operates", "No overheating marks"], true),
                item(3, "Busbar & terminals", &["Torque marks intact", "No discoloration"], true),
                item(4, "Surge protection device", &["SPD indicator normal"], true),
                item(5, "Power meter", &["Meter reading available"], false),
            ],
            vec![
                measurement("main_breaker", PHASE_VOLTAGES, Unit::V),
                measurement("breaker_charger_1", PHASE_VOLTAGES, Unit::V),
            ],
        ),
        EquipmentType::Ccb => (
            vec![
                item(1, "Cabinet exterior", &["No damage", "Ventilation clear"], true),
                item(2, "Breakers", &["Breakers operate"], true),
                item(3, "Terminal tightness", &["Torque marks intact"], true),
            ],
            vec![measurement("incoming", PHASE_VOLTAGES, Unit::V)],
        ),
        EquipmentType::CbBox => (
            vec![
                item(1, "Box exterior", &["Cover sealed", "No corrosion"], true),
                item(2, "Breaker", &["Breaker operates"], true),
                item(3, "RCD test", &["RCD trips on test"], false),
            ],
            vec![measurement("outgoing", &["L1-N", "L2-N", "L3-N"], Unit::V)],
        ),
        EquipmentType::Station => (
            vec![
                item(1, "Site cleanliness", &["Bay clean", "Drainage clear"], true),
                item(2, "Lighting", &["Canopy lights working"], true),
                item(3, "Signage & markings", &["Parking markings visible"], true),
                item(4, "Fire safety", &["Extinguisher in date"], true),
            ],
            Vec::new(),
        ),
        EquipmentType::Ac => (
            vec![
                item(1, "Indoor unit", &["Filter clean", "No abnormal noise"], true),
                item(2, "Outdoor unit", &["Condenser clean", "Fan operates"], true),
                item(3, "Drain", &["Drain line clear"], false),
            ],
            vec![
                measurement("supply", &["L-N"], Unit::V),
                measurement("temperature", &["Supply air", "Return air"], Unit::Celsius),
            ],
        ),
    };

    ChecklistTemplate {
        report_type,
        items,
        measurements,
        require_summary: true,
    }
}

fn cm_template(report_type: ReportType) -> ChecklistTemplate {
    ChecklistTemplate {
        report_type,
        items: vec![
            item(1, "Problem found", &["Fault reproduced on site"], true),
            item(2, "Corrective action", &["Fault cleared after repair"], true),
            item(3, "Additional evidence", &[], false),
        ],
        measurements: Vec::new(),
        require_summary: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_are_valid() {
        for kind in [ReportKind::Pm, ReportKind::Cm] {
            for equipment in EquipmentType::ALL {
                let template = ChecklistTemplate::builtin(ReportType::new(kind, equipment));
                assert!(template.validate().is_ok(), "{:?} {:?}", kind, equipment);
            }
        }
    }

    #[test]
    fn test_item_keys_and_groups() {
        let template = ChecklistTemplate::builtin(ReportType::new(ReportKind::Pm, EquipmentType::Mdb));
        let item = template.item(3).unwrap();
        assert_eq!(item.key(), "r3");
        assert_eq!(item.photo_group(), "g3");
        assert_eq!(item.questions[0].key, "r3_1");
        assert_eq!(template.item_by_key("r3"), Some(item));
    }

    #[test]
    fn test_measurement_grids_start_empty() {
        let template = ChecklistTemplate::builtin(ReportType::new(ReportKind::Pm, EquipmentType::Mdb));
        let grids = template.measurement_grids();
        assert_eq!(grids.len(), 2);
        assert_eq!(grids["main_breaker"].missing_fields().len(), PHASE_VOLTAGES.len());
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let mut template = ChecklistTemplate::builtin(ReportType::new(ReportKind::Cm, EquipmentType::Charger));
        template.items[1].number = 1;
        assert!(matches!(template.validate(), Err(ImpsError::InvalidTemplate(_))));
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.json");
        let json = r#"{
            "report_type": {"kind": "pm", "equipment": "ac"},
            "items": [
                {"number": 1, "title": "Filter", "questions": [{"key": "f1", "label": "Filter clean"}], "photo_required": true}
            ],
            "measurements": [{"group": "temp", "fields": ["Supply"], "unit": "°C"}]
        }"#;
        std::fs::write(&path, json).unwrap();

        let template = ChecklistTemplate::load(&path).unwrap();
        assert!(template.require_summary);
        assert_eq!(template.rows().len(), 1);
        assert!(!template.rows()[0].with_remark);
        assert_eq!(template.measurements[0].unit, Unit::Celsius);
    }
}
