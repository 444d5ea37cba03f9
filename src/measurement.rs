//! 電気計測値の入力グリッド
//!
//! ブレーカー・相ごとの電圧などを「数値文字列 + 単位」で保持する。
//! 数値への変換は提出時にのみ行い、変換できない値は null として送る。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 計測単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    V,
    #[serde(rename = "mV")]
    MilliVolt,
    A,
    #[serde(rename = "Ω")]
    Ohm,
    #[serde(rename = "MΩ")]
    MegaOhm,
    #[serde(rename = "°C")]
    Celsius,
    Hz,
}

impl Unit {
    pub const ALL: [Unit; 7] = [
        Unit::V,
        Unit::MilliVolt,
        Unit::A,
        Unit::Ohm,
        Unit::MegaOhm,
        Unit::Celsius,
        Unit::Hz,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::V => "V",
            Unit::MilliVolt => "mV",
            Unit::A => "A",
            Unit::Ohm => "Ω",
            Unit::MegaOhm => "MΩ",
            Unit::Celsius => "°C",
            Unit::Hz => "Hz",
        }
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Unit::ALL
            .into_iter()
            .find(|u| u.symbol() == trimmed)
            .or(match trimmed.to_lowercase().as_str() {
                "v" => Some(Unit::V),
                "mv" => Some(Unit::MilliVolt),
                "a" => Some(Unit::A),
                "ohm" => Some(Unit::Ohm),
                "megohm" | "megaohm" => Some(Unit::MegaOhm),
                "c" | "degc" => Some(Unit::Celsius),
                "hz" => Some(Unit::Hz),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown unit: {}", s))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 1計測項目の入力値
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementRow {
    pub value: String,
    pub unit: Unit,
}

impl MeasurementRow {
    pub fn is_filled(&self) -> bool {
        !self.value.trim().is_empty()
    }

    /// 有限の数値として解釈できれば Some
    pub fn numeric(&self) -> Option<f64> {
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}

/// 部分更新
#[derive(Debug, Clone, Default)]
pub struct RowPatch {
    pub value: Option<String>,
    pub unit: Option<Unit>,
}

impl RowPatch {
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            unit: None,
        }
    }

    pub fn unit(unit: Unit) -> Self {
        Self {
            value: None,
            unit: Some(unit),
        }
    }
}

/// 提出用に数値化した計測値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedMeasurement {
    /// 未入力・数値化できない場合は null
    pub value: Option<f64>,
    pub unit: Unit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementGrid {
    rows: BTreeMap<String, MeasurementRow>,
}

impl MeasurementGrid {
    /// 空欄の計測項目を並べたグリッドを作る
    pub fn with_fields<I, S>(fields: I, unit: Unit) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = fields
            .into_iter()
            .map(|key| {
                (
                    key.into(),
                    MeasurementRow {
                        value: String::new(),
                        unit,
                    },
                )
            })
            .collect();
        Self { rows }
    }

    pub fn get(&self, key: &str) -> Option<&MeasurementRow> {
        self.rows.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn patch(&mut self, key: &str, patch: RowPatch) {
        let row = self.rows.entry(key.to_string()).or_default();
        if let Some(value) = patch.value {
            row.value = value;
        }
        if let Some(unit) = patch.unit {
            row.unit = unit;
        }
    }

    /// グループ単位の単位選択: 全項目の単位を揃える
    pub fn sync_units(&mut self, unit: Unit) {
        for row in self.rows.values_mut() {
            row.unit = unit;
        }
    }

    /// 下書きなどから値を取り込む（未知のキーは無視）
    pub fn merge_from(&mut self, other: &MeasurementGrid) {
        for (key, row) in &other.rows {
            if let Some(target) = self.rows.get_mut(key) {
                *target = row.clone();
            }
        }
    }

    /// 空欄（空白のみを含む）の項目
    pub fn missing_fields(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|(_, row)| !row.is_filled())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.rows.values().all(MeasurementRow::is_filled)
    }

    pub fn to_submission(&self) -> BTreeMap<String, SubmittedMeasurement> {
        self.rows
            .iter()
            .map(|(key, row)| {
                (
                    key.clone(),
                    SubmittedMeasurement {
                        value: row.numeric(),
                        unit: row.unit,
                    },
                )
            })
            .collect()
    }
}
