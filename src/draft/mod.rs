//! 下書き保存モジュール
//!
//! 入力途中のフォーム状態を端末ローカルに保存し、
//! 誤ったページ遷移やプロセス終了から復元できるようにする。
//! 保存は best-effort で、失敗してもエラーを呼び出し元へ返さない。

mod debounce;

pub use debounce::DebouncedSaver;

use crate::measurement::MeasurementGrid;
use crate::photo::PhotoMeta;
use chrono::{DateTime, Utc};
use imps_common::{EquipmentType, Job, ReportKind, ReportType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// 下書きのキー
///
/// 点検区分・機器種別・ステーションごとに名前空間を分け、
/// 別ステーションや別報告書の下書きと衝突しないようにする。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DraftKey {
    /// `cmDraft:open:{station_id}:{draft_id}`
    Cm { station_id: String, draft_id: String },
    /// `pmDraft:v2:{equipment}:{station_id}:{draft_id}`
    Pm {
        equipment: EquipmentType,
        station_id: String,
        draft_id: String,
    },
}

impl DraftKey {
    pub fn for_report(report_type: ReportType, station_id: &str, draft_id: &str) -> Self {
        match report_type.kind {
            ReportKind::Cm => DraftKey::Cm {
                station_id: station_id.to_string(),
                draft_id: draft_id.to_string(),
            },
            ReportKind::Pm => DraftKey::Pm {
                equipment: report_type.equipment,
                station_id: station_id.to_string(),
                draft_id: draft_id.to_string(),
            },
        }
    }

    pub fn station_id(&self) -> &str {
        match self {
            DraftKey::Cm { station_id, .. } | DraftKey::Pm { station_id, .. } => station_id,
        }
    }

    pub fn storage_key(&self) -> String {
        match self {
            DraftKey::Cm { station_id, draft_id } => {
                format!("cmDraft:open:{}:{}", station_id, draft_id)
            }
            DraftKey::Pm {
                equipment,
                station_id,
                draft_id,
            } => format!("pmDraft:v2:{}:{}:{}", equipment.slug(), station_id, draft_id),
        }
    }
}

impl std::fmt::Display for DraftKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.storage_key())
    }
}

/// 下書きの中身
///
/// 写真はメタデータのみ保持し、画像バイナリは保存しない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftRecord {
    pub job: Job,
    /// 計測グループ名 → グリッド
    pub measurements: BTreeMap<String, MeasurementGrid>,
    /// 点検項目キー → 添付写真メタデータ
    pub photos: BTreeMap<String, Vec<PhotoMeta>>,
    pub summary: String,
    pub saved_at: Option<DateTime<Utc>>,
}

/// 下書きストア
///
/// どの操作もエラーを境界の外へ出さない。
/// 保存失敗は何もしなかったものとして、読込失敗は「下書きなし」として扱う。
pub trait DraftStore: Send + Sync {
    fn save(&self, key: &DraftKey, record: &DraftRecord);
    fn load(&self, key: &DraftKey) -> Option<DraftRecord>;
    fn clear(&self, key: &DraftKey);
}

/// ファイル1つに保存される形式
#[derive(Debug, Serialize, Deserialize)]
struct StoredDraft {
    version: u32,
    key: String,
    record: DraftRecord,
}

/// ディレクトリ配下にキーごとのJSONファイルとして保存するストア
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    const CURRENT_VERSION: u32 = 2;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &DraftKey) -> PathBuf {
        self.dir.join(format!("{}.json", escape_file_name(&key.storage_key())))
    }

    fn try_save(&self, key: &DraftKey, record: &DraftRecord) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        {
            let writer = BufWriter::new(File::create(&tmp_path)?);
            let stored = StoredDraft {
                version: Self::CURRENT_VERSION,
                key: key.storage_key(),
                record: record.clone(),
            };
            serde_json::to_writer(writer, &stored)?;
        }
        std::fs::rename(&tmp_path, &path)
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, key: &DraftKey, record: &DraftRecord) {
        match self.try_save(key, record) {
            Ok(()) => debug!("下書きを保存: {}", key),
            Err(e) => warn!("下書き保存に失敗 ({}): {}", key, e),
        }
    }

    fn load(&self, key: &DraftKey) -> Option<DraftRecord> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("下書き読込に失敗 ({}): {}", key, e);
                return None;
            }
        };

        match serde_json::from_reader::<_, StoredDraft>(BufReader::new(file)) {
            Ok(stored) if stored.version == Self::CURRENT_VERSION => Some(stored.record),
            Ok(stored) => {
                warn!("下書きのバージョン不一致 (v{})、破棄します: {}", stored.version, key);
                None
            }
            Err(e) => {
                warn!("下書きが破損しています ({}): {}", key, e);
                None
            }
        }
    }

    fn clear(&self, key: &DraftKey) {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("下書きを削除: {}", key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("下書き削除に失敗 ({}): {}", key, e),
        }
    }
}

/// ファイル名に使えない文字を `%XX` に置き換える
fn escape_file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// ストア操作の記録（テスト用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftOp {
    Save(String),
    Clear(String),
}

/// メモリ上のストア
///
/// `with_quota` で容量上限を与えると、超過した保存は警告を出して破棄される。
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    entries: Mutex<HashMap<String, String>>,
    ops: Mutex<Vec<DraftOp>>,
    quota_bytes: Option<usize>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Default::default()
        }
    }

    /// 実行された save/clear の履歴
    pub fn ops(&self) -> Vec<DraftOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    pub fn contains(&self, key: &DraftKey) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(&key.storage_key()))
            .unwrap_or(false)
    }

    fn record_op(&self, op: DraftOp) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, key: &DraftKey, record: &DraftRecord) {
        let storage_key = key.storage_key();
        self.record_op(DraftOp::Save(storage_key.clone()));

        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!("下書きのシリアライズに失敗 ({}): {}", key, e);
                return;
            }
        };

        if let Some(quota) = self.quota_bytes {
            if json.len() > quota {
                warn!("下書きが容量上限を超えたため保存しません ({}): {} > {} bytes", key, json.len(), quota);
                return;
            }
        }

        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(storage_key, json);
            }
            Err(e) => warn!("下書き保存に失敗 ({}): {}", key, e),
        }
    }

    fn load(&self, key: &DraftKey) -> Option<DraftRecord> {
        let json = self.entries.lock().ok()?.get(&key.storage_key()).cloned()?;
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("下書きが破損しています ({}): {}", key, e);
                None
            }
        }
    }

    fn clear(&self, key: &DraftKey) {
        let storage_key = key.storage_key();
        self.record_op(DraftOp::Clear(storage_key.clone()));
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(&storage_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imps_common::PfStatus;

    fn sample_record() -> DraftRecord {
        let mut job = Job {
            station_id: "STA1".into(),
            inspector: "Somchai".into(),
            ..Default::default()
        };
        job.set_status("r1_1", PfStatus::Pass);
        DraftRecord {
            job,
            summary: "異常なし".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_storage_keys() {
        let cm = DraftKey::for_report(
            ReportType::new(ReportKind::Cm, EquipmentType::Charger),
            "STA1",
            "new",
        );
        assert_eq!(cm.storage_key(), "cmDraft:open:STA1:new");

        let pm = DraftKey::for_report(
            ReportType::new(ReportKind::Pm, EquipmentType::Mdb),
            "STA1",
            "new",
        );
        assert_eq!(pm.storage_key(), "pmDraft:v2:mdb:STA1:new");
        assert_eq!(pm.station_id(), "STA1");
    }

    #[test]
    fn test_escape_file_name() {
        assert_eq!(escape_file_name("cmDraft:open:STA1:new"), "cmDraft%3Aopen%3ASTA1%3Anew");
        assert_ne!(escape_file_name("a_b"), escape_file_name("a:b"));
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryDraftStore::new();
        let key = DraftKey::Cm {
            station_id: "STA1".into(),
            draft_id: "new".into(),
        };
        let record = sample_record();

        store.save(&key, &record);
        assert_eq!(store.load(&key), Some(record));

        store.clear(&key);
        assert_eq!(store.load(&key), None);
        assert_eq!(
            store.ops(),
            vec![
                DraftOp::Save("cmDraft:open:STA1:new".into()),
                DraftOp::Clear("cmDraft:open:STA1:new".into()),
            ]
        );
    }

    #[test]
    fn test_memory_store_quota_exceeded_is_noop() {
        let store = MemoryDraftStore::with_quota(16);
        let key = DraftKey::Cm {
            station_id: "STA1".into(),
            draft_id: "new".into(),
        };

        store.save(&key, &sample_record());
        assert!(!store.contains(&key));
        assert_eq!(store.load(&key), None);
    }
}
