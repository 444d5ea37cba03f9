//! チェックリストフォームのコントローラ
//!
//! 状態遷移: LoadingStation → Editing → Submitting → Done
//! 提出のどの段階で失敗しても Editing に戻り、下書きは残す。
//!
//! 提出手順:
//! 1. 入力チェック（未入力があればサーバーに送らない）
//! 2. JSON本体を submit → report_id を受け取る
//! 3. 写真を点検項目ごとに1グループずつ逐次アップロード
//! 4. finalize
//! 5. 下書きを削除して一覧画面へ

pub mod upload;
pub mod validation;

use crate::api::{MaintenanceApi, SubmitRequest};
use crate::config::Session;
use crate::draft::{DebouncedSaver, DraftKey, DraftRecord, DraftStore};
use crate::error::{ImpsError, Result};
use crate::measurement::{MeasurementGrid, RowPatch, Unit};
use crate::photo::{PhotoBoard, PhotoFile, PreviewRegistry};
use crate::sequence;
use crate::template::ChecklistTemplate;
use chrono::{Local, NaiveDate, Utc};
use imps_common::{CmStatus, EquipmentEntry, Job, PfStatus, ReportKind, Station};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use upload::{TaskState, UploadPlan, UploadTask};
pub use validation::MissingItem;

/// 新規入力時の下書きID
pub const NEW_DRAFT_ID: &str = "new";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    LoadingStation,
    Editing,
    Submitting,
    Done { report_id: String },
}

/// 新規作成か、提出済み報告書の閲覧（ステータス変更のみ可）か
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditMode {
    New,
    Existing { report_id: String, status: CmStatus },
}

#[derive(Debug, Clone)]
pub struct FormOptions {
    pub debounce: Duration,
    pub max_photos_per_item: usize,
    pub draft_id: String,
    /// 「今日」（未来日の入力を防ぐ上限）
    pub today: NaiveDate,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(crate::config::DEFAULT_DEBOUNCE_MS),
            max_photos_per_item: crate::config::DEFAULT_MAX_PHOTOS_PER_ITEM,
            draft_id: NEW_DRAFT_ID.to_string(),
            today: Local::now().date_naive(),
        }
    }
}

/// フォームの生存フラグ
///
/// 破棄後に届いた応答は捨てる。
#[derive(Debug, Clone)]
pub struct Lifecycle(Arc<AtomicBool>);

impl Lifecycle {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 提出成功時の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub report_id: String,
    /// 遷移先の一覧画面（ステーションをクエリで引き継ぐ）
    pub redirect: String,
}

/// 点検票の入力・送信を管理するフォーム
///
/// 編集のたびに下書きを自動保存する。tokio ランタイム上ではデバウンスされ、
/// ランタイム外では即時保存になる。
pub struct ChecklistForm {
    session: Session,
    template: ChecklistTemplate,
    api: Arc<dyn MaintenanceApi>,
    store: Arc<dyn DraftStore>,
    saver: DebouncedSaver,
    key: DraftKey,
    today: NaiveDate,
    lifecycle: Lifecycle,
    state: FormState,
    mode: EditMode,
    station: Option<Station>,
    job: Job,
    measurements: BTreeMap<String, MeasurementGrid>,
    photos: PhotoBoard,
    summary: String,
    lost_photos: Vec<String>,
    upload_plan: Option<UploadPlan>,
}

impl ChecklistForm {
    pub fn new(
        session: Session,
        template: ChecklistTemplate,
        api: Arc<dyn MaintenanceApi>,
        store: Arc<dyn DraftStore>,
        previews: Arc<dyn PreviewRegistry>,
        options: FormOptions,
    ) -> Self {
        let key = DraftKey::for_report(template.report_type, &session.station_id, &options.draft_id);
        let saver = DebouncedSaver::new(Arc::clone(&store), key.clone(), options.debounce);
        let measurements = template.measurement_grids();

        Self {
            job: Job {
                station_id: session.station_id.clone(),
                ..Default::default()
            },
            session,
            template,
            api,
            store,
            saver,
            key,
            today: options.today,
            lifecycle: Lifecycle::new(),
            state: FormState::LoadingStation,
            mode: EditMode::New,
            station: None,
            measurements,
            photos: PhotoBoard::new(options.max_photos_per_item, previews),
            summary: String::new(),
            lost_photos: Vec::new(),
            upload_plan: None,
        }
    }

    /// 提出済み報告書を開く（編集不可、ステータス変更のみ）
    pub fn existing(mut self, report_id: &str, status: CmStatus) -> Self {
        self.mode = EditMode::Existing {
            report_id: report_id.to_string(),
            status,
        };
        self
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn template(&self) -> &ChecklistTemplate {
        &self.template
    }

    pub fn station(&self) -> Option<&Station> {
        self.station.as_ref()
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn measurements(&self) -> &BTreeMap<String, MeasurementGrid> {
        &self.measurements
    }

    pub fn photos(&self) -> &PhotoBoard {
        &self.photos
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn draft_key(&self) -> &DraftKey {
        &self.key
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// 下書きから復元できなかった写真（再添付が必要）
    pub fn lost_photos(&self) -> &[String] {
        &self.lost_photos
    }

    pub fn upload_plan(&self) -> Option<&UploadPlan> {
        self.upload_plan.as_ref()
    }

    /// ステーション情報の取得・初期値の設定・下書きの復元
    pub async fn load(&mut self) -> Result<()> {
        if self.state != FormState::LoadingStation {
            return Err(ImpsError::InvalidState("読込済みです".into()));
        }

        let station_id = self.session.station_id.clone();
        let station = match self.api.station_info(&station_id).await {
            Ok(station) => station,
            Err(e) => {
                warn!("ステーション情報を取得できません ({}): {}", station_id, e);
                Station {
                    station_id: station_id.clone(),
                    ..Default::default()
                }
            }
        };
        if !self.lifecycle.is_alive() {
            info!("フォーム破棄後の応答を破棄: station_info");
            return Ok(());
        }

        self.job = Job::for_station(&station);
        self.job.inspection_date = Some(self.today);

        if let Some(draft) = self.store.load(&self.key) {
            info!("下書きを復元: {}", self.key);
            self.apply_draft(draft);
        }
        // ステーション由来の表示項目はサーバーの値を正とする
        if !station.station_name.is_empty() {
            self.job.station_name = station.station_name.clone();
        }
        self.job.station_id = station_id.clone();
        self.station = Some(station);

        if self.mode == EditMode::New {
            self.fill_sequence_previews().await;
            if !self.lifecycle.is_alive() {
                return Ok(());
            }
        }

        self.state = FormState::Editing;
        Ok(())
    }

    fn apply_draft(&mut self, draft: DraftRecord) {
        self.job = draft.job;
        if let Some(date) = self.job.inspection_date {
            self.job.inspection_date = Some(date.min(self.today));
        }
        for (group, saved) in &draft.measurements {
            if let Some(grid) = self.measurements.get_mut(group) {
                grid.merge_from(saved);
            }
        }
        self.lost_photos = self.photos.restore(&draft.photos);
        if !self.lost_photos.is_empty() {
            warn!("再添付が必要な写真: {}", self.lost_photos.join(", "));
        }
        self.summary = draft.summary;
    }

    async fn fill_sequence_previews(&mut self) {
        let date = self.job.inspection_date.unwrap_or(self.today);
        let rt = self.template.report_type;
        let station_id = self.session.station_id.clone();

        if self.job.issue_id.is_empty() {
            let preview = sequence::preview_issue_id(self.api.as_ref(), rt, &station_id, date).await;
            self.job.issue_id = preview.value;
        }
        if self.job.doc_name.is_empty() {
            let preview = sequence::preview_doc_name(self.api.as_ref(), rt, &station_id, date).await;
            self.job.doc_name = preview.value;
        }
    }

    /// フォームを閉じる。保留中の下書きを書き出し、以降の応答は捨てる
    pub fn close(&mut self) {
        self.lifecycle.unmount();
        if self.state != FormState::Submitting && !matches!(self.state, FormState::Done { .. }) {
            self.saver.flush();
        }
    }

    fn ensure_editable(&self) -> Result<()> {
        if let EditMode::Existing { report_id, .. } = &self.mode {
            return Err(ImpsError::ReadOnly(report_id.clone()));
        }
        match &self.state {
            FormState::Editing => Ok(()),
            other => Err(ImpsError::InvalidState(format!("{:?}", other))),
        }
    }

    pub fn snapshot(&self) -> DraftRecord {
        DraftRecord {
            job: self.job.clone(),
            measurements: self.measurements.clone(),
            photos: self.photos.metas(),
            summary: self.summary.clone(),
            saved_at: Some(Utc::now()),
        }
    }

    fn autosave(&mut self) {
        let snapshot = self.snapshot();
        self.saver.schedule(snapshot);
    }

    pub fn set_inspector(&mut self, inspector: &str) -> Result<()> {
        self.ensure_editable()?;
        self.job.inspector = inspector.to_string();
        self.autosave();
        Ok(())
    }

    /// 点検日を設定する。未来日は今日に丸め、実際に設定した日付を返す
    pub fn set_inspection_date(&mut self, date: NaiveDate) -> Result<NaiveDate> {
        self.ensure_editable()?;
        let capped = date.min(self.today);
        self.job.inspection_date = Some(capped);
        self.autosave();
        Ok(capped)
    }

    fn ensure_question(&self, key: &str) -> Result<()> {
        let known = self
            .template
            .items
            .iter()
            .flat_map(|i| i.questions.iter())
            .any(|q| q.key == key);
        if known {
            Ok(())
        } else {
            Err(ImpsError::UnknownField(key.to_string()))
        }
    }

    pub fn set_status(&mut self, key: &str, status: PfStatus) -> Result<()> {
        self.ensure_editable()?;
        self.ensure_question(key)?;
        self.job.set_status(key, status);
        self.autosave();
        Ok(())
    }

    pub fn set_remark(&mut self, key: &str, remark: &str) -> Result<()> {
        self.ensure_editable()?;
        self.ensure_question(key)?;
        self.job.set_remark(key, remark);
        self.autosave();
        Ok(())
    }

    pub fn patch_measurement(&mut self, group: &str, field: &str, patch: RowPatch) -> Result<()> {
        self.ensure_editable()?;
        let grid = self
            .measurements
            .get_mut(group)
            .filter(|g| g.get(field).is_some())
            .ok_or_else(|| ImpsError::UnknownField(format!("{}/{}", group, field)))?;
        grid.patch(field, patch);
        self.autosave();
        Ok(())
    }

    pub fn sync_units(&mut self, group: &str, unit: Unit) -> Result<()> {
        self.ensure_editable()?;
        self.measurements
            .get_mut(group)
            .ok_or_else(|| ImpsError::UnknownField(group.to_string()))?
            .sync_units(unit);
        self.autosave();
        Ok(())
    }

    /// 写真を添付し、受け付けた枚数を返す（上限超過分は捨てる）
    pub fn attach_photos(&mut self, item_key: &str, files: Vec<PhotoFile>) -> Result<usize> {
        self.ensure_editable()?;
        if self.template.item_by_key(item_key).is_none() {
            return Err(ImpsError::UnknownField(item_key.to_string()));
        }
        let accepted = self.photos.attach(item_key, files);
        self.autosave();
        Ok(accepted)
    }

    pub fn remove_photo(&mut self, item_key: &str, index: usize) -> Result<Option<PhotoFile>> {
        self.ensure_editable()?;
        let removed = self.photos.remove(item_key, index);
        if removed.is_some() {
            self.autosave();
        }
        Ok(removed)
    }

    pub fn set_photo_remark(&mut self, item_key: &str, index: usize, remark: &str) -> Result<bool> {
        self.ensure_editable()?;
        let updated = self.photos.set_remark(item_key, index, remark);
        if updated {
            self.autosave();
        }
        Ok(updated)
    }

    pub fn set_summary(&mut self, summary: &str) -> Result<()> {
        self.ensure_editable()?;
        self.summary = summary.to_string();
        self.autosave();
        Ok(())
    }

    pub fn add_corrective_action(&mut self, action: &str) -> Result<()> {
        self.ensure_editable()?;
        self.job.corrective_actions.push(action.to_string());
        self.autosave();
        Ok(())
    }

    pub fn add_equipment(&mut self, entry: EquipmentEntry) -> Result<()> {
        self.ensure_editable()?;
        self.job.equipment.push(entry);
        self.autosave();
        Ok(())
    }

    /// 未入力の項目（空なら提出可能）
    pub fn validate(&self) -> Vec<MissingItem> {
        validation::validate(
            &self.template,
            &self.job,
            &self.measurements,
            &self.photos,
            &self.summary,
        )
    }

    pub fn all_pf_answered(&self) -> bool {
        validation::missing_answers(&self.template, &self.job).is_empty()
    }

    pub fn all_measurements_filled(&self) -> bool {
        self.measurements.values().all(MeasurementGrid::is_complete)
    }

    fn submit_request(&self) -> SubmitRequest {
        SubmitRequest {
            station_id: self.session.station_id.clone(),
            issue_id: self.job.issue_id.clone(),
            doc_name: self.job.doc_name.clone(),
            inspector: self.job.inspector.clone(),
            inspection_date: self.job.inspection_date,
            job: self.job.clone(),
            measurements: self
                .measurements
                .iter()
                .map(|(group, grid)| (group.clone(), grid.to_submission()))
                .collect(),
            summary: self.summary.clone(),
        }
    }

    fn redirect(&self) -> String {
        let rt = self.template.report_type;
        let mut url = format!(
            "/dashboard/{}-report?station_id={}",
            rt.kind.slug(),
            self.session.station_id
        );
        if rt.kind == ReportKind::Pm {
            url.push_str(&format!("&equipment={}", rt.equipment.slug()));
        }
        url
    }

    /// 提出する。`on_upload` は写真グループ1件の完了・失敗ごとに呼ばれる
    pub async fn submit_with_progress<F>(&mut self, on_upload: F) -> Result<SubmitOutcome>
    where
        F: FnMut(&UploadTask) + Send,
    {
        self.ensure_editable()?;

        let missing = self.validate();
        if !missing.is_empty() {
            return Err(ImpsError::Validation(missing));
        }

        self.state = FormState::Submitting;
        match self.run_submission(on_upload).await {
            Ok(report_id) => {
                self.saver.cancel();
                self.store.clear(&self.key);
                info!("提出完了: {} ({})", report_id, self.key);
                self.state = FormState::Done {
                    report_id: report_id.clone(),
                };
                Ok(SubmitOutcome {
                    report_id,
                    redirect: self.redirect(),
                })
            }
            Err(e) => {
                warn!("提出失敗: {}", e);
                self.saver.flush();
                self.state = FormState::Editing;
                Err(e)
            }
        }
    }

    pub async fn submit(&mut self) -> Result<SubmitOutcome> {
        self.submit_with_progress(|_| {}).await
    }

    async fn run_submission<F>(&mut self, on_upload: F) -> Result<String>
    where
        F: FnMut(&UploadTask) + Send,
    {
        let rt = self.template.report_type;
        let station_id = self.session.station_id.clone();

        let request = self.submit_request();
        let response = self.api.submit(rt, &request).await?;
        let report_id = response.report_id;
        info!("報告書を作成: {}", report_id);

        let mut plan = UploadPlan::from_board(&self.template, &self.photos, &station_id);
        let uploaded = plan
            .run(self.api.as_ref(), rt, &report_id, on_upload)
            .await;
        self.upload_plan = Some(plan);
        uploaded?;

        self.api
            .finalize(rt, &report_id, &station_id)
            .await
            .map_err(|e| ImpsError::Finalize(e.to_string()))?;

        Ok(report_id)
    }

    /// 提出済み報告書のステータスを変更する（Open → In Progress → Closed のみ）
    pub async fn transition_status(&mut self, next: CmStatus) -> Result<()> {
        let (report_id, current) = match &self.mode {
            EditMode::Existing { report_id, status } => (report_id.clone(), *status),
            EditMode::New => {
                return Err(ImpsError::InvalidState("未提出の報告書です".into()));
            }
        };

        if !current.can_transition_to(next) {
            return Err(ImpsError::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        self.api
            .patch_status(self.template.report_type, &report_id, next)
            .await?;
        info!("ステータス変更: {} {} → {}", report_id, current, next);
        self.mode = EditMode::Existing {
            report_id,
            status: next,
        };
        Ok(())
    }
}

impl Drop for ChecklistForm {
    fn drop(&mut self) {
        self.lifecycle.unmount();
    }
}
