//! 提出フローの結合テスト
//!
//! MockApi とメモリ上の下書きストアで、送信順序・失敗時の挙動を検証

use chrono::NaiveDate;
use imps_checklist::api::mock::{ApiCall, Endpoint, Failure, MockApi};
use imps_checklist::config::Session;
use imps_checklist::draft::{DraftKey, DraftOp, DraftRecord, DraftStore, MemoryDraftStore};
use imps_checklist::form::{ChecklistForm, FormOptions, FormState, MissingItem, TaskState};
use imps_checklist::photo::{ObjectUrls, PhotoFile};
use imps_checklist::template::ChecklistTemplate;
use imps_checklist::ImpsError;
use imps_common::{CmStatus, EquipmentType, Job, PfStatus, ReportKind, ReportType, Station};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const CM_KEY: &str = "cmDraft:open:STA1:new";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
}

fn cm() -> ReportType {
    ReportType::new(ReportKind::Cm, EquipmentType::Charger)
}

fn station() -> Station {
    Station {
        station_id: "STA1".into(),
        station_name: "Bangna Hub".into(),
        ..Default::default()
    }
}

fn fake_photo(name: &str) -> PhotoFile {
    PhotoFile {
        path: PathBuf::from(format!("/tmp/{}", name)),
        file_name: name.to_string(),
        size: 10,
        mime: "image/jpeg".into(),
        sha256: "ab".repeat(32),
        width: None,
        height: None,
        taken_at: None,
    }
}

fn new_form(api: Arc<MockApi>, store: Arc<MemoryDraftStore>) -> ChecklistForm {
    let session = Session {
        station_id: "STA1".into(),
    };
    let options = FormOptions {
        debounce: Duration::from_millis(20),
        today: today(),
        ..Default::default()
    };
    ChecklistForm::new(
        session,
        ChecklistTemplate::builtin(cm()),
        api,
        store,
        Arc::new(ObjectUrls::new()),
        options,
    )
}

/// 提出可能な状態まで入力する（写真は項目1と2に1枚ずつ）
fn fill_valid(form: &mut ChecklistForm) {
    form.set_inspector("Somchai").unwrap();
    form.set_status("r1_1", PfStatus::Fail).unwrap();
    form.set_remark("r1_1", "コネクタ焼損").unwrap();
    form.set_status("r2_1", PfStatus::Pass).unwrap();
    form.attach_photos("r1", vec![fake_photo("before.jpg")]).unwrap();
    form.attach_photos("r2", vec![fake_photo("after.jpg")]).unwrap();
    form.set_summary("コネクタ交換済み").unwrap();
}

fn calls_after_submit(api: &MockApi) -> Vec<ApiCall> {
    let calls = api.calls();
    let start = calls
        .iter()
        .position(|c| matches!(c, ApiCall::Submit { .. }))
        .expect("submit が呼ばれていない");
    calls[start..].to_vec()
}

/// 提出成功: submit → g1 → g2 → finalize → 下書き削除
#[tokio::test]
async fn test_submit_sequence_uploads_groups_in_order() {
    let api = Arc::new(MockApi::new(station()).with_report_id("R-42"));
    let store = Arc::new(MemoryDraftStore::new());
    let mut form = new_form(api.clone(), store.clone());

    form.load().await.unwrap();
    assert_eq!(form.state(), &FormState::Editing);
    fill_valid(&mut form);
    assert!(form.validate().is_empty());

    let outcome = form.submit().await.unwrap();
    assert_eq!(outcome.report_id, "R-42");
    assert_eq!(outcome.redirect, "/dashboard/cm-report?station_id=STA1");
    assert_eq!(
        form.state(),
        &FormState::Done {
            report_id: "R-42".into()
        }
    );

    let expected = vec![
        ApiCall::Submit {
            station_id: "STA1".into(),
            path_prefix: "cm".into(),
        },
        ApiCall::UploadPhotos {
            report_id: "R-42".into(),
            station_id: "STA1".into(),
            group: "g1".into(),
            files: 1,
        },
        ApiCall::UploadPhotos {
            report_id: "R-42".into(),
            station_id: "STA1".into(),
            group: "g2".into(),
            files: 1,
        },
        ApiCall::Finalize {
            report_id: "R-42".into(),
            station_id: "STA1".into(),
        },
    ];
    assert_eq!(calls_after_submit(&api), expected);

    // 最後のストア操作は下書き削除
    assert_eq!(store.ops().last(), Some(&DraftOp::Clear(CM_KEY.into())));
    assert!(!store.contains(&DraftKey::for_report(cm(), "STA1", "new")));

    let submitted = api.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].inspector, "Somchai");
    assert_eq!(submitted[0].inspection_date, Some(today()));
    assert_eq!(submitted[0].job.status_of("r1_1"), PfStatus::Fail);
}

/// submit が 500 → 写真は送らず、下書きも残す
#[tokio::test]
async fn test_submit_failure_keeps_draft_and_skips_uploads() {
    let api = Arc::new(MockApi::new(station()).failing(Endpoint::Submit, Failure::Status(500)));
    let store = Arc::new(MemoryDraftStore::new());
    let mut form = new_form(api.clone(), store.clone());

    form.load().await.unwrap();
    fill_valid(&mut form);

    let err = form.submit().await.unwrap_err();
    assert!(matches!(err, ImpsError::Http { status: 500, .. }));
    assert_eq!(form.state(), &FormState::Editing);

    let uploads = api
        .calls()
        .into_iter()
        .filter(|c| matches!(c, ApiCall::UploadPhotos { .. } | ApiCall::Finalize { .. }))
        .count();
    assert_eq!(uploads, 0);

    assert!(!store.ops().contains(&DraftOp::Clear(CM_KEY.into())));
    let draft = store.load(&DraftKey::for_report(cm(), "STA1", "new")).unwrap();
    assert_eq!(draft.job.inspector, "Somchai");
    assert_eq!(draft.summary, "コネクタ交換済み");

    // 入力はそのまま残り、再提出できる
    form.set_summary("再提出").unwrap();
}

/// 2グループ目の写真で失敗 → finalize しない、どのグループかが分かる
#[tokio::test]
async fn test_photo_failure_is_attributed_to_group() {
    let api = Arc::new(MockApi::new(station()).failing_group("g2"));
    let store = Arc::new(MemoryDraftStore::new());
    let mut form = new_form(api.clone(), store.clone());

    form.load().await.unwrap();
    fill_valid(&mut form);

    let err = form.submit().await.unwrap_err();
    assert!(matches!(err, ImpsError::PhotoUpload { ref group, .. } if group == "g2"));
    assert!(!api.calls().iter().any(|c| matches!(c, ApiCall::Finalize { .. })));

    let plan = form.upload_plan().unwrap();
    assert_eq!(plan.tasks()[0].state, TaskState::Succeeded);
    assert!(matches!(plan.tasks()[1].state, TaskState::Failed(_)));
    assert!(store.contains(&DraftKey::for_report(cm(), "STA1", "new")));
}

#[tokio::test]
async fn test_finalize_failure_keeps_draft() {
    let api = Arc::new(MockApi::new(station()).failing(Endpoint::Finalize, Failure::Unreachable));
    let store = Arc::new(MemoryDraftStore::new());
    let mut form = new_form(api.clone(), store.clone());

    form.load().await.unwrap();
    fill_valid(&mut form);

    let err = form.submit().await.unwrap_err();
    assert!(matches!(err, ImpsError::Finalize(_)));
    assert_eq!(form.state(), &FormState::Editing);
    assert!(!store.ops().contains(&DraftOp::Clear(CM_KEY.into())));
}

/// 未入力があればサーバーに送らない
#[tokio::test]
async fn test_validation_blocks_submit() {
    let api = Arc::new(MockApi::new(station()));
    let store = Arc::new(MemoryDraftStore::new());
    let mut form = new_form(api.clone(), store.clone());

    form.load().await.unwrap();
    form.set_inspector("Somchai").unwrap();
    form.set_status("r1_1", PfStatus::Pass).unwrap();

    let err = form.submit().await.unwrap_err();
    let missing = match err {
        ImpsError::Validation(missing) => missing,
        other => panic!("Validation になるべき: {:?}", other),
    };
    assert!(missing.contains(&MissingItem::Summary));
    assert!(missing.iter().any(|m| matches!(m, MissingItem::Answer { key, .. } if key == "r2_1")));
    assert!(missing.iter().any(|m| matches!(m, MissingItem::Photo { item_key, .. } if item_key == "r1")));
    assert!(!form.all_pf_answered());

    assert!(!api.calls().iter().any(|c| matches!(c, ApiCall::Submit { .. })));
    assert_eq!(form.state(), &FormState::Editing);
}

/// 読込時に下書きを復元し、未来日は今日に丸める
#[tokio::test]
async fn test_load_restores_draft() {
    let api = Arc::new(MockApi::new(station()).with_previews("CM-CG-2510-07", "STA1_3/2025"));
    let store = Arc::new(MemoryDraftStore::new());

    let mut job = Job {
        station_id: "STA1".into(),
        inspector: "Niran".into(),
        inspection_date: NaiveDate::from_ymd_opt(2025, 12, 1),
        ..Default::default()
    };
    job.set_status("r1_1", PfStatus::Pass);
    let draft = DraftRecord {
        job,
        summary: "途中まで".into(),
        ..Default::default()
    };
    store.save(&DraftKey::for_report(cm(), "STA1", "new"), &draft);

    let mut form = new_form(api.clone(), store.clone());
    form.load().await.unwrap();

    assert_eq!(form.job().inspector, "Niran");
    assert_eq!(form.job().inspection_date, Some(today()));
    assert_eq!(form.job().station_name, "Bangna Hub");
    assert_eq!(form.job().status_of("r1_1"), PfStatus::Pass);
    assert_eq!(form.summary(), "途中まで");
    assert_eq!(form.job().issue_id, "CM-CG-2510-07");
    assert_eq!(form.job().doc_name, "STA1_3/2025");
}

#[tokio::test]
async fn test_station_failure_falls_back_to_session() {
    let api = Arc::new(MockApi::new(station()).failing(Endpoint::StationInfo, Failure::Status(503)));
    let store = Arc::new(MemoryDraftStore::new());
    let mut form = new_form(api, store);

    form.load().await.unwrap();
    assert_eq!(form.state(), &FormState::Editing);
    assert_eq!(form.job().station_id, "STA1");
    assert_eq!(form.job().station_name, "");
}

/// 読込中に破棄されたら、遅れて届いた応答は反映しない
#[tokio::test]
async fn test_unmount_discards_late_station_response() {
    let api = Arc::new(MockApi::new(station()).with_station_delay(Duration::from_millis(100)));
    let store = Arc::new(MemoryDraftStore::new());
    let mut form = new_form(api.clone(), store);

    let lifecycle = form.lifecycle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        lifecycle.unmount();
    });

    form.load().await.unwrap();
    assert_eq!(form.state(), &FormState::LoadingStation);
    assert!(form.station().is_none());
    assert!(!api.calls().iter().any(|c| matches!(c, ApiCall::PreviewIssueId { .. })));
}

#[tokio::test]
async fn test_future_date_is_capped_to_today() {
    let api = Arc::new(MockApi::new(station()));
    let mut form = new_form(api, Arc::new(MemoryDraftStore::new()));
    form.load().await.unwrap();

    let tomorrow = today().succ_opt().unwrap();
    assert_eq!(form.set_inspection_date(tomorrow).unwrap(), today());

    let past = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
    assert_eq!(form.set_inspection_date(past).unwrap(), past);
    assert_eq!(form.job().inspection_date, Some(past));
}

#[tokio::test]
async fn test_unknown_question_is_rejected() {
    let api = Arc::new(MockApi::new(station()));
    let mut form = new_form(api, Arc::new(MemoryDraftStore::new()));
    form.load().await.unwrap();

    assert!(matches!(
        form.set_status("r9_1", PfStatus::Pass),
        Err(ImpsError::UnknownField(_))
    ));
}

/// 提出済み報告書はステータス変更のみ
#[tokio::test]
async fn test_existing_record_allows_only_status_transition() {
    let api = Arc::new(MockApi::new(station()));
    let mut form = new_form(api.clone(), Arc::new(MemoryDraftStore::new())).existing("R-9", CmStatus::Open);

    assert!(matches!(form.set_inspector("x"), Err(ImpsError::ReadOnly(_))));
    assert!(matches!(
        form.transition_status(CmStatus::Closed).await,
        Err(ImpsError::InvalidTransition { .. })
    ));

    form.transition_status(CmStatus::InProgress).await.unwrap();
    form.transition_status(CmStatus::Closed).await.unwrap();

    let patches: Vec<_> = api
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            ApiCall::PatchStatus { report_id, status } => Some((report_id, status)),
            _ => None,
        })
        .collect();
    assert_eq!(
        patches,
        vec![
            ("R-9".to_string(), CmStatus::InProgress),
            ("R-9".to_string(), CmStatus::Closed)
        ]
    );
}

/// 入力後に閉じると保留中の下書きが書き出される
#[tokio::test]
async fn test_close_flushes_pending_draft() {
    let api = Arc::new(MockApi::new(station()));
    let store = Arc::new(MemoryDraftStore::new());
    let session = Session {
        station_id: "STA1".into(),
    };
    let options = FormOptions {
        debounce: Duration::from_secs(60),
        today: today(),
        ..Default::default()
    };
    let mut form = ChecklistForm::new(
        session,
        ChecklistTemplate::builtin(cm()),
        api,
        store.clone(),
        Arc::new(ObjectUrls::new()),
        options,
    );
    form.load().await.unwrap();
    form.set_inspector("Somchai").unwrap();
    assert!(store.ops().is_empty());

    form.close();
    assert_eq!(store.ops(), vec![DraftOp::Save(CM_KEY.into())]);
}
