//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use imps_checklist::error::ImpsError;
use imps_checklist::form::MissingItem;
use imps_checklist::photo::PhotoFile;
use imps_checklist::scanner;
use imps_checklist::template::ChecklistTemplate;
use std::path::Path;
use tempfile::tempdir;

/// 存在しないフォルダをスキャンした場合
#[test]
fn test_scan_nonexistent_folder() {
    let result = scanner::scan_folder(Path::new("/nonexistent/path/12345"));
    assert!(matches!(result, Err(ImpsError::FolderNotFound(_))));
}

/// 画像のないフォルダをスキャンした場合
#[test]
fn test_scan_folder_no_images() {
    let dir = tempdir().expect("Failed to create temp dir");

    std::fs::write(dir.path().join("test.txt"), "hello").unwrap();
    std::fs::write(dir.path().join("data.json"), "{}").unwrap();

    let result = scanner::scan_folder(dir.path());
    assert!(result.unwrap().is_empty());
}

/// 存在しない写真を添付しようとした場合
#[test]
fn test_photo_not_found() {
    let result = PhotoFile::from_path(Path::new("/nonexistent/photo.jpg"));
    assert!(matches!(result, Err(ImpsError::FileNotFound(_))));
}

/// 壊れたテンプレートJSON
#[test]
fn test_invalid_template_json() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("template.json");
    std::fs::write(&path, "{ invalid json }").unwrap();

    let result = ChecklistTemplate::load(&path);
    assert!(matches!(result, Err(ImpsError::JsonParse(_))));
}

/// ImpsErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        ImpsError::Config("テスト設定エラー".to_string()),
        ImpsError::MissingAccessToken,
        ImpsError::FileNotFound("test.jpg".to_string()),
        ImpsError::Http {
            status: 500,
            message: "Internal Server Error".to_string(),
        },
        ImpsError::Network("connection refused".to_string()),
        ImpsError::Validation(vec![MissingItem::Summary, MissingItem::Inspector]),
        ImpsError::PhotoUpload {
            group: "g3".to_string(),
            message: "HTTPエラー (500)".to_string(),
        },
        ImpsError::Finalize("timeout".to_string()),
        ImpsError::InvalidTransition {
            from: "Closed".to_string(),
            to: "Open".to_string(),
        },
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// 失敗したグループと件数がメッセージに出る
#[test]
fn test_error_messages_name_the_cause() {
    let upload = ImpsError::PhotoUpload {
        group: "g3".to_string(),
        message: "mock failure".to_string(),
    };
    assert!(upload.to_string().contains("g3"));

    let validation = ImpsError::Validation(vec![MissingItem::Summary, MissingItem::Inspector]);
    assert!(validation.to_string().contains("2件"));
}
