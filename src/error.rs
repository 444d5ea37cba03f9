use crate::form::validation::MissingItem;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImpsError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("アクセストークンが設定されていません。`imps config --set-access-token TOKEN` か環境変数 IMPS_ACCESS_TOKEN で設定してください")]
    MissingAccessToken,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("HTTPエラー ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("通信エラー: {0}")]
    Network(String),

    #[error("APIレスポンスのパースに失敗: {0}")]
    ApiParse(String),

    #[error("未入力の項目があります ({}件)", .0.len())]
    Validation(Vec<MissingItem>),

    #[error("写真アップロード失敗 (グループ {group}): {message}")]
    PhotoUpload { group: String, message: String },

    #[error("報告書の確定に失敗: {0}")]
    Finalize(String),

    #[error("提出済みの報告書は編集できません: {0}")]
    ReadOnly(String),

    #[error("ステータスを {from} から {to} へ変更できません")]
    InvalidTransition { from: String, to: String },

    #[error("現在の状態では実行できません: {0}")]
    InvalidState(String),

    #[error("テンプレートにない項目です: {0}")]
    UnknownField(String),

    #[error("テンプレートが不正: {0}")]
    InvalidTemplate(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("対話入力エラー: {0}")]
    Interactive(String),
}

impl From<reqwest::Error> for ImpsError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ImpsError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => ImpsError::ApiParse(err.to_string()),
            None => ImpsError::Network(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImpsError>;
