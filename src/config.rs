use crate::error::{ImpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEBOUNCE_MS: u64 = 800;
pub const DEFAULT_MAX_PHOTOS_PER_ITEM: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub access_token: Option<String>,
    pub selected_station_id: Option<String>,
    pub language: String,
    /// 下書き保存先（省略時は ~/.local/share/imps/drafts）
    pub draft_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub timeout_seconds: u64,
    pub max_photos_per_item: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            access_token: None,
            selected_station_id: None,
            language: "th".into(),
            draft_dir: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            timeout_seconds: 60,
            max_photos_per_item: DEFAULT_MAX_PHOTOS_PER_ITEM,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ImpsError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("imps").join("config.json"))
    }

    pub fn draft_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.draft_dir {
            return Ok(dir.clone());
        }
        let data = dirs::data_dir()
            .ok_or_else(|| ImpsError::Config("データディレクトリが見つかりません".into()))?;
        Ok(data.join("imps").join("drafts"))
    }

    pub fn get_access_token(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(token) = std::env::var("IMPS_ACCESS_TOKEN") {
            return Ok(token);
        }

        self.access_token.clone().ok_or(ImpsError::MissingAccessToken)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// 起動時に一度だけセッション値を取り出す
    ///
    /// 以降は `Session` を明示的に受け渡し、設定ファイルは明示的な変更時のみ書き戻す。
    pub fn session(&self, station_override: Option<&str>) -> Result<Session> {
        let station_id = station_override
            .map(str::to_string)
            .or_else(|| self.selected_station_id.clone())
            .ok_or_else(|| {
                ImpsError::Config("ステーションが選択されていません (--station で指定)".into())
            })?;

        Ok(Session { station_id })
    }
}

/// フォーム1つ分の実行コンテキスト
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub station_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.debounce(), Duration::from_millis(800));
        assert_eq!(config.max_photos_per_item, 20);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"base_url":"https://imps.example"}"#).unwrap();
        assert_eq!(config.base_url, "https://imps.example");
        assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_session_prefers_override() {
        let config = Config {
            selected_station_id: Some("STA9".into()),
            ..Default::default()
        };
        assert_eq!(config.session(Some("STA1")).unwrap().station_id, "STA1");
        assert_eq!(config.session(None).unwrap().station_id, "STA9");
        assert!(Config::default().session(None).is_err());
    }

    /// セッションはステーションだけを持ち、言語設定は設定ファイル側に残る
    #[test]
    fn test_session_carries_station_only() {
        let config = Config {
            selected_station_id: Some("STA9".into()),
            language: "en".into(),
            ..Default::default()
        };
        assert_eq!(
            config.session(None).unwrap(),
            Session {
                station_id: "STA9".into()
            }
        );
        assert_eq!(config.language, "en");
    }
}
