//! エラー型定義

use thiserror::Error;

/// 共通エラー型（共有型の文字列解析で使う）
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_parse() {
        let error = Error::Parse("不明な機器種別: xyz".to_string());
        assert_eq!(format!("{}", error), "Parse error: 不明な機器種別: xyz");
    }

    #[test]
    fn test_error_debug() {
        let error = Error::Parse("テスト".to_string());
        let debug = format!("{:?}", error);
        assert!(debug.contains("Parse"));
        assert!(debug.contains("テスト"));
    }
}
