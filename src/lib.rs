//! imps-checklist - EV充電ステーション保守点検チェックリスト
//!
//! 点検フォームの入力・下書き保存・写真添付・提出までを扱う。

pub mod api;
pub mod cli;
pub mod config;
pub mod draft;
pub mod error;
pub mod form;
pub mod interactive;
pub mod measurement;
pub mod pass_fail;
pub mod photo;
pub mod scanner;
pub mod sequence;
pub mod template;

pub use error::{ImpsError, Result};
