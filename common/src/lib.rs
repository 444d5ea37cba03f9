//! iMPS Common Library
//!
//! 保守点検チェックリストのCLI・APIクライアントで共有される型

pub mod error;
pub mod types;

pub use error::Error;
pub use types::{
    Answer, CmStatus, EquipmentEntry, EquipmentType, Job, PfStatus, ReportKind, ReportType, Station,
};
