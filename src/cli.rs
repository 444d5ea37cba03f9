use clap::{Parser, Subcommand};
use imps_common::{CmStatus, EquipmentType, ReportKind, ReportType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imps")]
#[command(about = "EV充電ステーション保守点検チェックリスト", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// ステーションID（省略時は設定ファイルの値）
    #[arg(long, global = true)]
    pub station: Option<String>,
}

/// 報告書の種類を指定する共通オプション
#[derive(clap::Args, Clone, Debug)]
pub struct ReportArgs {
    /// 報告書の種類 (pm/cm)
    #[arg(short, long, default_value = "pm")]
    pub kind: ReportKind,

    /// 機器 (charger/mdb/ccb/cbbox/station/ac)
    #[arg(short, long, default_value = "charger")]
    pub equipment: EquipmentType,
}

impl ReportArgs {
    pub fn report_type(&self) -> ReportType {
        ReportType::new(self.kind, self.equipment)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 対話的にチェックリストを入力（下書きは自動保存）
    Fill {
        #[command(flatten)]
        report: ReportArgs,

        /// チェックリストテンプレート（JSON、省略時は組み込み）
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// 写真フォルダ（項目ごとに添付する候補）
        #[arg(short, long)]
        photos: Option<PathBuf>,

        /// 入力後そのまま提出する
        #[arg(long)]
        submit: bool,
    },

    /// 保存済みの下書きを提出
    Submit {
        #[command(flatten)]
        report: ReportArgs,

        /// チェックリストテンプレート（JSON、省略時は組み込み）
        #[arg(short, long)]
        template: Option<PathBuf>,
    },

    /// 下書きを表示/削除
    Draft {
        #[command(flatten)]
        report: ReportArgs,

        /// 下書きの内容を表示
        #[arg(long)]
        show: bool,

        /// 下書きを削除
        #[arg(long)]
        clear: bool,
    },

    /// 次の発行番号・文書名を表示
    Preview {
        #[command(flatten)]
        report: ReportArgs,

        /// 点検日 (YYYY-MM-DD、省略時は今日)
        #[arg(short, long)]
        date: Option<chrono::NaiveDate>,
    },

    /// 提出済みCM報告書のステータスを変更
    Status {
        /// 報告書ID
        #[arg(required = true)]
        report_id: String,

        /// 現在のステータス (open/in-progress/closed)
        #[arg(long, default_value = "open")]
        from: CmStatus,

        /// 変更後のステータス
        #[arg(long)]
        to: CmStatus,

        /// 機器
        #[arg(short, long, default_value = "charger")]
        equipment: EquipmentType,
    },

    /// 作成済みの報告書ファイルをアップロード
    UploadReport {
        #[command(flatten)]
        report: ReportArgs,

        /// アップロードするファイル
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// 報告日 (YYYY-MM-DD、省略時は今日)
        #[arg(short, long)]
        date: Option<chrono::NaiveDate>,
    },

    /// 設定を表示/編集
    Config {
        /// アクセストークンを設定
        #[arg(long)]
        set_access_token: Option<String>,

        /// 既定のステーションを設定
        #[arg(long)]
        set_station: Option<String>,

        /// APIのベースURLを設定
        #[arg(long)]
        set_base_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fill_with_report_args() {
        let cli = Cli::try_parse_from([
            "imps", "--station", "STA1", "fill", "--kind", "cm", "--equipment", "mdb",
        ])
        .unwrap();

        assert_eq!(cli.station.as_deref(), Some("STA1"));
        match cli.command {
            Commands::Fill { report, submit, .. } => {
                assert_eq!(report.report_type(), ReportType::new(ReportKind::Cm, EquipmentType::Mdb));
                assert!(!submit);
            }
            _ => panic!("fill として解析されるべき"),
        }
    }

    #[test]
    fn test_parse_status_transition() {
        let cli = Cli::try_parse_from(["imps", "status", "R-1", "--to", "in-progress"]).unwrap();
        match cli.command {
            Commands::Status { report_id, from, to, .. } => {
                assert_eq!(report_id, "R-1");
                assert_eq!(from, CmStatus::Open);
                assert_eq!(to, CmStatus::InProgress);
            }
            _ => panic!("status として解析されるべき"),
        }
    }
}
