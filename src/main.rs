use anyhow::{bail, Context};
use clap::Parser;
use imps_checklist::api::{HttpApi, MaintenanceApi, ReportFileUpload};
use imps_checklist::draft::{DraftKey, DraftStore, FileDraftStore};
use imps_checklist::form::{ChecklistForm, FormOptions, TaskState, NEW_DRAFT_ID};
use imps_checklist::photo::ObjectUrls;
use imps_checklist::template::ChecklistTemplate;
use imps_checklist::{cli, config, interactive, scanner, sequence, ImpsError};
use chrono::Local;
use cli::{Cli, Commands};
use config::{Config, Session};
use imps_common::{ReportKind, ReportType};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tracing::Level;

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn build_api(config: &Config) -> anyhow::Result<Arc<dyn MaintenanceApi>> {
    let token = config.get_access_token()?;
    let api = HttpApi::new(&config.base_url, Some(token), config.timeout())?;
    Ok(Arc::new(api))
}

fn load_template(report_type: ReportType, path: Option<&Path>) -> anyhow::Result<ChecklistTemplate> {
    match path {
        Some(path) => {
            let template = ChecklistTemplate::load(path)
                .with_context(|| format!("テンプレートを読み込めません: {}", path.display()))?;
            if template.report_type != report_type {
                bail!(
                    "テンプレートの種類 ({} {}) が指定 ({} {}) と一致しません",
                    template.report_type.kind,
                    template.report_type.equipment,
                    report_type.kind,
                    report_type.equipment
                );
            }
            Ok(template)
        }
        None => Ok(ChecklistTemplate::builtin(report_type)),
    }
}

fn build_form(
    config: &Config,
    session: Session,
    template: ChecklistTemplate,
    store: Arc<dyn DraftStore>,
) -> anyhow::Result<ChecklistForm> {
    let options = FormOptions {
        debounce: config.debounce(),
        max_photos_per_item: config.max_photos_per_item,
        ..Default::default()
    };
    Ok(ChecklistForm::new(
        session,
        template,
        build_api(config)?,
        store,
        Arc::new(ObjectUrls::new()),
        options,
    ))
}

async fn submit_form(form: &mut ChecklistForm) -> anyhow::Result<()> {
    let missing = form.validate();
    if !missing.is_empty() {
        println!("⚠ 未入力の項目があります ({}件):", missing.len());
        for item in &missing {
            println!("  - {}", item);
        }
        bail!(ImpsError::Validation(missing));
    }

    let total: usize = form.photos().non_empty().map(|l| l.len()).sum();
    println!("[1/3] 報告書を送信中...");
    println!("[2/3] 写真をアップロード中... ({}枚)", total);

    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("  {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style);
    }

    let progress = pb.clone();
    let result = form
        .submit_with_progress(move |task| match &task.state {
            TaskState::Succeeded => {
                progress.inc(task.files.len() as u64);
                progress.set_message(task.group.clone());
            }
            TaskState::Failed(message) => {
                progress.set_message(format!("{} 失敗: {}", task.group, message));
            }
            TaskState::Pending => {}
        })
        .await;
    pb.finish();

    let outcome = result.context("提出に失敗しました（下書きは残っています）")?;
    println!("[3/3] ✔ 確定しました");
    println!("\n✅ 提出完了: {}", outcome.report_id);
    println!("  → {}", outcome.redirect);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = Config::load()?;

    match cli.command {
        Commands::Fill { report, template, photos, submit } => {
            println!("📝 imps - チェックリスト入力\n");

            let report_type = report.report_type();
            let session = config.session(cli.station.as_deref())?;
            let template = load_template(report_type, template.as_deref())?;
            let store: Arc<dyn DraftStore> = Arc::new(FileDraftStore::new(config.draft_dir()?));

            let candidates = match photos {
                Some(folder) => {
                    let images = scanner::scan_folder(&folder)?;
                    println!("✔ {}枚の写真を検出\n", images.len());
                    images
                }
                None => Vec::new(),
            };

            let mut form = build_form(&config, session, template, store)?;
            form.load().await?;

            let completed = interactive::run_fill(&mut form, &candidates)?;
            if completed && submit {
                submit_form(&mut form).await?;
            } else {
                form.close();
                println!("\n✔ 下書きを保存しました: {}", form.draft_key());
            }
        }

        Commands::Submit { report, template } => {
            println!("📤 imps - 提出\n");

            let report_type = report.report_type();
            let session = config.session(cli.station.as_deref())?;
            let template = load_template(report_type, template.as_deref())?;
            let store: Arc<dyn DraftStore> = Arc::new(FileDraftStore::new(config.draft_dir()?));

            let key = DraftKey::for_report(report_type, &session.station_id, NEW_DRAFT_ID);
            if store.load(&key).is_none() {
                bail!("下書きがありません: {}", key);
            }

            let mut form = build_form(&config, session, template, store)?;
            form.load().await?;
            if !form.lost_photos().is_empty() {
                println!("⚠ 再添付が必要な写真: {}", form.lost_photos().join(", "));
            }
            submit_form(&mut form).await?;
        }

        Commands::Draft { report, show, clear } => {
            let session = config.session(cli.station.as_deref())?;
            let store = FileDraftStore::new(config.draft_dir()?);
            let key = DraftKey::for_report(report.report_type(), &session.station_id, NEW_DRAFT_ID);

            if show || !clear {
                match store.load(&key) {
                    Some(draft) => {
                        println!("下書き: {}", key);
                        println!("  パス: {}", store.path_for(&key).display());
                        if let Some(saved_at) = draft.saved_at {
                            println!("  保存日時: {}", saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
                        }
                        if show {
                            println!("{}", serde_json::to_string_pretty(&draft)?);
                        }
                    }
                    None => println!("下書きがありません: {}", key),
                }
            }

            if clear {
                store.clear(&key);
                println!("✔ 下書きを削除しました: {}", key);
            }
        }

        Commands::Preview { report, date } => {
            let report_type = report.report_type();
            let session = config.session(cli.station.as_deref())?;
            let api = build_api(&config)?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());

            let (issue_id, doc_name) = tokio::join!(
                sequence::preview_issue_id(api.as_ref(), report_type, &session.station_id, date),
                sequence::preview_doc_name(api.as_ref(), report_type, &session.station_id, date),
            );
            println!("発行番号: {} ({:?})", issue_id.value, issue_id.source);
            println!("文書名:   {} ({:?})", doc_name.value, doc_name.source);
        }

        Commands::Status { report_id, from, to, equipment } => {
            let session = config.session(cli.station.as_deref())?;
            let report_type = ReportType::new(ReportKind::Cm, equipment);
            let store: Arc<dyn DraftStore> = Arc::new(FileDraftStore::new(config.draft_dir()?));

            let mut form = build_form(&config, session, ChecklistTemplate::builtin(report_type), store)?
                .existing(&report_id, from);
            form.transition_status(to).await?;
            println!("✔ {} のステータスを {} → {} に変更しました", report_id, from, to);
        }

        Commands::UploadReport { report, files, date } => {
            let session = config.session(cli.station.as_deref())?;
            let api = build_api(&config)?;

            for file in &files {
                if !file.is_file() {
                    bail!(ImpsError::FileNotFound(file.display().to_string()));
                }
            }

            let upload = ReportFileUpload {
                station_id: session.station_id,
                report_date: date.unwrap_or_else(|| Local::now().date_naive()),
                files,
            };
            api.upload_report_files(report.report_type(), &upload).await?;
            println!("✔ {}件のファイルをアップロードしました", upload.files.len());
        }

        Commands::Config { set_access_token, set_station, set_base_url, show } => {
            let mut changed = false;

            if let Some(token) = set_access_token {
                config.access_token = Some(token);
                changed = true;
                println!("✔ アクセストークンを設定しました");
            }
            if let Some(station) = set_station {
                println!("✔ 既定のステーションを設定しました: {}", station);
                config.selected_station_id = Some(station);
                changed = true;
            }
            if let Some(url) = set_base_url {
                println!("✔ APIのURLを設定しました: {}", url);
                config.base_url = url;
                changed = true;
            }
            if changed {
                config.save()?;
            }

            if show {
                println!("設定:");
                println!("  API: {}", config.base_url);
                println!("  ステーション: {}", config.selected_station_id.as_deref().unwrap_or("未設定"));
                println!("  言語: {}", config.language);
                println!("  下書き: {}", config.draft_dir()?.display());
                println!("  自動保存の間隔: {}ms", config.debounce_ms);
                println!("  写真の上限: {}枚/項目", config.max_photos_per_item);
                println!("  アクセストークン: {}", if config.access_token.is_some() { "設定済み" } else { "未設定" });
            }
        }
    }

    Ok(())
}
