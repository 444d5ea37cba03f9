//! 対話式チェックリスト入力
//!
//! 設問を順に表示し、入力のたびにフォームへ反映する（下書きは自動保存）。
//! 途中で `q` を入力すると、そこまでの内容を下書きに残して終了する。

use crate::error::{ImpsError, Result};
use crate::form::ChecklistForm;
use crate::measurement::RowPatch;
use crate::photo::PhotoFile;
use chrono::NaiveDate;
use dialoguer::{Input, MultiSelect};
use imps_common::PfStatus;
use std::path::PathBuf;

/// 判定入力の操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerAction {
    Set(PfStatus),
    /// 前の設問と同じ判定
    Repeat,
    Skip,
    Quit,
}

/// 判定入力を解釈する
pub fn parse_answer(input: &str, prev: Option<PfStatus>) -> AnswerAction {
    match input.trim() {
        "" | "s" => AnswerAction::Skip,
        "q" | "Q" => AnswerAction::Quit,
        "r" if prev.is_some() => AnswerAction::Repeat,
        other => match other.parse::<PfStatus>() {
            Ok(status) if status.is_answered() => AnswerAction::Set(status),
            _ => AnswerAction::Skip,
        },
    }
}

/// 点検日の入力を解釈する（空なら None）
pub fn parse_date(input: &str) -> Result<Option<NaiveDate>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| ImpsError::Interactive(format!("日付の形式が不正です ({}): {}", trimmed, e)))
}

fn prompt_text(prompt: &str, initial: &str) -> Result<String> {
    Input::new()
        .with_prompt(prompt)
        .with_initial_text(initial)
        .allow_empty(true)
        .interact_text()
        .map_err(|e| ImpsError::Interactive(e.to_string()))
}

/// 対話的にフォームを入力する。`q` で中断した場合は false を返す
pub fn run_fill(form: &mut ChecklistForm, photo_candidates: &[PathBuf]) -> Result<bool> {
    let job = form.job().clone();
    println!("📋 {} / {} ({})", job.issue_id, job.doc_name, job.station_name);
    if !form.lost_photos().is_empty() {
        println!("⚠ 再添付が必要な写真: {}", form.lost_photos().join(", "));
    }
    println!("---");

    let inspector = prompt_text("点検者", &job.inspector)?;
    form.set_inspector(inspector.trim())?;

    let current = job
        .inspection_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    if let Some(date) = parse_date(&prompt_text("点検日 (YYYY-MM-DD)", &current)?)? {
        let set = form.set_inspection_date(date)?;
        if set != date {
            println!("  → 未来日は指定できません。{} にしました", set);
        }
    }

    if !fill_answers(form)? {
        return Ok(false);
    }
    fill_measurements(form)?;
    fill_photos(form, photo_candidates)?;

    let summary = prompt_text("総評", form.summary())?;
    form.set_summary(summary.trim())?;

    Ok(true)
}

fn fill_answers(form: &mut ChecklistForm) -> Result<bool> {
    let rows = form.template().rows();
    let mut prev: Option<PfStatus> = None;

    println!("判定: [p]PASS [f]FAIL [n]N/A [r]前と同じ [Enter]スキップ [q]中断\n");

    for (count, row) in rows.iter().enumerate() {
        println!("[{}/{}] {}", count + 1, rows.len(), row.render(form.job()));

        let input = prompt_text("判定", "")?;
        let status = match parse_answer(&input, prev) {
            AnswerAction::Set(status) => status,
            AnswerAction::Repeat => match prev {
                Some(status) => status,
                None => continue,
            },
            AnswerAction::Skip => {
                println!("  → スキップ\n");
                continue;
            }
            AnswerAction::Quit => {
                println!("下書きを保存して終了します...");
                return Ok(false);
            }
        };

        form.set_status(&row.key, status)?;
        prev = Some(status);

        if row.with_remark {
            let current = row.remark(form.job()).unwrap_or_default().to_string();
            let remark = prompt_text("  備考", &current)?;
            form.set_remark(&row.key, remark.trim())?;
        }
        println!("  → {}\n", status);
    }

    Ok(true)
}

fn fill_measurements(form: &mut ChecklistForm) -> Result<()> {
    let grids = form.measurements().clone();
    for (group, grid) in &grids {
        println!("\n計測: {}", group);
        for field in grid.keys() {
            let Some(row) = grid.get(field) else { continue };
            let prompt = format!("  {} [{}]", field, row.unit);
            let value = prompt_text(&prompt, &row.value)?;
            form.patch_measurement(group, field, RowPatch::value(value.trim()))?;
        }
    }
    Ok(())
}

fn fill_photos(form: &mut ChecklistForm, candidates: &[PathBuf]) -> Result<()> {
    if candidates.is_empty() {
        return Ok(());
    }

    let labels: Vec<String> = candidates
        .iter()
        .map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default())
        .collect();

    let items: Vec<(String, String)> = form
        .template()
        .items
        .iter()
        .map(|item| (item.key(), format!("{}. {}", item.number, item.title)))
        .collect();

    for (key, title) in items {
        let selected = MultiSelect::new()
            .with_prompt(format!("写真を添付: {} (Spaceで選択)", title))
            .items(&labels)
            .interact()
            .map_err(|e| ImpsError::Interactive(e.to_string()))?;

        let mut files = Vec::new();
        for index in selected {
            match PhotoFile::from_path(&candidates[index]) {
                Ok(file) => files.push(file),
                Err(e) => println!("  ⚠ {}: {}", labels[index], e),
            }
        }
        if files.is_empty() {
            continue;
        }

        let requested = files.len();
        let accepted = form.attach_photos(&key, files)?;
        if accepted < requested {
            println!("  ⚠ 上限を超えた {}枚は添付しませんでした", requested - accepted);
        }
        println!("  ✔ {}枚を添付", accepted);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_shortcuts() {
        assert_eq!(parse_answer("p", None), AnswerAction::Set(PfStatus::Pass));
        assert_eq!(parse_answer("F", None), AnswerAction::Set(PfStatus::Fail));
        assert_eq!(parse_answer("n/a", None), AnswerAction::Set(PfStatus::Na));
        assert_eq!(parse_answer("PASS", None), AnswerAction::Set(PfStatus::Pass));
        assert_eq!(parse_answer("", None), AnswerAction::Skip);
        assert_eq!(parse_answer("q", None), AnswerAction::Quit);
    }

    #[test]
    fn test_repeat_requires_previous() {
        assert_eq!(parse_answer("r", None), AnswerAction::Skip);
        assert_eq!(parse_answer("r", Some(PfStatus::Fail)), AnswerAction::Repeat);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("  ").unwrap(), None);
        assert_eq!(
            parse_date("2025-10-03").unwrap(),
            NaiveDate::from_ymd_opt(2025, 10, 3)
        );
        assert!(matches!(parse_date("03/10/2025"), Err(ImpsError::Interactive(_))));
    }
}
