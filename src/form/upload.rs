//! 写真グループの逐次アップロード
//!
//! 点検項目ごとに1リクエストで送る。並列化はせず、失敗した時点で残りを中断し、
//! どのグループで失敗したかをタスクの状態に残す。
//! 成功済みのタスクは再実行時にスキップされる。

use crate::api::{MaintenanceApi, PhotoUpload};
use crate::error::{ImpsError, Result};
use crate::photo::{PhotoBoard, PhotoFile};
use crate::template::ChecklistTemplate;
use imps_common::ReportType;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct UploadTask {
    pub item_key: String,
    pub group: String,
    pub files: Vec<PhotoFile>,
    pub state: TaskState,
}

#[derive(Debug, Clone)]
pub struct UploadPlan {
    station_id: String,
    tasks: Vec<UploadTask>,
}

impl UploadPlan {
    /// テンプレートの項目順に、写真のある項目だけをタスク化する
    pub fn from_board(template: &ChecklistTemplate, photos: &PhotoBoard, station_id: &str) -> Self {
        for list in photos.non_empty() {
            if template.item_by_key(list.item_key()).is_none() {
                warn!("テンプレートにない項目の写真は送信しません: {}", list.item_key());
            }
        }

        let tasks = template
            .items
            .iter()
            .filter_map(|item| {
                let list = photos.list(&item.key()).filter(|l| !l.is_empty())?;
                Some(UploadTask {
                    item_key: item.key(),
                    group: item.photo_group(),
                    files: list.files(),
                    state: TaskState::Pending,
                })
            })
            .collect();

        Self {
            station_id: station_id.to_string(),
            tasks,
        }
    }

    pub fn tasks(&self) -> &[UploadTask] {
        &self.tasks
    }

    pub fn total_files(&self) -> usize {
        self.tasks.iter().map(|t| t.files.len()).sum()
    }

    pub fn count(&self, state: &TaskState) -> usize {
        self.tasks.iter().filter(|t| &t.state == state).count()
    }

    pub fn failed(&self) -> Option<&UploadTask> {
        self.tasks
            .iter()
            .find(|t| matches!(t.state, TaskState::Failed(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Succeeded)
    }

    /// 未完了のタスクを順に実行する。`on_done` はタスク1件ごとに呼ばれる
    pub async fn run<F>(
        &mut self,
        api: &dyn MaintenanceApi,
        report_type: ReportType,
        report_id: &str,
        mut on_done: F,
    ) -> Result<()>
    where
        F: FnMut(&UploadTask) + Send,
    {
        for task in self.tasks.iter_mut() {
            if task.state == TaskState::Succeeded {
                continue;
            }

            let upload = PhotoUpload {
                station_id: self.station_id.clone(),
                group: task.group.clone(),
                files: task.files.clone(),
            };

            match api.upload_photos(report_type, report_id, &upload).await {
                Ok(()) => {
                    info!("写真アップロード完了: {} ({}枚)", task.group, task.files.len());
                    task.state = TaskState::Succeeded;
                    on_done(task);
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("写真アップロード失敗: {}: {}", task.group, message);
                    task.state = TaskState::Failed(message.clone());
                    on_done(task);
                    return Err(ImpsError::PhotoUpload {
                        group: task.group.clone(),
                        message,
                    });
                }
            }
        }
        Ok(())
    }
}
