//! Pass/Fail/NA 行
//!
//! 行自体は状態を持たず、親の `Job` の回答マップを直接更新する。

use imps_common::{Job, PfStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct PassFailRow {
    pub key: String,
    pub label: String,
    /// 備考欄を出すか
    pub with_remark: bool,
}

impl PassFailRow {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            with_remark: false,
        }
    }

    pub fn with_remark(mut self) -> Self {
        self.with_remark = true;
        self
    }

    pub fn status(&self, job: &Job) -> PfStatus {
        job.status_of(&self.key)
    }

    /// 3つのボタンは排他。同じ値を選び直しても状態は変わらない
    pub fn select(&self, job: &mut Job, status: PfStatus) {
        job.set_status(&self.key, status);
    }

    /// 備考欄のない行では何もしない
    pub fn set_remark(&self, job: &mut Job, remark: &str) -> bool {
        if !self.with_remark {
            return false;
        }
        job.set_remark(&self.key, remark);
        true
    }

    pub fn remark<'a>(&self, job: &'a Job) -> Option<&'a str> {
        if !self.with_remark {
            return None;
        }
        job.answers.get(&self.key).map(|a| a.remark.as_str())
    }

    /// CLI表示用の1行
    pub fn render(&self, job: &Job) -> String {
        let mut line = format!("[{:>4}] {}", self.status(job), self.label);
        if let Some(remark) = self.remark(job).filter(|r| !r.is_empty()) {
            line.push_str(&format!(" ({})", remark));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_exclusive() {
        let row = PassFailRow::new("r1_1", "Enclosure condition");
        let mut job = Job::default();

        row.select(&mut job, PfStatus::Pass);
        row.select(&mut job, PfStatus::Fail);
        assert_eq!(row.status(&job), PfStatus::Fail);
        assert_eq!(job.answers.len(), 1);
    }

    #[test]
    fn test_remark_only_when_enabled() {
        let mut job = Job::default();
        let plain = PassFailRow::new("r1_1", "Enclosure");
        assert!(!plain.set_remark(&mut job, "錆あり"));
        assert!(plain.remark(&job).is_none());

        let with = PassFailRow::new("r1_2", "Door seal").with_remark();
        assert!(with.set_remark(&mut job, "パッキン劣化"));
        assert_eq!(with.remark(&job), Some("パッキン劣化"));
        assert_eq!(with.render(&job), "[   -] Door seal (パッキン劣化)");
    }
}
