use super::{DraftKey, DraftRecord, DraftStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 下書きのデバウンス保存
///
/// 変更のたびに `schedule` を呼ぶと前回のタイマーを取り消して再設定し、
/// 一定時間入力がなかったときに最新のスナップショットだけを保存する。
/// `flush` または drop 時に保留中のスナップショットを即座に書き出す。
///
/// タイマーは tokio ランタイム上でのみ動く。ランタイム外で `schedule` した場合は
/// その場で保存する。タイマー経由の保存はブロッキングスレッドで行う。
pub struct DebouncedSaver {
    store: Arc<dyn DraftStore>,
    key: DraftKey,
    delay: Duration,
    pending: Arc<Mutex<Option<DraftRecord>>>,
    /// 書き込みの直列化用。取得順は常に io → pending
    io: Arc<Mutex<()>>,
    timer: Option<JoinHandle<()>>,
}

/// 保留中のスナップショットを取り出して保存
fn persist(
    store: &dyn DraftStore,
    key: &DraftKey,
    pending: &Mutex<Option<DraftRecord>>,
    io: &Mutex<()>,
) {
    let _io = match io.lock() {
        Ok(guard) => guard,
        Err(e) => {
            warn!("下書きの保存に失敗: {}", e);
            return;
        }
    };
    let record = match pending.lock() {
        Ok(mut pending) => pending.take(),
        Err(e) => {
            warn!("下書きの保存に失敗: {}", e);
            return;
        }
    };
    if let Some(record) = record {
        store.save(key, &record);
    }
}

impl DebouncedSaver {
    pub fn new(store: Arc<dyn DraftStore>, key: DraftKey, delay: Duration) -> Self {
        Self {
            store,
            key,
            delay,
            pending: Arc::new(Mutex::new(None)),
            io: Arc::new(Mutex::new(())),
            timer: None,
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn schedule(&mut self, record: DraftRecord) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        match self.pending.lock() {
            Ok(mut pending) => *pending = Some(record),
            Err(e) => {
                warn!("下書きの予約に失敗: {}", e);
                return;
            }
        }

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("ランタイム外のため下書きを即時保存: {}", self.key.storage_key());
                persist(self.store.as_ref(), &self.key, &self.pending, &self.io);
                return;
            }
        };

        let pending = Arc::clone(&self.pending);
        let io = Arc::clone(&self.io);
        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let delay = self.delay;

        self.timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let saved = tokio::task::spawn_blocking(move || {
                persist(store.as_ref(), &key, &pending, &io);
            })
            .await;
            if let Err(e) = saved {
                warn!("下書きの保存タスクが失敗: {}", e);
            }
        }));
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().map(|p| p.is_some()).unwrap_or(false)
    }

    /// 保留中のスナップショットを即座に保存
    pub fn flush(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        persist(self.store.as_ref(), &self.key, &self.pending, &self.io);
    }

    /// 保留中のスナップショットを保存せずに破棄
    ///
    /// 実行中の書き込みがあれば終わるまで待つので、戻った後の `clear` が
    /// 遅れて届いた保存に上書きされることはない。
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let _io = match self.io.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("下書きの破棄に失敗: {}", e);
                return;
            }
        };
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
    }
}

impl Drop for DebouncedSaver {
    fn drop(&mut self) {
        self.flush();
    }
}
