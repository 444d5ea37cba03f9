//! 点検項目ごとの写真添付
//!
//! 添付した写真ごとにプレビューURLを発行し、写真を外したとき・
//! リストを破棄したときに必ず失効させる。
//! 画像バイナリはアップロード時にパスから読み込み、下書きには保存しない。

use crate::error::{ImpsError, Result};
use crate::scanner;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 添付する写真ファイル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub mime: String,
    /// SHA-256（16進）。下書きからの再添付時の照合に使う
    pub sha256: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// EXIF 撮影日時
    pub taken_at: Option<String>,
}

impl PhotoFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ImpsError::FileNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let (width, height) = match image::image_dimensions(path) {
            Ok((w, h)) => (Some(w), Some(h)),
            Err(e) => {
                debug!("画像サイズを取得できません ({}): {}", file_name, e);
                (None, None)
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            mime: mime_for(path).to_string(),
            size: bytes.len() as u64,
            sha256,
            width,
            height,
            taken_at: scanner::exif::extract_date(path).ok(),
            file_name,
        })
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            ImpsError::ImageLoad(format!("{}: {}", self.path.display(), e))
        })
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// 下書きに残す写真情報（バイナリを含まない）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoMeta {
    pub file_name: String,
    pub path: String,
    pub size: u64,
    pub sha256: String,
    pub remark: String,
}

impl PhotoMeta {
    /// 元のファイルが同じ内容のまま残っていれば再添付する
    pub fn reattach(&self) -> Option<PhotoFile> {
        let file = PhotoFile::from_path(Path::new(&self.path)).ok()?;
        (file.sha256 == self.sha256).then_some(file)
    }
}

/// プレビューURL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PreviewUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// プレビューURLの発行・失効
pub trait PreviewRegistry: Send + Sync {
    fn create(&self, file: &PhotoFile) -> PreviewUrl;
    fn revoke(&self, url: &PreviewUrl);
}

/// 連番のオブジェクトURLを発行するレジストリ
///
/// 発行済みURLは再利用しない。失効履歴を保持する。
#[derive(Debug, Default)]
pub struct ObjectUrls {
    next: AtomicU64,
    live: Mutex<HashSet<PreviewUrl>>,
    revoked: Mutex<Vec<PreviewUrl>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_live(&self, url: &PreviewUrl) -> bool {
        self.live.lock().map(|l| l.contains(url)).unwrap_or(false)
    }

    /// 失効した URL（失効順）
    pub fn revoked(&self) -> Vec<PreviewUrl> {
        self.revoked.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl PreviewRegistry for ObjectUrls {
    fn create(&self, file: &PhotoFile) -> PreviewUrl {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let url = PreviewUrl(format!("blob:imps/{}/{}", n, file.sha256.get(..12).unwrap_or("")));
        if let Ok(mut live) = self.live.lock() {
            live.insert(url.clone());
        }
        url
    }

    fn revoke(&self, url: &PreviewUrl) {
        let was_live = self.live.lock().map(|mut l| l.remove(url)).unwrap_or(false);
        if !was_live {
            warn!("発行されていないプレビューURLの失効: {}", url);
            return;
        }
        if let Ok(mut revoked) = self.revoked.lock() {
            revoked.push(url.clone());
        }
    }
}

/// 添付中の写真1枚
#[derive(Debug)]
pub struct PhotoItem {
    pub file: PhotoFile,
    pub preview: PreviewUrl,
    pub remark: String,
}

/// 1点検項目分の写真リスト
///
/// 上限を超えた分は黙って捨てる。drop 時に残りのプレビューURLをすべて失効させる。
pub struct PhotoAttachmentList {
    item_key: String,
    max: usize,
    items: Vec<PhotoItem>,
    previews: Arc<dyn PreviewRegistry>,
}

impl PhotoAttachmentList {
    pub fn new(item_key: impl Into<String>, max: usize, previews: Arc<dyn PreviewRegistry>) -> Self {
        Self {
            item_key: item_key.into(),
            max,
            items: Vec::new(),
            previews,
        }
    }

    pub fn item_key(&self) -> &str {
        &self.item_key
    }

    pub fn items(&self) -> &[PhotoItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.max.saturating_sub(self.items.len())
    }

    /// 写真を追加し、受け付けた枚数を返す
    pub fn add(&mut self, files: Vec<PhotoFile>) -> usize {
        let accepted: Vec<PhotoFile> = files.into_iter().take(self.remaining()).collect();
        let count = accepted.len();

        for file in accepted {
            let preview = self.previews.create(&file);
            self.items.push(PhotoItem {
                file,
                preview,
                remark: String::new(),
            });
        }
        count
    }

    /// 写真を外す。プレビューURLは参照を捨てる前に失効させる
    pub fn remove(&mut self, index: usize) -> Option<PhotoFile> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.previews.revoke(&item.preview);
        Some(item.file)
    }

    pub fn set_remark(&mut self, index: usize, remark: &str) -> bool {
        match self.items.get_mut(index) {
            Some(item) => {
                item.remark = remark.to_string();
                true
            }
            None => false,
        }
    }

    pub fn files(&self) -> Vec<PhotoFile> {
        self.items.iter().map(|i| i.file.clone()).collect()
    }

    pub fn metas(&self) -> Vec<PhotoMeta> {
        self.items
            .iter()
            .map(|i| PhotoMeta {
                file_name: i.file.file_name.clone(),
                path: i.file.path.display().to_string(),
                size: i.file.size,
                sha256: i.file.sha256.clone(),
                remark: i.remark.clone(),
            })
            .collect()
    }
}

impl Drop for PhotoAttachmentList {
    fn drop(&mut self) {
        for item in self.items.drain(..) {
            self.previews.revoke(&item.preview);
        }
    }
}

/// フォーム全体の写真（点検項目キー → 写真リスト）
pub struct PhotoBoard {
    max_per_item: usize,
    lists: BTreeMap<String, PhotoAttachmentList>,
    previews: Arc<dyn PreviewRegistry>,
}

impl PhotoBoard {
    pub fn new(max_per_item: usize, previews: Arc<dyn PreviewRegistry>) -> Self {
        Self {
            max_per_item,
            lists: BTreeMap::new(),
            previews,
        }
    }

    pub fn attach(&mut self, item_key: &str, files: Vec<PhotoFile>) -> usize {
        let max = self.max_per_item;
        let previews = Arc::clone(&self.previews);
        self.lists
            .entry(item_key.to_string())
            .or_insert_with(|| PhotoAttachmentList::new(item_key, max, previews))
            .add(files)
    }

    pub fn remove(&mut self, item_key: &str, index: usize) -> Option<PhotoFile> {
        self.lists.get_mut(item_key)?.remove(index)
    }

    pub fn set_remark(&mut self, item_key: &str, index: usize, remark: &str) -> bool {
        self.lists
            .get_mut(item_key)
            .map(|l| l.set_remark(index, remark))
            .unwrap_or(false)
    }

    pub fn list(&self, item_key: &str) -> Option<&PhotoAttachmentList> {
        self.lists.get(item_key)
    }

    pub fn count(&self, item_key: &str) -> usize {
        self.lists.get(item_key).map(|l| l.len()).unwrap_or(0)
    }

    /// 写真が1枚以上ある項目（キー順）
    pub fn non_empty(&self) -> impl Iterator<Item = &PhotoAttachmentList> {
        self.lists.values().filter(|l| !l.is_empty())
    }

    pub fn metas(&self) -> BTreeMap<String, Vec<PhotoMeta>> {
        self.non_empty()
            .map(|l| (l.item_key().to_string(), l.metas()))
            .collect()
    }

    /// 下書きの写真情報から再添付し、再添付できなかった写真のファイル名を返す
    pub fn restore(&mut self, saved: &BTreeMap<String, Vec<PhotoMeta>>) -> Vec<String> {
        let mut lost = Vec::new();
        for (key, metas) in saved {
            for meta in metas {
                match meta.reattach() {
                    Some(file) => {
                        if self.attach(key, vec![file]) == 1 && !meta.remark.is_empty() {
                            let index = self.count(key) - 1;
                            self.set_remark(key, index, &meta.remark);
                        }
                    }
                    None => lost.push(meta.file_name.clone()),
                }
            }
        }
        lost
    }
}
