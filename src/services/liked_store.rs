//! 收藏持久化 - 业务能力层
//!
//! 收藏集合是 记录 ID → 收藏时的记录快照 的映射。
//! 启动时加载一次（失败只记日志并使用空集合），每次变更后整体重写。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::{AppError, AppResult};
use crate::models::image_record::ImageRecord;

/// 一条收藏：收藏时刻的记录快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikedEntry {
    pub liked_at: DateTime<Utc>,
    pub record: ImageRecord,
}

pub type LikedMap = BTreeMap<String, LikedEntry>;

/// 键值存储接口（整块读、整块写）
pub trait LikedStore {
    fn load(&self) -> AppResult<LikedMap>;
    fn save(&self, liked: &LikedMap) -> AppResult<()>;
}

/// JSON 文件存储
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LikedStore for JsonFileStore {
    fn load(&self) -> AppResult<LikedMap> {
        if !self.path.exists() {
            return Ok(LikedMap::new());
        }

        let path = self.path.display().to_string();
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| AppError::file_read_failed(path.clone(), e))?;
        serde_json::from_str(&content).map_err(|e| AppError::json_parse_failed(path, e))
    }

    fn save(&self, liked: &LikedMap) -> AppResult<()> {
        let path = self.path.display().to_string();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::file_write_failed(path.clone(), e))?;
        }

        let content = serde_json::to_string(liked)?;
        std::fs::write(&self.path, content).map_err(|e| AppError::file_write_failed(path, e))
    }
}

/// 内存存储，不落盘
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<LikedMap>,
}

impl LikedStore for MemoryStore {
    fn load(&self) -> AppResult<LikedMap> {
        Ok(self.inner.lock().map(|m| m.clone()).unwrap_or_default())
    }

    fn save(&self, liked: &LikedMap) -> AppResult<()> {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = liked.clone();
        }
        Ok(())
    }
}

/// 收藏集合
pub struct LikedSet {
    entries: LikedMap,
    store: Box<dyn LikedStore>,
}

impl LikedSet {
    /// 从存储加载；读取或解析失败时记录日志并返回空集合
    pub fn load(store: Box<dyn LikedStore>) -> Self {
        let entries = match store.load() {
            Ok(entries) => {
                debug!("已加载 {} 条收藏", entries.len());
                entries
            }
            Err(e) => {
                warn!("加载收藏失败，使用空集合: {}", e);
                LikedMap::new()
            }
        };
        Self { entries, store }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&LikedEntry> {
        self.entries.get(id)
    }

    /// 收藏（已收藏时不做任何事）
    pub fn like(&mut self, record: &ImageRecord) {
        if self.contains(&record.id) {
            return;
        }
        self.entries.insert(
            record.id.clone(),
            LikedEntry {
                liked_at: Utc::now(),
                record: record.clone(),
            },
        );
        self.persist();
    }

    /// 取消收藏，返回之前是否已收藏
    pub fn unlike(&mut self, id: &str) -> bool {
        let removed = self.entries.remove(id).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    /// 切换收藏状态，返回切换后是否处于收藏状态
    pub fn toggle(&mut self, record: &ImageRecord) -> bool {
        if self.unlike(&record.id) {
            false
        } else {
            self.like(record);
            true
        }
    }

    /// 按收藏时间排序的快照
    pub fn records(&self) -> Vec<&ImageRecord> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| e.liked_at);
        entries.into_iter().map(|e| &e.record).collect()
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.entries) {
            error!("保存收藏失败: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::image_record::ImageData;

    fn record(title: &str) -> ImageRecord {
        ImageRecord::original(ImageData::new("image/png", vec![1u8, 2]), title)
    }

    #[test]
    fn test_like_twice_keeps_one_entry() {
        let mut liked = LikedSet::load(Box::new(MemoryStore::default()));
        let r = record("ring");

        liked.like(&r);
        liked.like(&r);
        assert_eq!(liked.len(), 1);

        assert!(liked.unlike(&r.id));
        assert!(liked.is_empty());
        assert!(!liked.unlike(&r.id));
    }

    #[test]
    fn test_toggle() {
        let mut liked = LikedSet::load(Box::new(MemoryStore::default()));
        let r = record("ring");
        assert!(liked.toggle(&r));
        assert!(liked.contains(&r.id));
        assert!(!liked.toggle(&r));
        assert!(!liked.contains(&r.id));
    }

    #[test]
    fn test_snapshot_does_not_track_mutation() {
        let mut liked = LikedSet::load(Box::new(MemoryStore::default()));
        let mut r = record("ring");
        liked.like(&r);

        r.title = "renamed".into();
        assert_eq!(liked.get(&r.id).unwrap().record.title, "ring");
    }

    #[test]
    fn test_json_store_round_trip_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("liked.json");
        let r = record("ring");

        {
            let mut liked = LikedSet::load(Box::new(JsonFileStore::new(&path)));
            liked.like(&r);
        }

        let reloaded = LikedSet::load(Box::new(JsonFileStore::new(&path)));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(&r.id).unwrap().record, r);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liked.json");
        std::fs::write(&path, "{not json").unwrap();

        let liked = LikedSet::load(Box::new(JsonFileStore::new(&path)));
        assert!(liked.is_empty());
    }
}
