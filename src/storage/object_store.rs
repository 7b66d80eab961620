//! 对象存储
//!
//! 发布引擎只依赖两个操作：分页列举 (`list_page`) 和覆盖写入 (`put`)。
//!
//! - [`DirectoryStore`] - 以目录作为 bucket（例如挂载的云存储）
//! - [`MemoryStore`] - 内存实现，记录每次写入，用于测试

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::fs::to_utc;

/// 列举结果中的单个对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// 一页列举结果
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    /// 还有更多页时返回继续标记
    pub next: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 列举一页对象，`continuation` 为上一页返回的标记
    async fn list_page(&self, continuation: Option<String>) -> Result<ListPage>;

    /// 写入对象，已存在时覆盖
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;
}

/// 检查对象键是否为扁平文件名
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
    {
        anyhow::bail!("Invalid object key: {:?}", key);
    }
    Ok(())
}

/// 按键排序后的分页切片，继续标记语义为 start-after
fn paginate(mut entries: Vec<ObjectEntry>, continuation: Option<&str>, page_size: usize) -> ListPage {
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    let remaining: Vec<ObjectEntry> = match continuation {
        Some(after) => entries.into_iter().filter(|e| e.key.as_str() > after).collect(),
        None => entries,
    };

    let has_more = remaining.len() > page_size;
    let entries: Vec<ObjectEntry> = remaining.into_iter().take(page_size).collect();
    let next = if has_more {
        entries.last().map(|e| e.key.clone())
    } else {
        None
    };

    ListPage { entries, next }
}

/// 目录对象存储
///
/// 键即文件名，`last_modified` 取文件 mtime
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    page_size: usize,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            root: root.into(),
            page_size: page_size.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for DirectoryStore {
    async fn list_page(&self, continuation: Option<String>) -> Result<ListPage> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            // 尚未写入过的 bucket 视为空
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ListPage::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to list object store at {:?}", self.root))
            }
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let key = entry.file_name().to_string_lossy().into_owned();
            // 跳过隐藏文件和写入中的临时文件
            if key.starts_with('.') {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            entries.push(ObjectEntry {
                key,
                last_modified: to_utc(meta.modified()?),
            });
        }

        Ok(paginate(entries, continuation.as_deref(), self.page_size))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create object store at {:?}", self.root))?;

        let target = self.root.join(key);
        let tmp = self.root.join(format!(".{}.tmp", key));
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("Failed to write object {}", key))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .with_context(|| format!("Failed to commit object {}", key))?;
        Ok(())
    }
}

/// 内存对象存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (DateTime<Utc>, Vec<u8>)>>,
    puts: Mutex<Vec<String>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            puts: Mutex::new(Vec::new()),
            page_size: page_size.max(1),
        }
    }

    /// 预置一个对象（不记录为 put）
    pub fn insert(&self, key: &str, last_modified: DateTime<Utc>, body: &[u8]) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.to_string(), (last_modified, body.to_vec()));
        }
    }

    /// 按调用顺序返回所有 put 的键
    pub fn put_keys(&self) -> Vec<String> {
        self.puts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(key).map(|(_, body)| body.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, continuation: Option<String>) -> Result<ListPage> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Object store lock poisoned"))?;
        let entries = objects
            .iter()
            .map(|(key, (last_modified, _))| ObjectEntry {
                key: key.clone(),
                last_modified: *last_modified,
            })
            .collect();
        Ok(paginate(entries, continuation.as_deref(), self.page_size))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| anyhow::anyhow!("Object store lock poisoned"))?;
        objects.insert(key.to_string(), (Utc::now(), body));
        drop(objects);

        if let Ok(mut puts) = self.puts.lock() {
            puts.push(key.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_directory_store_put_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp_dir.path().join("bucket"), 1000);

        store.put("abc12345.md", b"# note".to_vec()).await.unwrap();
        store.put("diagram.png", vec![1, 2, 3]).await.unwrap();

        let page = store.list_page(None).await.unwrap();
        let keys: Vec<_> = page.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["abc12345.md", "diagram.png"]);
        assert!(page.next.is_none());
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("bucket/abc12345.md")).unwrap(),
            "# note"
        );
    }

    #[tokio::test]
    async fn test_directory_store_paginates() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp_dir.path(), 2);
        for key in ["a.md", "b.md", "c.md"] {
            store.put(key, Vec::new()).await.unwrap();
        }

        let first = store.list_page(None).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.next.as_deref(), Some("b.md"));

        let second = store.list_page(first.next).await.unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].key, "c.md");
        assert!(second.next.is_none());
    }

    #[tokio::test]
    async fn test_directory_store_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp_dir.path().join("not_created"), 10);
        let page = store.list_page(None).await.unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_nested_key() {
        let store = MemoryStore::new();
        assert!(store.put("../escape.md", Vec::new()).await.is_err());
        assert!(store.put("dir/file.md", Vec::new()).await.is_err());
        assert!(store.put_keys().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_records_puts() {
        let store = MemoryStore::new();
        store.insert("seed.md", Utc::now(), b"seed");
        store.put("x.md", b"x".to_vec()).await.unwrap();

        assert_eq!(store.put_keys(), vec!["x.md".to_string()]);
        assert_eq!(store.get("x.md"), Some(b"x".to_vec()));
        assert_eq!(store.list_page(None).await.unwrap().entries.len(), 2);
    }
}
