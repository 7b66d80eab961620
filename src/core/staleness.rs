//! 过期判定
//!
//! 每次运行只列举一次对象存储，得到 [`RemoteIndex`] 快照；
//! 之后每篇笔记都与这份快照比较修改时间。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::core::note::{object_key, Note};
use crate::storage::ObjectStore;

/// 对象存储快照：`key -> last_modified`
///
/// 构建后只读，运行期间不会重新查询
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    objects: HashMap<String, DateTime<Utc>>,
}

impl RemoteIndex {
    /// 逐页列举直到没有继续标记
    ///
    /// 任意一页失败都直接返回错误，不会产生不完整的快照
    pub async fn build(store: &dyn ObjectStore) -> Result<Self> {
        let mut index = Self::default();
        let mut continuation = None;
        let mut pages = 0usize;

        loop {
            let page = store
                .list_page(continuation.take())
                .await
                .with_context(|| format!("Failed to list remote objects (page {})", pages + 1))?;
            pages += 1;

            for entry in page.entries {
                // 重复键以后出现的为准
                index.objects.insert(entry.key, entry.last_modified);
            }

            match page.next {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        debug!("Remote index built: {} object(s) in {} page(s)", index.len(), pages);
        Ok(index)
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, DateTime<Utc>)>,
    {
        Self {
            objects: entries.into_iter().collect(),
        }
    }

    pub fn last_modified(&self, key: &str) -> Option<DateTime<Utc>> {
        self.objects.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// 按键排序的条目
    pub fn entries(&self) -> Vec<(&str, DateTime<Utc>)> {
        let mut entries: Vec<_> = self
            .objects
            .iter()
            .map(|(key, time)| (key.as_str(), *time))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 没有 `publish: true`
    NotPublished,
    /// 远端对象不比本地旧
    UpToDate,
}

/// 判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Stale,
    Skip(SkipReason),
}

/// 判定笔记是否需要发布
///
/// 必须在身份分配之后调用，否则没有 guid 可查
pub fn check(note: &Note, index: &RemoteIndex) -> Staleness {
    if !note.frontmatter.publish() {
        return Staleness::Skip(SkipReason::NotPublished);
    }

    let Some(guid) = note.frontmatter.guid() else {
        // 可发布但没有身份：视为从未发布
        return Staleness::Stale;
    };

    match index.last_modified(&object_key(&guid)) {
        None => Staleness::Stale,
        Some(remote) if note.modified > remote => Staleness::Stale,
        Some(_) => Staleness::Skip(SkipReason::UpToDate),
    }
}

pub fn needs_publish(note: &Note, index: &RemoteIndex) -> bool {
    check(note, index) == Staleness::Stale
}
