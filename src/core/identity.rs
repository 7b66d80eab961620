//! 身份管理
//!
//! 为可发布的笔记分配稳定的 8 位 `guid`，并为所有笔记补全 `created`。
//! 函数本身不写文件，只返回 [`FrontmatterDelta`]。

use chrono::{DateTime, Local, Utc};

use crate::core::note::{FrontmatterDelta, Note};

/// guid 长度
pub const GUID_LEN: usize = 8;

/// `created` 字段格式，例如 `Jan 5, 2024 3:04 PM`
pub const CREATED_FORMAT: &str = "%b %-d, %Y %-I:%M %p";

/// 生成新的短 guid
///
/// 取随机 UUID 的 base58 编码末 8 位
///
/// 首位只覆盖部分字母表，低位则接近均匀分布
pub fn generate_guid() -> String {
    let encoded = bs58::encode(uuid::Uuid::new_v4().as_bytes()).into_string();
    let start = encoded.len().saturating_sub(GUID_LEN);
    encoded[start..].to_string()
}

/// 格式化创建时间（本地时区）
pub fn format_created(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(CREATED_FORMAT).to_string()
}

/// 计算笔记需要补全的身份字段
///
/// - `created` 缺失时总是补全（与 publish 无关）
/// - `guid` 只在 `publish: true` 且缺失时分配
///
/// 已有字段不会被改写，因此对同一笔记重复调用在落盘后返回空变更
pub fn ensure_identity(note: &Note) -> FrontmatterDelta {
    let mut delta = FrontmatterDelta::default();

    if note.frontmatter.created().is_none() {
        delta.created = Some(format_created(note.created));
    }

    if note.frontmatter.publish() && note.frontmatter.guid().is_none() {
        delta.guid = Some(generate_guid());
    }

    delta
}
