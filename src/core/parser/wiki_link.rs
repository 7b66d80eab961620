//! Wiki 链接解析模块
//!
//! 识别两种 Obsidian 风格的引用：
//!
//! ```markdown
//! ![[名称]]            # 嵌入：图片或另一篇笔记
//! ![[图片.png|300]]    # 带尺寸的图片嵌入，尺寸被忽略
//! [[目标]]             # 链接
//! [[目标|显示文本]]     # 带别名的链接
//! ```

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// 识别为图片的扩展名
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

static REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();

/// 同时匹配嵌入与链接，第一个捕获组为 `!` 前缀
fn reference_regex() -> &'static Regex {
    REFERENCE_REGEX.get_or_init(|| Regex::new(r"(!?)\[\[([^\[\]\n]+)\]\]").unwrap())
}

/// 嵌入类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedKind {
    /// 图片，上传而不内联
    Image(String),
    /// 笔记，内容被拼接到嵌入位置
    Note(String),
}

impl EmbedKind {
    /// 按扩展名分类嵌入名称
    pub fn classify(name: &str) -> Self {
        if is_image_name(name) {
            EmbedKind::Image(name.to_string())
        } else {
            EmbedKind::Note(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EmbedKind::Image(name) | EmbedKind::Note(name) => name,
        }
    }
}

/// 文件名是否以已知图片扩展名结尾（不区分大小写）
pub fn is_image_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// 去掉目录前缀的文件名，`assets/pic.png` -> `pic.png`
pub fn image_basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// 文本中的一个引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiRef {
    /// 是否为 `![[..]]` 嵌入
    pub embed: bool,
    /// 目标名称（`|` 之前的部分）
    pub target: String,
    /// `|` 之后的部分
    pub alias: Option<String>,
}

impl WikiRef {
    fn from_captures(cap: &Captures<'_>) -> Option<Self> {
        let embed = cap.get(1).is_some_and(|m| !m.as_str().is_empty());
        let inner = cap.get(2)?.as_str();

        let (target, alias) = match inner.split_once('|') {
            Some((target, alias)) => (target, Some(alias.trim().to_string())),
            None => (inner, None),
        };
        let target = target.trim();
        if target.is_empty() {
            return None;
        }

        Some(Self {
            embed,
            target: target.to_string(),
            alias: alias.filter(|a| !a.is_empty()),
        })
    }

    /// 链接显示文本
    pub fn display(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.target)
    }
}

/// 解析出所有 `![[..]]` 嵌入
pub fn parse_embeds(content: &str) -> Vec<EmbedKind> {
    reference_regex()
        .captures_iter(content)
        .filter_map(|cap| WikiRef::from_captures(&cap))
        .filter(|r| r.embed)
        .map(|r| EmbedKind::classify(&r.target))
        .collect()
}

/// 解析出所有 `[[..]]` 链接（不含嵌入）
pub fn parse_wiki_links(content: &str) -> Vec<WikiRef> {
    reference_regex()
        .captures_iter(content)
        .filter_map(|cap| WikiRef::from_captures(&cap))
        .filter(|r| !r.embed)
        .collect()
}

/// 逐个替换引用
///
/// 回调返回 `None` 时保留原文
pub fn replace_refs<F>(content: &str, mut replace: F) -> String
where
    F: FnMut(&WikiRef) -> Option<String>,
{
    reference_regex()
        .replace_all(content, |cap: &Captures<'_>| {
            let original = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
            WikiRef::from_captures(cap)
                .and_then(|r| replace(&r))
                .unwrap_or_else(|| original.to_string())
        })
        .into_owned()
}

/// 把图片嵌入渲染为 Markdown 图片 `![名称](链接)`
///
/// 回调根据图片名给出链接，返回 `None` 的图片与笔记嵌入保持原样
pub fn render_image_embeds<F>(content: &str, mut link_for: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    replace_refs(content, |r| {
        if !r.embed || !is_image_name(&r.target) {
            return None;
        }
        link_for(&r.target).map(|link| format!("![{}]({})", image_basename(&r.target), link))
    })
}

/// 目标看起来像绝对 URL（`http...` 或带 scheme）
pub fn is_url_like(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http") {
        return true;
    }
    match lower.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
        }
        None => false,
    }
}

/// 对路径进行 percent 编码，保留 URI 保留字符（含 `/`）
pub fn encode_uri(s: &str) -> String {
    percent_encode(s, "-_.~!*'();/?:@&=+$,#")
}

/// 对单个路径组件进行 percent 编码
pub fn encode_uri_component(s: &str) -> String {
    percent_encode(s, "-_.~!*'()")
}

fn percent_encode(s: &str, safe: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() || safe.contains(c) {
            result.push(c);
        } else {
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf);
            for byte in encoded.as_bytes() {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_image_vs_note() {
        assert_eq!(
            EmbedKind::classify("diagram.png"),
            EmbedKind::Image("diagram.png".to_string())
        );
        assert_eq!(
            EmbedKind::classify("Photo.JPEG"),
            EmbedKind::Image("Photo.JPEG".to_string())
        );
        assert_eq!(
            EmbedKind::classify("Glossary"),
            EmbedKind::Note("Glossary".to_string())
        );
        // 非图片扩展名按笔记处理
        assert_eq!(
            EmbedKind::classify("report.pdf"),
            EmbedKind::Note("report.pdf".to_string())
        );
    }

    #[test]
    fn test_parse_embeds() {
        let content = "见 ![[diagram.png]] 与 ![[Glossary]]，以及 [[Other]]";
        let embeds = parse_embeds(content);
        assert_eq!(
            embeds,
            vec![
                EmbedKind::Image("diagram.png".to_string()),
                EmbedKind::Note("Glossary".to_string()),
            ]
        );
    }

    #[test]
    fn test_image_size_hint_is_dropped() {
        let embeds = parse_embeds("![[photo.png|300]]");
        assert_eq!(embeds, vec![EmbedKind::Image("photo.png".to_string())]);
    }

    #[test]
    fn test_parse_wiki_links_skips_embeds() {
        let links = parse_wiki_links("[[目标1]] ![[嵌入]] [[目标2|显示]]");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, "目标1");
        assert_eq!(links[0].display(), "目标1");
        assert_eq!(links[1].target, "目标2");
        assert_eq!(links[1].display(), "显示");
    }

    #[test]
    fn test_replace_refs_keeps_unmatched() {
        let out = replace_refs("a [[x]] b [[y]]", |r| {
            (r.target == "x").then(|| "X".to_string())
        });
        assert_eq!(out, "a X b [[y]]");
    }

    #[test]
    fn test_render_image_embeds() {
        let out = render_image_embeds("![[my pic.png|300]] ![[Glossary]] ![[b.gif]]", |name| {
            (name != "b.gif").then(|| encode_uri(name))
        });
        assert_eq!(out, "![my pic.png](my%20pic.png) ![[Glossary]] ![[b.gif]]");
    }

    #[test]
    fn test_image_basename() {
        assert_eq!(image_basename("pic.png"), "pic.png");
        assert_eq!(image_basename("assets/2024/pic.png"), "pic.png");

        let out = render_image_embeds("![[assets/pic.png]]", |name| {
            Some(encode_uri(image_basename(name)))
        });
        assert_eq!(out, "![pic.png](pic.png)");
    }

    #[test]
    fn test_is_url_like() {
        assert!(is_url_like("http://example.com"));
        assert!(is_url_like("HTTPS://example.com"));
        assert!(is_url_like("ftp://host/file"));
        assert!(!is_url_like("Some Note"));
        assert!(!is_url_like("a note about ://"));
    }

    #[test]
    fn test_encode_uri() {
        assert_eq!(encode_uri("../c/Target.md"), "../c/Target.md");
        assert_eq!(encode_uri("My Notes/笔记.md"), "My%20Notes/%E7%AC%94%E8%AE%B0.md");
        assert_eq!(encode_uri_component("a/b c"), "a%2Fb%20c");
    }
}
