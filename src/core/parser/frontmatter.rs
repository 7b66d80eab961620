//! YAML Frontmatter 解析模块
//!
//! 解析并回写 Markdown 文件头部的 YAML 元数据。
//! 字段顺序保持不变，未知字段原样保留。
//!
//! ## Frontmatter 格式
//!
//! ```yaml
//! ---
//! publish: true
//! guid: 4kT9qXbZ
//! created: Jan 5, 2024 3:04 PM
//! gitURL: https://example.com/notes/topics/Note.md
//! links:
//!   - img: diagram.png
//! ---
//! ```

use anyhow::{anyhow, Result};
use yaml_rust2::yaml::Hash;
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader};

pub const KEY_PUBLISH: &str = "publish";
pub const KEY_GUID: &str = "guid";
pub const KEY_CREATED: &str = "created";
pub const KEY_GIT_URL: &str = "gitURL";
pub const KEY_LINKS: &str = "links";

/// Frontmatter 结构
///
/// 有序的键值映射
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    fields: Hash,
}

impl Frontmatter {
    /// 创建空的 Frontmatter
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析 YAML 文本
    ///
    /// 空文本得到空映射；顶层不是映射时返回错误
    pub fn parse(yaml: &str) -> Result<Self> {
        let docs = YamlLoader::load_from_str(yaml)
            .map_err(|e| anyhow!("Invalid front matter YAML: {}", e))?;

        match docs.into_iter().next() {
            None | Some(Yaml::Null) => Ok(Self::new()),
            Some(Yaml::Hash(fields)) => Ok(Self { fields }),
            Some(other) => Err(anyhow!("Front matter is not a mapping: {:?}", other)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `publish: true` 才参与发布
    pub fn publish(&self) -> bool {
        self.get(KEY_PUBLISH).and_then(Yaml::as_bool).unwrap_or(false)
    }

    pub fn guid(&self) -> Option<String> {
        self.get_scalar(KEY_GUID)
    }

    pub fn created(&self) -> Option<String> {
        self.get_scalar(KEY_CREATED)
    }

    /// 是否声明了 `gitURL` 字段（值可以为空）
    pub fn has_git_url(&self) -> bool {
        self.get(KEY_GIT_URL).is_some()
    }

    pub fn git_url(&self) -> Option<String> {
        self.get_scalar(KEY_GIT_URL)
    }

    /// `links` 序列中的 `img` 条目
    pub fn image_links(&self) -> Vec<String> {
        let Some(links) = self.get(KEY_LINKS).and_then(Yaml::as_vec) else {
            return Vec::new();
        };

        links
            .iter()
            .filter_map(|link| link.as_hash())
            .filter_map(|link| link.get(&Yaml::String("img".to_string())))
            .filter_map(scalar_to_string)
            .collect()
    }

    /// 读取标量字段，`null` 与空字符串视为缺失
    pub fn get_scalar(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(scalar_to_string)
            .filter(|s| !s.is_empty())
    }

    fn get(&self, key: &str) -> Option<&Yaml> {
        self.fields.get(&Yaml::String(key.to_string()))
    }

    /// 设置字符串字段
    ///
    /// 已有字段原地替换，保持顺序；新字段追加到末尾
    pub fn set_str(&mut self, key: &str, value: &str) {
        let key = Yaml::String(key.to_string());
        let value = Yaml::String(value.to_string());
        match self.fields.get_mut(&key) {
            Some(slot) => *slot = value,
            None => {
                self.fields.insert(key, value);
            }
        }
    }

    /// 转换为 YAML 字符串（不含 `---` 分隔线）
    pub fn to_yaml(&self) -> Result<String> {
        if self.fields.is_empty() {
            return Ok(String::new());
        }

        let doc = Yaml::Hash(self.fields.clone());
        let mut out = String::new();
        YamlEmitter::new(&mut out)
            .dump(&doc)
            .map_err(|e| anyhow!("Failed to emit front matter: {:?}", e))?;

        let yaml = out
            .strip_prefix("---")
            .map(|s| s.trim_start_matches('\n'))
            .unwrap_or(&out);
        Ok(yaml.to_string())
    }
}

fn scalar_to_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) | Yaml::Real(s) => Some(s.clone()),
        Yaml::Integer(i) => Some(i.to_string()),
        Yaml::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// 检查内容是否有 frontmatter
pub fn has_frontmatter(content: &str) -> bool {
    split_frontmatter(content).0.is_some()
}

/// 拆分 frontmatter 与正文
///
/// # Returns
///
/// (frontmatter_yaml, body)；没有合法的 frontmatter 时返回 (None, content)
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---") else {
        return (None, content);
    };
    let Some(rest) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }

    (None, content)
}

/// 从内容中移除 frontmatter，只返回正文
pub fn strip_frontmatter(content: &str) -> &str {
    split_frontmatter(content).1
}

/// 把 frontmatter 与正文拼回完整文件内容
pub fn render_document(frontmatter: &Frontmatter, body: &str) -> Result<String> {
    if frontmatter.is_empty() {
        return Ok(body.to_string());
    }
    Ok(format!("---\n{}\n---\n{}", frontmatter.to_yaml()?, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frontmatter_basic() {
        let content = r#"---
publish: true
guid: abcd1234
created: Jan 5, 2024 3:04 PM
links:
  - img: diagram.png
  - img: chart.gif
---

# 笔记

正文"#;

        let (yaml, body) = split_frontmatter(content);
        let fm = Frontmatter::parse(yaml.unwrap()).unwrap();
        assert!(fm.publish());
        assert_eq!(fm.guid(), Some("abcd1234".to_string()));
        assert_eq!(fm.created(), Some("Jan 5, 2024 3:04 PM".to_string()));
        assert_eq!(fm.image_links(), vec!["diagram.png", "chart.gif"]);
        assert!(!fm.has_git_url());
        assert_eq!(body.trim(), "# 笔记\n\n正文");
    }

    #[test]
    fn test_publish_defaults_to_false() {
        let fm = Frontmatter::parse("title: x").unwrap();
        assert!(!fm.publish());

        let fm = Frontmatter::parse("publish: \"true\"").unwrap();
        assert!(!fm.publish()); // 只有布尔值 true 才算
    }

    #[test]
    fn test_null_fields_are_absent() {
        let fm = Frontmatter::parse("guid:\ngitURL:\n").unwrap();
        assert!(fm.guid().is_none());
        // gitURL 字段存在但为空
        assert!(fm.has_git_url());
        assert!(fm.git_url().is_none());
    }

    #[test]
    fn test_numeric_guid_reads_as_string() {
        let fm = Frontmatter::parse("guid: 12345678").unwrap();
        assert_eq!(fm.guid(), Some("12345678".to_string()));
    }

    #[test]
    fn test_no_frontmatter() {
        let content = "# 标题\n\n内容";
        assert!(!has_frontmatter(content));
        assert_eq!(split_frontmatter(content), (None, content));
    }

    #[test]
    fn test_unterminated_frontmatter_is_body() {
        let content = "---\npublish: true\n没有结束";
        assert_eq!(split_frontmatter(content), (None, content));
    }

    #[test]
    fn test_empty_frontmatter() {
        let (yaml, body) = split_frontmatter("---\n---\nbody");
        assert_eq!(yaml, Some(""));
        assert_eq!(body, "body");
        assert!(Frontmatter::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_set_str_keeps_order_and_unknown_keys() {
        let mut fm = Frontmatter::parse("title: 标题\nguid: old\naliases: [a, b]").unwrap();
        fm.set_str(KEY_GUID, "new12345");
        fm.set_str(KEY_CREATED, "Jan 1, 2024 9:00 AM");

        let yaml = fm.to_yaml().unwrap();
        let title = yaml.find("title").unwrap();
        let guid = yaml.find("guid").unwrap();
        let aliases = yaml.find("aliases").unwrap();
        let created = yaml.find("created").unwrap();
        assert!(title < guid && guid < aliases && aliases < created);
        assert!(yaml.contains("new12345"));
    }

    #[test]
    fn test_render_document_round_trip() {
        let mut fm = Frontmatter::new();
        fm.set_str(KEY_GUID, "abcd1234");
        let rendered = render_document(&fm, "正文\n").unwrap();

        assert!(rendered.starts_with("---\n"));
        let (yaml, body) = split_frontmatter(&rendered);
        assert_eq!(body, "正文\n");
        assert_eq!(Frontmatter::parse(yaml.unwrap()).unwrap(), fm);
    }

    #[test]
    fn test_strip_frontmatter() {
        let content = "---\npublish: true\n---\ninner text";
        assert_eq!(strip_frontmatter(content), "inner text");
    }
}
