//! Markdown 解析
//!
//! - [`frontmatter`] - YAML 头部
//! - [`wiki_link`] - `![[..]]` 嵌入与 `[[..]]` 链接

pub mod frontmatter;
pub mod wiki_link;

pub use frontmatter::{render_document, split_frontmatter, strip_frontmatter, Frontmatter};
pub use wiki_link::{parse_embeds, parse_wiki_links, EmbedKind, WikiRef};
