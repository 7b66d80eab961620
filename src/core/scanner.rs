//! 笔记库扫描
//!
//! 遍历笔记库得到所有 Markdown 笔记，同时建立按名称查找的索引，
//! 供嵌入解析和链接改写使用。
//!
//! ## 查找规则
//!
//! - 笔记按文件名（去掉 `.md`）查找，名称可以带目录前缀 `folder/Note`
//! - 附件（图片等）按完整文件名查找，同样可以带目录前缀 `assets/pic.png`
//! - 同名多个匹配时取第一个（按路径排序），并输出警告

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// 笔记库索引
#[derive(Debug, Clone, Default)]
pub struct VaultIndex {
    /// 笔记库根目录
    root: PathBuf,
    /// 所有笔记路径（排序）
    notes: Vec<PathBuf>,
    /// 笔记名 -> 路径
    notes_by_name: HashMap<String, Vec<PathBuf>>,
    /// 文件名 -> 路径（所有文件）
    files_by_name: HashMap<String, Vec<PathBuf>>,
}

impl VaultIndex {
    /// 扫描笔记库
    ///
    /// 跳过隐藏文件与目录，以及 `exclude` 中的目录。
    /// 任何遍历错误都直接返回，不会得到不完整的索引。
    ///
    /// # Arguments
    ///
    /// * `root` - 笔记库根目录
    /// * `exclude` - 需要排除的目录（例如位于笔记库内的镜像目录）
    pub fn scan(root: &Path, exclude: &[PathBuf]) -> Result<Self> {
        let root = fs::canonicalize(root)
            .with_context(|| format!("Vault root not found: {:?}", root))?;
        let exclude: Vec<PathBuf> = exclude
            .iter()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
            .collect();

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() > 0 && is_hidden(entry.path()) {
                    return false;
                }
                !exclude.iter().any(|ex| entry.path().starts_with(ex))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to scan vault {:?}", root))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        Ok(Self::from_paths(root, files))
    }

    /// 从已知路径构建索引
    pub fn from_paths(root: impl Into<PathBuf>, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut index = Self {
            root: root.into(),
            ..Default::default()
        };

        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort();

        for path in paths {
            let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };

            if is_markdown(&path) {
                let name = strip_md_extension(&file_name).to_string();
                index.notes_by_name.entry(name).or_default().push(path.clone());
                index.notes.push(path.clone());
            }
            index.files_by_name.entry(file_name).or_default().push(path);
        }

        index
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 所有笔记路径
    pub fn notes(&self) -> &[PathBuf] {
        &self.notes
    }

    /// 按名称查找笔记
    pub fn find_note(&self, name: &str) -> Option<&Path> {
        let name = strip_md_extension(name.trim().trim_start_matches('/'));
        let (prefix, stem) = match name.rsplit_once('/') {
            Some((prefix, stem)) => (Some(prefix), stem),
            None => (None, name),
        };

        let candidates = self.notes_by_name.get(stem)?;
        let matches: Vec<&PathBuf> = match prefix {
            Some(_) => candidates
                .iter()
                .filter(|path| {
                    let rel = self.relative(path);
                    ends_with_segments(strip_md_extension(&rel), name)
                })
                .collect(),
            None => candidates.iter().collect(),
        };

        pick_first(name, matches)
    }

    /// 按文件名查找任意文件（图片等附件），名称可以带目录前缀
    pub fn find_file(&self, file_name: &str) -> Option<&Path> {
        let name = file_name.trim().trim_start_matches('/');
        let (prefix, base) = match name.rsplit_once('/') {
            Some((prefix, base)) => (Some(prefix), base),
            None => (None, name),
        };

        let candidates = self.files_by_name.get(base)?;
        let matches: Vec<&PathBuf> = match prefix {
            Some(_) => candidates
                .iter()
                .filter(|path| ends_with_segments(&self.relative(path), name))
                .collect(),
            None => candidates.iter().collect(),
        };

        pick_first(name, matches)
    }

    /// 相对笔记库根目录、使用 `/` 分隔的路径
    fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }
}

/// `rel` 以完整路径段 `name` 结尾（`xb/Target` 不匹配 `b/Target`）
fn ends_with_segments(rel: &str, name: &str) -> bool {
    rel == name
        || rel
            .strip_suffix(name)
            .is_some_and(|head| head.ends_with('/'))
}

fn pick_first<'a>(name: &str, matches: Vec<&'a PathBuf>) -> Option<&'a Path> {
    if matches.len() > 1 {
        warn!(
            "Ambiguous name {:?}: {} matches, using {:?}",
            name,
            matches.len(),
            matches[0]
        );
    }
    matches.first().map(|p| p.as_path())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md"))
}

fn strip_md_extension(name: &str) -> &str {
    let len = name.len();
    if len > 3 && name.is_char_boundary(len - 3) && name[len - 3..].eq_ignore_ascii_case(".md") {
        &name[..len - 3]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_scan_finds_markdown_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "a.md");
        touch(root, "sub/b.md");
        touch(root, "sub/deeper/c.md");
        touch(root, "sub/image.png");

        let index = VaultIndex::scan(root, &[]).unwrap();
        let names: Vec<_> = index
            .notes()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md", "c.md"]);
        assert!(index.find_file("image.png").is_some());
    }

    #[test]
    fn test_scan_skips_hidden_and_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(root, "visible.md");
        touch(root, ".obsidian/config.md");
        touch(root, "mirror/copied.md");

        let index = VaultIndex::scan(root, &[root.join("mirror")]).unwrap();
        assert_eq!(index.notes().len(), 1);
        assert!(index.find_note("copied").is_none());
        assert!(index.find_note("config").is_none());
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(VaultIndex::scan(&temp_dir.path().join("missing"), &[]).is_err());
    }

    #[test]
    fn test_find_note_by_name_and_prefix() {
        let index = VaultIndex::from_paths(
            "/vault",
            vec![
                PathBuf::from("/vault/a/Target.md"),
                PathBuf::from("/vault/b/Target.md"),
                PathBuf::from("/vault/Other Note.md"),
            ],
        );

        // 多个匹配时取第一个
        assert_eq!(index.find_note("Target"), Some(Path::new("/vault/a/Target.md")));
        assert_eq!(index.find_note("b/Target"), Some(Path::new("/vault/b/Target.md")));
        assert_eq!(
            index.find_note("Other Note.md"),
            Some(Path::new("/vault/Other Note.md"))
        );
        assert!(index.find_note("Missing").is_none());
        assert!(index.find_note("c/Target").is_none());
    }

    #[test]
    fn test_find_file_with_folder_prefix() {
        let index = VaultIndex::from_paths(
            "/vault",
            vec![
                PathBuf::from("/vault/assets/pic.png"),
                PathBuf::from("/vault/old/pic.png"),
                PathBuf::from("/vault/xassets/pic.png"),
            ],
        );

        assert_eq!(index.find_file("pic.png"), Some(Path::new("/vault/assets/pic.png")));
        assert_eq!(
            index.find_file("old/pic.png"),
            Some(Path::new("/vault/old/pic.png"))
        );
        assert_eq!(
            index.find_file("xassets/pic.png"),
            Some(Path::new("/vault/xassets/pic.png"))
        );
        assert_eq!(
            index.find_file("assets/pic.png"),
            Some(Path::new("/vault/assets/pic.png"))
        );
        assert!(index.find_file("missing/pic.png").is_none());
        assert!(index.find_file("assets/other.png").is_none());
    }

    /// 收集日志输出
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        (result, logs)
    }

    #[test]
    fn test_ambiguous_name_warns() {
        let index = VaultIndex::from_paths(
            "/vault",
            vec![
                PathBuf::from("/vault/a/Target.md"),
                PathBuf::from("/vault/b/Target.md"),
                PathBuf::from("/vault/Unique.md"),
            ],
        );

        let (found, logs) = capture_logs(|| index.find_note("Target"));
        assert_eq!(found, Some(Path::new("/vault/a/Target.md")));
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Ambiguous name \"Target\": 2 matches"));

        let (found, logs) = capture_logs(|| index.find_note("Unique"));
        assert!(found.is_some());
        assert!(logs.is_empty());
    }
}
