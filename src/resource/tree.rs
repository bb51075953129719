//! 嵌入资源树
//!
//! 编进可执行文件的只读目录树，挂载在 `:/` 前缀下。
//! 目录不单独存储内容，由叶子路径的父级隐式生成。

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use crate::config::{PATH_SEPARATOR, RESOURCE_PREFIX};
use super::{ResourceFs, ResourceKind};

/// 嵌入资源树
#[derive(Debug, Clone)]
pub struct EmbeddedTree {
    /// 叶子路径 -> 内容
    leaves: BTreeMap<String, Arc<[u8]>>,
    /// 所有容器路径（根为空字符串）
    containers: BTreeSet<String>,
}

impl Default for EmbeddedTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddedTree {
    /// 创建只有根目录的空树
    pub fn new() -> Self {
        let mut containers = BTreeSet::new();
        containers.insert(String::new());
        Self {
            leaves: BTreeMap::new(),
            containers,
        }
    }

    /// 从 (路径, 内容) 列表构建
    pub fn from_entries<I, P, D>(entries: I) -> io::Result<Self>
    where
        I: IntoIterator<Item = (P, D)>,
        P: AsRef<str>,
        D: Into<Arc<[u8]>>,
    {
        let mut tree = Self::new();
        for (path, data) in entries {
            tree.insert(path.as_ref(), data)?;
        }
        Ok(tree)
    }

    /// 把磁盘目录快照成资源树，目录本身成为 `:/`
    pub fn from_dir(dir: &Path) -> io::Result<Self> {
        let mut tree = Self::new();
        tree.snapshot_dir(dir, "")?;
        Ok(tree)
    }

    fn snapshot_dir(&mut self, dir: &Path, prefix: &str) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{}{}{}", prefix, PATH_SEPARATOR, name)
            };

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.add_container(&key)?;
                self.snapshot_dir(&entry.path(), &key)?;
            } else if file_type.is_file() {
                let data = fs::read(entry.path())?;
                self.insert(&key, data)?;
            }
        }
        Ok(())
    }

    /// 插入叶子资源，自动补齐父目录
    pub fn insert(&mut self, path: &str, data: impl Into<Arc<[u8]>>) -> io::Result<()> {
        let key = normalize(path).ok_or_else(|| invalid_path(path))?;
        if key.is_empty() || self.containers.contains(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{}' is already a directory", path),
            ));
        }
        self.add_parents(&key)?;
        self.leaves.insert(key, data.into());
        Ok(())
    }

    /// 显式添加（可能为空的）目录
    pub fn add_container(&mut self, path: &str) -> io::Result<()> {
        let key = normalize(path).ok_or_else(|| invalid_path(path))?;
        if self.leaves.contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{}' is already a file", path),
            ));
        }
        self.add_parents(&key)?;
        self.containers.insert(key);
        Ok(())
    }

    fn add_parents(&mut self, key: &str) -> io::Result<()> {
        let mut end = 0;
        while let Some(pos) = key[end..].find(PATH_SEPARATOR) {
            let parent = &key[..end + pos];
            if self.leaves.contains_key(parent) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("'{}' is already a file", parent),
                ));
            }
            self.containers.insert(parent.to_string());
            end += pos + 1;
        }
        Ok(())
    }

    /// 叶子数量
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// 以 `:/` 形式列出所有叶子路径
    pub fn paths(&self) -> impl Iterator<Item = String> + '_ {
        self.leaves
            .keys()
            .map(|k| format!("{}{}{}", RESOURCE_PREFIX, PATH_SEPARATOR, k))
    }
}

impl ResourceFs for EmbeddedTree {
    fn kind(&self, path: &str) -> Option<ResourceKind> {
        let key = normalize(path)?;
        if self.leaves.contains_key(&key) {
            Some(ResourceKind::Leaf)
        } else if self.containers.contains(&key) {
            Some(ResourceKind::Container)
        } else {
            None
        }
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        let data = normalize(path)
            .and_then(|key| self.leaves.get(&key))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no resource at '{}'", path))
            })?;
        Ok(Box::new(Cursor::new(Arc::clone(data))))
    }
}

/// 规范化资源路径："`:/a//b/`" -> "`a/b`"
///
/// 带 `:` 前缀或不带前缀的相对形式都接受；含 `.`、`..` 段的路径返回 None。
fn normalize(path: &str) -> Option<String> {
    let rest = path.strip_prefix(RESOURCE_PREFIX).unwrap_or(path);
    let mut segments = Vec::new();
    for segment in rest.split(PATH_SEPARATOR) {
        match segment {
            "" => continue,
            "." | ".." => return None,
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

fn invalid_path(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid resource path '{}'", path),
    )
}
