//! 资源分类
//!
//! 把点分模块名的最后一段映射到根目录下的资源：
//! 模块文件优先于同名目录，包标记优先于命名空间目录。

use std::fmt;

use tracing::trace;

use crate::config::{BYTECODE_EXTENSION, PACKAGE_INIT, PATH_SEPARATOR};
use crate::resource::{ResourceFs, ResourceRoot};

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// `<root><last>.qlc`
    Module { path: String },
    /// `<root><last>/__init__.qlc`，`dir` 是包目录
    Package { init_path: String, dir: String },
    /// 没有包标记的目录 `<root><last>`
    NamespacePortion { dir: String },
    NotFound,
}

impl Classification {
    /// 是否有可加载的代码资源
    pub fn is_loadable(&self) -> bool {
        matches!(self, Classification::Module { .. } | Classification::Package { .. })
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Classification::NotFound)
    }

    /// 要加载的代码资源路径
    pub fn code_path(&self) -> Option<&str> {
        match self {
            Classification::Module { path } => Some(path),
            Classification::Package { init_path, .. } => Some(init_path),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Module { path } => write!(f, "module {}", path),
            Classification::Package { init_path, dir } => {
                write!(f, "package {} (init {})", dir, init_path)
            }
            Classification::NamespacePortion { dir } => write!(f, "namespace portion {}", dir),
            Classification::NotFound => write!(f, "not found"),
        }
    }
}

/// 对 `name` 的最后一段分类
///
/// 顺序固定：模块文件、包标记、目录。
pub fn classify(fs: &dyn ResourceFs, root: &ResourceRoot, name: &str) -> Classification {
    let last = name.rsplit('.').next().unwrap_or(name);
    // 空段会落到根目录本身
    if last.is_empty() {
        return Classification::NotFound;
    }

    let candidate = root.join(last);

    let path = format!("{}.{}", candidate, BYTECODE_EXTENSION);
    if fs.is_leaf(&path) {
        trace!(name, %path, "classified as module");
        return Classification::Module { path };
    }

    let init_path = format!(
        "{}{}{}.{}",
        candidate, PATH_SEPARATOR, PACKAGE_INIT, BYTECODE_EXTENSION
    );
    if fs.is_leaf(&init_path) {
        trace!(name, %init_path, "classified as package");
        return Classification::Package {
            init_path,
            dir: candidate,
        };
    }

    if fs.is_container(&candidate) {
        trace!(name, dir = %candidate, "classified as namespace portion");
        return Classification::NamespacePortion { dir: candidate };
    }

    Classification::NotFound
}
