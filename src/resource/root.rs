//! 资源根

use tracing::debug;

use crate::config::PATH_SEPARATOR;
use crate::error::{ImportError, ImportResult};
use super::ResourceFs;

/// 导入器的根路径
///
/// 构造时必须是一个目录类容器，且总以 `/` 结尾。构造后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoot {
    path: String,
}

impl ResourceRoot {
    /// 校验并规范化根路径
    pub fn new(fs: &dyn ResourceFs, path: &str) -> ImportResult<Self> {
        if !fs.is_container(path) {
            debug!(path, "rejected resource root");
            return Err(ImportError::Configuration {
                path: path.to_string(),
            });
        }

        let mut path = path.to_string();
        if !path.ends_with(PATH_SEPARATOR) {
            path.push(PATH_SEPARATOR);
        }
        Ok(Self { path })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// 根路径下的候选名：`<root><name>`
    pub fn join(&self, name: &str) -> String {
        format!("{}{}", self.path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::EmbeddedTree;

    #[test]
    fn test_root_gets_trailing_separator() {
        let tree = EmbeddedTree::from_entries([(":/lib/a.qlc", b"a".to_vec())]).unwrap();
        let root = ResourceRoot::new(&tree, ":/lib").unwrap();
        assert_eq!(root.as_str(), ":/lib/");
        assert_eq!(root.join("a"), ":/lib/a");

        let root = ResourceRoot::new(&tree, ":/").unwrap();
        assert_eq!(root.as_str(), ":/");
    }

    #[test]
    fn test_root_must_be_container() {
        let tree = EmbeddedTree::from_entries([(":/lib/a.qlc", b"a".to_vec())]).unwrap();
        let err = ResourceRoot::new(&tree, ":/lib/a.qlc").unwrap_err();
        assert!(matches!(err, ImportError::Configuration { .. }));
        assert!(ResourceRoot::new(&tree, ":/nowhere").is_err());
    }
}
