//! 组合视图：`:` 前缀走嵌入资源树，其余路径走磁盘

use std::io::{self, Read};
use std::sync::Arc;

use crate::config::RESOURCE_PREFIX;
use super::{DiskFs, EmbeddedTree, ResourceFs, ResourceKind};

/// 宿主看到的完整资源视图
#[derive(Debug, Clone)]
pub struct Vfs {
    embedded: Arc<EmbeddedTree>,
    disk: DiskFs,
}

impl Vfs {
    pub fn new(embedded: EmbeddedTree) -> Self {
        Self {
            embedded: Arc::new(embedded),
            disk: DiskFs,
        }
    }

    /// 嵌入资源树
    pub fn embedded(&self) -> &EmbeddedTree {
        &self.embedded
    }

    fn route(&self, path: &str) -> &dyn ResourceFs {
        if path.starts_with(RESOURCE_PREFIX) {
            self.embedded.as_ref()
        } else {
            &self.disk
        }
    }
}

impl ResourceFs for Vfs {
    fn kind(&self, path: &str) -> Option<ResourceKind> {
        self.route(path).kind(path)
    }

    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        self.route(path).open(path)
    }
}
