//! 资源文件系统
//!
//! 导入器只通过 `ResourceFs` 观察资源：某个路径是叶子（文件）、容器（目录）还是不存在，
//! 以及打开叶子读取其内容。嵌入资源树和磁盘都实现这个接口。

mod disk;
mod root;
mod tree;
mod vfs;

pub use disk::DiskFs;
pub use root::ResourceRoot;
pub use tree::EmbeddedTree;
pub use vfs::Vfs;

use std::fmt;
use std::io::{self, Read};

/// 资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// 叶子资源（可读取内容）
    Leaf,
    /// 目录类容器
    Container,
}

/// 只读资源文件系统接口
pub trait ResourceFs: Send + Sync + fmt::Debug {
    /// 查询路径的类型，不存在时返回 None
    fn kind(&self, path: &str) -> Option<ResourceKind>;

    /// 打开叶子资源
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;

    fn is_leaf(&self, path: &str) -> bool {
        self.kind(path) == Some(ResourceKind::Leaf)
    }

    fn is_container(&self, path: &str) -> bool {
        self.kind(path) == Some(ResourceKind::Container)
    }
}
