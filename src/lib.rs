//! Q 运行时的嵌入资源模块导入器
//!
//! 把打包进可执行文件的资源树（`:/` 前缀）里的预编译字节码作为模块导入。
//! 支持普通模块、带 `__init__` 的包和命名空间包片段，并兼容宿主的旧式与新式查找器协议。

pub mod boot;
pub mod compiler;
pub mod config;
pub mod error;
pub mod host;
pub mod importer;
pub mod resource;
pub mod vm;

pub use config::{BootConfig, Protocol};
pub use error::{DecodeError, ImportError, ImportResult, RuntimeError};
pub use host::Host;
pub use importer::{Classification, LegacyImporter, ModernImporter, ResourceImporter};
pub use resource::{DiskFs, EmbeddedTree, ResourceFs, ResourceRoot, Vfs};
