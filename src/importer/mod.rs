//! 嵌入资源导入器
//!
//! 把资源树里的 `.qlc` 字节码作为模块提供给宿主导入系统。
//! 每个导入器绑定一个根目录；搜索路径上的每个条目由路径钩子构造一个导入器。
//!
//! - `classify` 决定名字对应模块、包、命名空间片段还是不存在
//! - `loader` 读取、反序列化并执行字节码
//! - `protocol` 提供旧式和新式两种查找器形态
//! - `fallback` 对带点号但本地找不到的名字做一次受保护的默认搜索

mod classify;
mod fallback;
mod loader;
mod protocol;

pub use classify::{classify, Classification};
pub use fallback::{delegate, DelegationGuard};
pub use protocol::{LegacyImporter, ModernImporter};

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{Protocol, HEX_VERSION, VERSION};
use crate::error::{ImportResult, RuntimeError};
use crate::host::{Host, PathEntryFinder, PathHook};
use crate::resource::{ResourceFs, ResourceRoot};
use crate::vm::{Module, Value};

/// 分类/加载核心，由两种协议适配器共用
#[derive(Clone)]
pub struct ResourceImporter {
    root: ResourceRoot,
    fs: Arc<dyn ResourceFs>,
}

impl ResourceImporter {
    /// 在 `path` 上创建导入器，`path` 必须是目录类容器
    pub fn new(fs: Arc<dyn ResourceFs>, path: &str) -> ImportResult<Self> {
        let root = ResourceRoot::new(fs.as_ref(), path)?;
        debug!(root = root.as_str(), "created resource importer");
        Ok(Self { root, fs })
    }

    pub fn root(&self) -> &ResourceRoot {
        &self.root
    }

    pub fn classify(&self, name: &str) -> Classification {
        classify(self.fs.as_ref(), &self.root, name)
    }

    /// 按协议包装成路径条目查找器
    pub fn into_finder(self, protocol: Protocol) -> PathEntryFinder {
        match protocol {
            Protocol::Legacy => PathEntryFinder::Legacy(Arc::new(LegacyImporter::new(self))),
            Protocol::Modern => PathEntryFinder::Modern(Arc::new(ModernImporter::new(self))),
        }
    }
}

impl fmt::Debug for ResourceImporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceImporter")
            .field("root", &self.root.as_str())
            .finish()
    }
}

/// 路径钩子：为每个目录类容器条目创建导入器
///
/// 不是容器的条目返回 `ImportError::Configuration`，宿主会继续尝试其他钩子。
pub fn path_hook(fs: Arc<dyn ResourceFs>, protocol: Protocol) -> PathHook {
    Arc::new(move |entry: &str| {
        ResourceImporter::new(Arc::clone(&fs), entry).map(|core| core.into_finder(protocol))
    })
}

/// 导入器自身的内置模块：版本信息
pub fn init_importer_module(_host: &Host, module: &Module) -> Result<(), RuntimeError> {
    module.set("hexversion", Value::Int(HEX_VERSION as i64));
    module.set("version", Value::Str(VERSION.to_string()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::resource::EmbeddedTree;

    fn fs() -> Arc<dyn ResourceFs> {
        Arc::new(EmbeddedTree::from_entries([(":/lib/a.qlc", b"a".to_vec())]).unwrap())
    }

    #[test]
    fn test_path_hook_picks_protocol() {
        let legacy = path_hook(fs(), Protocol::Legacy);
        assert!(matches!(legacy(":/lib"), Ok(PathEntryFinder::Legacy(_))));

        let modern = path_hook(fs(), Protocol::Modern);
        assert!(matches!(modern(":/"), Ok(PathEntryFinder::Modern(_))));
    }

    #[test]
    fn test_path_hook_rejects_non_container() {
        let hook = path_hook(fs(), Protocol::Modern);
        assert!(matches!(
            hook(":/lib/a.qlc"),
            Err(ImportError::Configuration { .. })
        ));
        assert!(hook(":/missing").is_err());
    }

    #[test]
    fn test_importer_module_exposes_version() {
        let module = Module::new(crate::config::IMPORTER_MODULE);
        init_importer_module(&Host::new(), &module).unwrap();
        assert_eq!(module.get("hexversion"), Some(Value::Int(HEX_VERSION as i64)));
        assert_eq!(module.get("version"), Some(Value::Str(VERSION.to_string())));
    }
}
