//! 协议适配
//!
//! 两种协议共用同一个分类/加载核心，只在查找结果的形态上不同。

use std::sync::Arc;

use tracing::trace;

use crate::error::{ImportError, ImportResult};
use crate::host::{FindResult, Host, LegacyFinder, Loader, ModernFinder};
use crate::vm::Module;
use super::{fallback, Classification, ResourceImporter};

/// 旧式协议导入器
///
/// 找不到资源时，带点号且在内置模块表里的名字仍然认领，由 `load_module` 初始化内置模块。
#[derive(Debug)]
pub struct LegacyImporter {
    core: ResourceImporter,
}

impl LegacyImporter {
    pub fn new(core: ResourceImporter) -> Self {
        Self { core }
    }
}

impl LegacyFinder for LegacyImporter {
    fn find_module(
        self: Arc<Self>,
        host: &Host,
        name: &str,
    ) -> ImportResult<Option<Arc<dyn Loader>>> {
        let found = self.core.classify(name);
        trace!(name, root = self.core.root().as_str(), %found, "legacy find_module");

        let claimed = found.is_found() || (name.contains('.') && host.builtins().contains(name));
        if claimed {
            Ok(Some(self as Arc<dyn Loader>))
        } else {
            Ok(None)
        }
    }
}

impl Loader for LegacyImporter {
    fn load_module(self: Arc<Self>, host: &Host, name: &str) -> ImportResult<Arc<Module>> {
        match self.core.classify(name) {
            Classification::NotFound => {
                host.init_builtin(name)?.ok_or_else(|| ImportError::NotFound {
                    name: name.to_string(),
                })
            }
            found => {
                let loader: Arc<dyn Loader> = Arc::clone(&self) as Arc<dyn Loader>;
                self.core.load_classified(host, name, found, loader)
            }
        }
    }
}

/// 新式协议导入器
///
/// 目录返回命名空间片段；带点号且找不到的名字交给回退委托。
#[derive(Debug)]
pub struct ModernImporter {
    core: ResourceImporter,
}

impl ModernImporter {
    pub fn new(core: ResourceImporter) -> Self {
        Self { core }
    }
}

impl ModernFinder for ModernImporter {
    fn find_loader(self: Arc<Self>, host: &Host, name: &str) -> ImportResult<FindResult> {
        let found = self.core.classify(name);
        trace!(name, root = self.core.root().as_str(), %found, "find_loader");

        match found {
            Classification::Module { .. } | Classification::Package { .. } => {
                Ok(FindResult::loader(self))
            }
            Classification::NamespacePortion { dir } => Ok(FindResult::portion(dir)),
            Classification::NotFound => Ok(match fallback::delegate(host, name)? {
                Some(loader) => FindResult::loader(loader),
                None => FindResult::none(),
            }),
        }
    }
}

impl Loader for ModernImporter {
    fn load_module(self: Arc<Self>, host: &Host, name: &str) -> ImportResult<Arc<Module>> {
        let found = self.core.classify(name);
        let loader: Arc<dyn Loader> = Arc::clone(&self) as Arc<dyn Loader>;
        self.core.load_classified(host, name, found, loader)
    }
}
