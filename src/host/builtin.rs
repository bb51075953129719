//! 内置模块
//!
//! 由 Rust 代码初始化、不对应任何资源的模块。旧式协议下，
//! 带点号的内置扩展模块也通过嵌入导入器的 `load_module` 初始化。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::IMPORTER_MODULE;
use crate::error::{ImportError, ImportResult, RuntimeError};
use crate::vm::Module;
use super::{Host, Loader};

/// 内置模块初始化函数：填充模块命名空间
pub type BuiltinInit = fn(&Host, &Module) -> Result<(), RuntimeError>;

/// 内置模块表
#[derive(Clone)]
pub struct BuiltinTable {
    builtin_modules: HashMap<String, BuiltinInit>,
}

impl BuiltinTable {
    /// 创建带默认内置模块的表
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.register_builtin_modules();
        table
    }

    /// 创建空表
    pub fn empty() -> Self {
        Self {
            builtin_modules: HashMap::new(),
        }
    }

    fn register_builtin_modules(&mut self) {
        // 导入器自身：暴露版本信息
        self.register(IMPORTER_MODULE, crate::importer::init_importer_module);
    }

    /// 注册（或替换）内置模块
    pub fn register(&mut self, name: &str, init: BuiltinInit) {
        self.builtin_modules.insert(name.to_string(), init);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtin_modules.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<BuiltinInit> {
        self.builtin_modules.get(name).copied()
    }

    /// 排好序的模块名
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builtin_modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuiltinTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BuiltinTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// 内置模块的加载器
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinLoader;

impl Loader for BuiltinLoader {
    fn load_module(self: Arc<Self>, host: &Host, name: &str) -> ImportResult<Arc<Module>> {
        host.init_builtin(name)?.ok_or_else(|| ImportError::NotFound {
            name: name.to_string(),
        })
    }
}
