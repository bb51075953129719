//! 模块注册表
//!
//! 名字 -> 模块对象。已注册的模块被认为已经加载完成（或正在加载）。

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::vm::Module;

/// 已加载模块表
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: DashMap<String, Arc<Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.get(name).map(|m| Arc::clone(m.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn insert(&self, module: Arc<Module>) {
        self.modules.insert(module.name().to_string(), module);
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.remove(name).map(|(_, m)| m)
    }

    /// 取已有模块或创建新模块
    pub fn get_or_create(&self, name: &str) -> Arc<Module> {
        let entry = self
            .modules
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Module::new(name)));
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// 排好序的模块名
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// 注册模块并返回守卫，守卫未提交就被丢弃时撤销注册
    pub fn begin(&self, name: &str) -> PendingModule<'_> {
        PendingModule {
            registry: self,
            module: self.get_or_create(name),
            committed: false,
        }
    }
}

/// 加载中的模块
///
/// RAII 风格：任何错误路径上丢弃守卫都会把模块从注册表移除
pub struct PendingModule<'r> {
    registry: &'r ModuleRegistry,
    module: Arc<Module>,
    committed: bool,
}

impl PendingModule<'_> {
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// 加载成功，保留注册
    pub fn commit(mut self) -> Arc<Module> {
        self.committed = true;
        Arc::clone(&self.module)
    }
}

impl Drop for PendingModule<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(module = self.module.name(), "discarding partially loaded module");
            self.registry.remove(self.module.name());
        }
    }
}
