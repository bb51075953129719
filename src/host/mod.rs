//! 宿主导入系统
//!
//! 模块注册表、搜索路径、路径钩子和查找器缓存、内置模块表。
//! 嵌入资源导入器作为路径钩子安装在这里，并通过 `&Host` 回调宿主：
//! 默认搜索（回退委托）和内置模块初始化（旧式协议）。

mod builtin;
mod protocol;
mod registry;

pub use builtin::{BuiltinInit, BuiltinLoader, BuiltinTable};
pub use protocol::{FindResult, LegacyFinder, Loader, ModernFinder, PathEntryFinder, PathHook};
pub use registry::{ModuleRegistry, PendingModule};

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, trace};

use crate::compiler::CodeUnit;
use crate::error::{ImportError, ImportResult};
use crate::vm::{self, Module, Value, ATTR_FILE, ATTR_LOADER, ATTR_PATH};

/// 宿主运行时
pub struct Host {
    modules: ModuleRegistry,
    search_path: RwLock<Vec<String>>,
    path_hooks: RwLock<Vec<PathHook>>,
    /// 路径条目 -> 查找器；None 表示没有钩子认领该条目
    finder_cache: DashMap<String, Option<PathEntryFinder>>,
    builtins: BuiltinTable,
    /// 全局导入锁（可重入：模块代码执行时会嵌套导入）
    import_lock: ReentrantMutex<()>,
}

impl Host {
    /// 创建带默认内置模块、空搜索路径的宿主
    pub fn new() -> Self {
        Self::with_builtins(BuiltinTable::new())
    }

    pub fn with_builtins(builtins: BuiltinTable) -> Self {
        Self {
            modules: ModuleRegistry::new(),
            search_path: RwLock::new(Vec::new()),
            path_hooks: RwLock::new(Vec::new()),
            finder_cache: DashMap::new(),
            builtins,
            import_lock: ReentrantMutex::new(()),
        }
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn builtins(&self) -> &BuiltinTable {
        &self.builtins
    }

    pub fn search_path(&self) -> Vec<String> {
        self.search_path.read().clone()
    }

    pub fn set_search_path(&self, entries: Vec<String>) {
        *self.search_path.write() = entries;
    }

    /// 安装路径钩子，清空查找器缓存
    pub fn add_path_hook(&self, hook: PathHook) {
        self.path_hooks.write().push(hook);
        self.finder_cache.clear();
    }

    /// 导入模块
    pub fn import(&self, name: &str) -> ImportResult<Arc<Module>> {
        let _lock = self.import_lock.lock();

        if let Some(module) = self.modules.get(name) {
            return Ok(module);
        }

        let (paths, parent) = match name.rsplit_once('.') {
            Some((parent_name, child)) => {
                let parent = self.import(parent_name)?;
                // 父包的初始化代码可能已经导入了它
                if let Some(module) = self.modules.get(name) {
                    return Ok(module);
                }
                let paths = parent.search_path().ok_or_else(|| ImportError::NotAPackage {
                    name: name.to_string(),
                    parent: parent_name.to_string(),
                })?;
                (paths, Some((parent, child)))
            }
            None => {
                if self.builtins.contains(name) {
                    return self.load_with(Arc::new(BuiltinLoader), name);
                }
                (self.search_path(), None)
            }
        };

        let module = self.find_and_load(name, &paths)?;
        if let Some((parent, child)) = parent {
            parent.set(child, Value::Module(Arc::clone(&module)));
        }
        Ok(module)
    }

    fn find_and_load(&self, name: &str, paths: &[String]) -> ImportResult<Arc<Module>> {
        let mut portions = Vec::new();

        for entry in paths {
            let Some(finder) = self.finder_for(entry)? else {
                continue;
            };
            match finder {
                PathEntryFinder::Legacy(finder) => {
                    if let Some(loader) = finder.find_module(self, name)? {
                        return self.load_with(loader, name);
                    }
                }
                PathEntryFinder::Modern(finder) => {
                    let found = finder.find_loader(self, name)?;
                    if let Some(loader) = found.loader {
                        return self.load_with(loader, name);
                    }
                    portions.extend(found.portions);
                }
            }
        }

        if portions.is_empty() {
            return Err(ImportError::NotFound {
                name: name.to_string(),
            });
        }

        debug!(module = name, ?portions, "creating namespace package");
        let module = Arc::new(Module::new(name));
        module.set(ATTR_LOADER, Value::Null);
        module.set(ATTR_PATH, Value::str_list(portions));
        self.modules.insert(Arc::clone(&module));
        Ok(module)
    }

    fn load_with(&self, loader: Arc<dyn Loader>, name: &str) -> ImportResult<Arc<Module>> {
        trace!(module = name, ?loader, "loading");
        let module = loader.load_module(self, name)?;
        // 以注册表中的对象为准
        Ok(self.modules.get(name).unwrap_or(module))
    }

    /// 取路径条目的查找器（带缓存）
    fn finder_for(&self, entry: &str) -> ImportResult<Option<PathEntryFinder>> {
        if let Some(cached) = self.finder_cache.get(entry) {
            return Ok(cached.value().clone());
        }

        let hooks: Vec<PathHook> = self.path_hooks.read().clone();
        let mut finder = None;
        for hook in hooks {
            match hook(entry) {
                Ok(f) => {
                    finder = Some(f);
                    break;
                }
                Err(ImportError::Configuration { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        if finder.is_none() {
            trace!(entry, "no path hook accepted entry");
        }
        self.finder_cache.insert(entry.to_string(), finder.clone());
        Ok(finder)
    }

    /// 默认模块搜索，不导入父包
    ///
    /// 已注册的模块返回其加载器；然后查内置模块表；最后按顶层搜索路径询问查找器。
    /// 命名空间片段被忽略。
    pub fn default_find(&self, name: &str) -> ImportResult<Option<Arc<dyn Loader>>> {
        let _lock = self.import_lock.lock();

        if let Some(module) = self.modules.get(name) {
            return Ok(module.loader());
        }
        if self.builtins.contains(name) {
            return Ok(Some(Arc::new(BuiltinLoader)));
        }

        for entry in self.search_path() {
            let Some(finder) = self.finder_for(&entry)? else {
                continue;
            };
            let loader = match finder {
                PathEntryFinder::Legacy(finder) => finder.find_module(self, name)?,
                PathEntryFinder::Modern(finder) => finder.find_loader(self, name)?.loader,
            };
            if loader.is_some() {
                return Ok(loader);
            }
        }
        Ok(None)
    }

    /// 初始化内置模块，表中没有时返回 None
    pub fn init_builtin(&self, name: &str) -> ImportResult<Option<Arc<Module>>> {
        let _lock = self.import_lock.lock();

        if let Some(module) = self.modules.get(name) {
            return Ok(Some(module));
        }
        let Some(init) = self.builtins.get(name) else {
            return Ok(None);
        };

        debug!(module = name, "initializing builtin module");
        let pending = self.begin_module(name);
        let module = Arc::clone(pending.module());
        module.set(ATTR_LOADER, Value::Loader(Arc::new(BuiltinLoader)));
        init(self, &module).map_err(|e| ImportError::Execution {
            name: name.to_string(),
            source: Box::new(e),
        })?;
        Ok(Some(pending.commit()))
    }

    /// 创建（或取出）并注册模块，守卫未提交时撤销注册
    pub fn begin_module(&self, name: &str) -> PendingModule<'_> {
        self.modules.begin(name)
    }

    /// 以 `filename` 作为来源在模块命名空间中执行代码
    pub fn exec_code(&self, module: &Arc<Module>, code: &CodeUnit, filename: &str) -> ImportResult<()> {
        module.set(ATTR_FILE, Value::Str(filename.to_string()));
        vm::exec_code(self, code, module).map_err(|e| ImportError::Execution {
            name: module.name().to_string(),
            source: Box::new(e),
        })
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
