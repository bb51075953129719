//! 模块对象

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::host::Loader;
use super::Value;

/// 模块名属性
pub const ATTR_NAME: &str = "__name__";
/// 加载器属性
pub const ATTR_LOADER: &str = "__loader__";
/// 包搜索路径属性，存在即表示模块是包
pub const ATTR_PATH: &str = "__path__";
/// 代码来源属性
pub const ATTR_FILE: &str = "__file__";

/// 模块对象
///
/// 命名空间可以在共享（`Arc<Module>`）之后继续修改：
/// 加载器先注册模块，再绑定属性、执行代码。
pub struct Module {
    name: String,
    namespace: RwLock<HashMap<String, Value>>,
}

impl Module {
    /// 创建模块，`__name__` 已绑定
    pub fn new(name: &str) -> Self {
        let mut namespace = HashMap::new();
        namespace.insert(ATTR_NAME.to_string(), Value::Str(name.to_string()));
        Self {
            name: name.to_string(),
            namespace: RwLock::new(namespace),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.namespace.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.namespace.write().insert(key.to_string(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.namespace.read().contains_key(key)
    }

    /// 排好序的命名空间键
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.namespace.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// `__loader__`
    pub fn loader(&self) -> Option<Arc<dyn Loader>> {
        self.get(ATTR_LOADER)?.as_loader().cloned()
    }

    /// `__path__`，非包模块返回 None
    pub fn search_path(&self) -> Option<Vec<String>> {
        let value = self.get(ATTR_PATH)?;
        let items = value.as_list()?;
        Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }

    /// `__file__`
    pub fn file(&self) -> Option<String> {
        self.get(ATTR_FILE)?.as_str().map(str::to_string)
    }

    pub fn is_package(&self) -> bool {
        self.contains(ATTR_PATH)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 命名空间里可能有子模块，只打印名字
        f.debug_struct("Module").field("name", &self.name).finish_non_exhaustive()
    }
}
