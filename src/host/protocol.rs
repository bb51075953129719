//! 查找器/加载器协议
//!
//! 宿主导入系统对路径条目查找器的两种期望形态：
//! 旧式 `find_module` 只返回加载器；新式 `find_loader` 额外返回命名空间片段。

use std::fmt;
use std::sync::Arc;

use crate::error::ImportResult;
use crate::vm::Module;
use super::Host;

/// 加载器
///
/// 负责创建、注册并执行模块。失败时不能留下已注册的半成品模块。
pub trait Loader: Send + Sync + fmt::Debug {
    fn load_module(self: Arc<Self>, host: &Host, name: &str) -> ImportResult<Arc<Module>>;
}

/// 旧式路径条目查找器
pub trait LegacyFinder: Send + Sync + fmt::Debug {
    /// 认领则返回加载器；不归我管返回 None
    fn find_module(self: Arc<Self>, host: &Host, name: &str)
        -> ImportResult<Option<Arc<dyn Loader>>>;
}

/// 新式路径条目查找器
pub trait ModernFinder: Send + Sync + fmt::Debug {
    fn find_loader(self: Arc<Self>, host: &Host, name: &str) -> ImportResult<FindResult>;
}

/// `find_loader` 的结果
///
/// 有加载器时片段总为空
#[derive(Debug, Default)]
pub struct FindResult {
    pub loader: Option<Arc<dyn Loader>>,
    pub portions: Vec<String>,
}

impl FindResult {
    /// 未找到：`(None, [])`
    pub fn none() -> Self {
        Self::default()
    }

    pub fn loader(loader: Arc<dyn Loader>) -> Self {
        Self {
            loader: Some(loader),
            portions: Vec::new(),
        }
    }

    /// 命名空间包的一个片段：`(None, [dir])`
    pub fn portion(dir: String) -> Self {
        Self {
            loader: None,
            portions: vec![dir],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.loader.is_none() && self.portions.is_empty()
    }
}

/// 路径条目查找器，按协议形态区分
#[derive(Debug, Clone)]
pub enum PathEntryFinder {
    Legacy(Arc<dyn LegacyFinder>),
    Modern(Arc<dyn ModernFinder>),
}

/// 路径钩子：为搜索路径条目构造查找器
///
/// 返回 `ImportError::Configuration` 表示该条目不归这个钩子管
pub type PathHook = Arc<dyn Fn(&str) -> ImportResult<PathEntryFinder> + Send + Sync>;
