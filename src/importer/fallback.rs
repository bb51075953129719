//! 回退委托
//!
//! 带点号但在本根下找不到的名字，交给宿主的默认搜索再找一次。
//! 默认搜索会再次询问搜索路径上的导入器（包括自己），所以用一个
//! 线程内共享的守卫阻止嵌套委托。

use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{ImportError, ImportResult};
use crate::host::{Host, Loader};

thread_local! {
    /// 当前线程上正在进行的委托层数（只会是 0 或 1）
    static DELEGATION_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// 委托守卫
///
/// RAII 风格：持有期间同一线程上的所有导入器都不会再委托，丢弃时释放
pub struct DelegationGuard {
    // 绑定在创建它的线程上
    _not_send: PhantomData<*const ()>,
}

impl DelegationGuard {
    /// 守卫未被持有时获取它
    pub fn try_acquire() -> Option<Self> {
        DELEGATION_DEPTH.with(|depth| {
            if depth.get() > 0 {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(Self {
                    _not_send: PhantomData,
                })
            }
        })
    }

    /// 当前线程上是否有委托正在进行
    pub fn is_held() -> bool {
        DELEGATION_DEPTH.with(|depth| depth.get() > 0)
    }
}

impl Drop for DelegationGuard {
    fn drop(&mut self) {
        DELEGATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// 通过宿主默认搜索查找 `name` 的加载器
///
/// 不带点号的名字、或者已经处在委托中时直接返回 None。
/// 默认搜索失败包装成 `ImportError::Delegation`。
pub fn delegate(host: &Host, name: &str) -> ImportResult<Option<Arc<dyn Loader>>> {
    if !name.contains('.') {
        return Ok(None);
    }

    let Some(_guard) = DelegationGuard::try_acquire() else {
        trace!(name, "already delegating, reporting not found");
        return Ok(None);
    };

    debug!(name, "delegating to default module search");
    let found = host
        .default_find(name)
        .map_err(|source| ImportError::Delegation {
            name: name.to_string(),
            source: Box::new(source),
        })?;
    trace!(name, found = found.is_some(), "delegation finished");
    Ok(found)
}
