//! 运行时值
//!
//! 模块命名空间里存放的值。模块和加载器以 `Arc` 共享，按身份比较。

use std::fmt;
use std::sync::Arc;

use crate::host::Loader;
use super::Module;

/// 运行时值
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// 模块对象
    Module(Arc<Module>),
    /// 加载器对象（`__loader__`）
    Loader(Arc<dyn Loader>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&Arc<Module>> {
        match self {
            Value::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_loader(&self) -> Option<&Arc<dyn Loader>> {
        match self {
            Value::Loader(l) => Some(l),
            _ => None,
        }
    }

    /// 字符串列表（`__path__` 的形态）
    pub fn str_list(items: impl IntoIterator<Item = String>) -> Self {
        Value::List(items.into_iter().map(Value::Str).collect())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => Arc::ptr_eq(a, b),
            // 只比较数据指针，忽略 vtable
            (Value::Loader(a), Value::Loader(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Loader(l) => write!(f, "<loader {:?}>", l),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{}.0", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", v)?;
                }
                write!(f, "]")
            }
            Value::Module(m) => write!(f, "<module '{}'>", m.name()),
            Value::Loader(_) => write!(f, "<loader>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        assert_eq!(
            Value::str_list(vec![":/a".to_string()]).to_string(),
            "[\":/a\"]"
        );
    }

    #[test]
    fn test_module_identity() {
        let a = Arc::new(Module::new("a"));
        let b = Arc::new(Module::new("a"));
        assert_eq!(Value::Module(a.clone()), Value::Module(a.clone()));
        assert_ne!(Value::Module(a), Value::Module(b));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }
}
