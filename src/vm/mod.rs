//! 宿主运行时的对象模型
//!
//! 运行时值、模块对象，以及执行模块顶层代码的解释器

pub mod interp;
pub mod module;
pub mod value;

pub use interp::exec_code;
pub use module::{Module, ATTR_FILE, ATTR_LOADER, ATTR_NAME, ATTR_PATH};
pub use value::Value;
