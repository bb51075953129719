//! 字节码模块
//!
//! 代码单元以及 `.qlc` 序列化格式

pub mod bytecode;
pub mod marshal;

pub use bytecode::{CodeUnit, Constant, OpCode};
