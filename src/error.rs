//! 错误类型
//!
//! 导入器、字节码反序列化和宿主解释器各自的错误定义

use std::io;

/// 字节码反序列化错误
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// 数据在读取过程中提前结束
    #[error("bytecode is truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid bytecode magic number: 0x{0:08X}")]
    BadMagic(u32),

    #[error("unsupported bytecode version: {0}")]
    UnsupportedVersion(u16),

    #[error("invalid constant tag: 0x{0:02X}")]
    BadConstantTag(u8),

    #[error("invalid utf-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid opcode 0x{op:02X} at offset {offset}")]
    InvalidOpcode { op: u8, offset: usize },

    /// 操作数引用了不存在的常量或名字
    #[error("operand {index} out of range at offset {offset}")]
    OperandOutOfRange { index: usize, offset: usize },

    #[error("{0} trailing bytes after code section")]
    TrailingBytes(usize),
}

/// 模块代码执行期间的错误
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("name '{0}' is not defined")]
    NameError(String),

    #[error("'{owner}' has no attribute '{attr}'")]
    AttributeError { owner: String, attr: String },

    #[error("stack underflow")]
    StackUnderflow,

    /// 指令流不完整或引用了不存在的常量/名字（未经校验的代码单元）
    #[error("invalid code at offset {offset}")]
    InvalidCode { offset: usize },

    /// 模块代码主动抛出的错误
    #[error("{0}")]
    Raised(String),

    /// 模块代码内部的 import 失败
    #[error(transparent)]
    Import(Box<ImportError>),
}

impl From<ImportError> for RuntimeError {
    fn from(err: ImportError) -> Self {
        RuntimeError::Import(Box::new(err))
    }
}

/// 导入错误
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// 根路径不是目录类容器，导入器无法创建
    #[error("not a valid resource root: {path}")]
    Configuration { path: String },

    /// 没有任何查找器认领该模块
    #[error("no module named '{name}'")]
    NotFound { name: String },

    #[error("error opening resource for module {name}")]
    ResourceOpen {
        name: String,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("error reading resource for module {name}")]
    ResourceRead {
        name: String,
        path: String,
        #[source]
        source: io::Error,
    },

    /// 字节码损坏、截断或版本不符，原样传播
    #[error(transparent)]
    Deserialize(#[from] DecodeError),

    /// 回退搜索本身失败
    #[error("fallback search for '{name}' failed")]
    Delegation {
        name: String,
        #[source]
        source: Box<ImportError>,
    },

    #[error("no module named '{name}'; '{parent}' is not a package")]
    NotAPackage { name: String, parent: String },

    /// 模块顶层代码执行失败
    #[error("error executing module {name}")]
    Execution {
        name: String,
        #[source]
        source: Box<RuntimeError>,
    },
}

impl ImportError {
    /// 是否为"不归我管"的正常否定结果
    pub fn is_not_found(&self) -> bool {
        matches!(self, ImportError::NotFound { .. })
    }
}

/// 导入结果类型
pub type ImportResult<T> = Result<T, ImportError>;
