//! 字节码定义
//!
//! 模块顶层代码的指令集和代码单元。资源里的 `.qlc` blob 反序列化后就是一个 `CodeUnit`。

use std::fmt;

use crate::vm::Value;

/// 操作码
///
/// 带操作数的指令后跟一个 16 位大端操作数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// 从常量池加载值到栈
    /// 操作数: 常量索引 (u16)
    Const = 0,

    /// 弹出栈顶
    Pop = 1,

    // ============ 名字操作 ============
    /// 读取模块命名空间中的名字
    /// 操作数: 名字索引 (u16)
    LoadName = 50,
    /// 弹出栈顶并写入模块命名空间
    /// 操作数: 名字索引 (u16)
    StoreName = 51,

    // ============ 容器 ============
    /// 弹出 n 个值组成列表
    /// 操作数: 元素数量 (u16)
    BuildList = 75,

    /// 获取模块属性: pop module, push module.attr
    /// 操作数: 名字索引 (u16)
    LoadAttr = 93,

    // ============ 导入 ============
    /// 通过宿主导入系统导入模块，压入模块对象
    /// 操作数: 完整模块名的名字索引 (u16)
    ImportName = 160,

    // ============ 控制 ============
    /// 结束模块代码
    Return = 82,

    /// 抛出错误，栈顶值为错误信息
    Raise = 111,
}

impl OpCode {
    /// 操作数字节数
    pub fn operand_width(self) -> usize {
        match self {
            OpCode::Const
            | OpCode::LoadName
            | OpCode::StoreName
            | OpCode::BuildList
            | OpCode::LoadAttr
            | OpCode::ImportName => 2,
            OpCode::Pop | OpCode::Return | OpCode::Raise => 0,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OpCode::Const),
            1 => Ok(OpCode::Pop),
            50 => Ok(OpCode::LoadName),
            51 => Ok(OpCode::StoreName),
            75 => Ok(OpCode::BuildList),
            93 => Ok(OpCode::LoadAttr),
            160 => Ok(OpCode::ImportName),
            82 => Ok(OpCode::Return),
            111 => Ok(OpCode::Raise),
            other => Err(other),
        }
    }
}

/// 常量池条目
///
/// 只包含可以序列化进 blob 的值
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Constant {
    /// 转换为运行时值
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Str(s.clone()),
        }
    }

    /// 常量池去重用的相等：浮点数比较位模式
    fn same_as(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::Str(s.to_string())
    }
}

impl From<i64> for Constant {
    fn from(i: i64) -> Self {
        Constant::Int(i)
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Constant::Bool(b)
    }
}

impl From<f64> for Constant {
    fn from(f: f64) -> Self {
        Constant::Float(f)
    }
}

/// 常量池和名字表的最大索引（操作数为 u16）
const MAX_POOL_INDEX: usize = u16::MAX as usize;

/// 代码单元
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeUnit {
    /// 字节码指令
    pub code: Vec<u8>,
    /// 常量池
    pub constants: Vec<Constant>,
    /// 名字表（变量名、属性名、模块名）
    pub names: Vec<String>,
}

impl CodeUnit {
    /// 创建新的代码单元
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个字节
    pub fn write(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// 写入操作码
    pub fn write_op(&mut self, op: OpCode) {
        self.write(op as u8);
    }

    fn write_u16(&mut self, operand: u16) {
        self.code.extend_from_slice(&operand.to_be_bytes());
    }

    /// 添加常量并返回索引
    ///
    /// 浮点数按位比较，`-0.0` 和 `0.0` 是不同的常量。
    ///
    /// # Panics
    ///
    /// 常量池超过 u16 索引范围时 panic
    pub fn add_constant(&mut self, value: Constant) -> u16 {
        if let Some(i) = self.constants.iter().position(|c| c.same_as(&value)) {
            return i as u16;
        }
        assert!(
            self.constants.len() <= MAX_POOL_INDEX,
            "constant pool is full ({} entries)",
            self.constants.len()
        );
        self.constants.push(value);
        (self.constants.len() - 1) as u16
    }

    /// 添加名字并返回索引
    ///
    /// # Panics
    ///
    /// 名字表超过 u16 索引范围时 panic
    pub fn add_name(&mut self, name: &str) -> u16 {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return i as u16;
        }
        assert!(
            self.names.len() <= MAX_POOL_INDEX,
            "name table is full ({} entries)",
            self.names.len()
        );
        self.names.push(name.to_string());
        (self.names.len() - 1) as u16
    }

    /// 写入常量加载指令
    pub fn write_constant(&mut self, value: impl Into<Constant>) -> &mut Self {
        let index = self.add_constant(value.into());
        self.write_op(OpCode::Const);
        self.write_u16(index);
        self
    }

    /// 写入带名字操作数的指令（LoadName / StoreName / LoadAttr / ImportName）
    pub fn write_named(&mut self, op: OpCode, name: &str) -> &mut Self {
        let index = self.add_name(name);
        self.write_op(op);
        self.write_u16(index);
        self
    }

    pub fn write_build_list(&mut self, count: u16) -> &mut Self {
        self.write_op(OpCode::BuildList);
        self.write_u16(count);
        self
    }

    /// 写入无操作数指令
    pub fn write_simple(&mut self, op: OpCode) -> &mut Self {
        self.write_op(op);
        self
    }

    /// `name = value`
    pub fn assign(&mut self, name: &str, value: impl Into<Constant>) -> &mut Self {
        self.write_constant(value).write_named(OpCode::StoreName, name)
    }

    /// `import module` 并把结果绑定到 `binding`
    pub fn import(&mut self, module: &str, binding: &str) -> &mut Self {
        self.write_named(OpCode::ImportName, module)
            .write_named(OpCode::StoreName, binding)
    }

    /// `raise message`
    pub fn raise(&mut self, message: &str) -> &mut Self {
        self.write_constant(message).write_simple(OpCode::Raise)
    }

    /// 补上结尾的 Return 并取出结果
    pub fn finish(&mut self) -> CodeUnit {
        if self.code.last() != Some(&(OpCode::Return as u8)) {
            self.write_op(OpCode::Return);
        }
        std::mem::take(self)
    }

    /// 读取 ip 处的 16 位操作数
    #[inline]
    pub fn read_u16(&self, ip: usize) -> u16 {
        u16::from_be_bytes([self.code[ip], self.code[ip + 1]])
    }
}

impl fmt::Display for CodeUnit {
    /// 反汇编输出
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ip = 0;
        while ip < self.code.len() {
            let Ok(op) = OpCode::try_from(self.code[ip]) else {
                writeln!(f, "{:04} <invalid 0x{:02X}>", ip, self.code[ip])?;
                ip += 1;
                continue;
            };
            if op.operand_width() == 2 && ip + 2 < self.code.len() {
                let operand = self.read_u16(ip + 1) as usize;
                let detail = match op {
                    OpCode::Const => self.constants.get(operand).map(|c| format!("{:?}", c)),
                    OpCode::BuildList => Some(operand.to_string()),
                    _ => self.names.get(operand).cloned(),
                };
                writeln!(f, "{:04} {:?} {}", ip, op, detail.unwrap_or_default())?;
            } else {
                writeln!(f, "{:04} {:?}", ip, op)?;
            }
            ip += 1 + op.operand_width();
        }
        Ok(())
    }
}
