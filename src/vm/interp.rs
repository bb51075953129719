//! 模块代码解释器
//!
//! 在模块命名空间上执行一个代码单元。只有模块顶层语义：
//! 常量、名字读写、属性访问、列表、导入和抛出错误。

use std::sync::Arc;

use tracing::trace;

use crate::compiler::{CodeUnit, OpCode};
use crate::error::RuntimeError;
use crate::host::Host;
use super::{Module, Value};

/// 在 `module` 的命名空间里执行 `unit`
pub fn exec_code(host: &Host, unit: &CodeUnit, module: &Arc<Module>) -> Result<(), RuntimeError> {
    Interpreter::new(host, unit, module).run()
}

/// 解释器状态
struct Interpreter<'a> {
    host: &'a Host,
    unit: &'a CodeUnit,
    module: &'a Arc<Module>,
    ip: usize,
    stack: Vec<Value>,
}

impl<'a> Interpreter<'a> {
    fn new(host: &'a Host, unit: &'a CodeUnit, module: &'a Arc<Module>) -> Self {
        Self {
            host,
            unit,
            module,
            ip: 0,
            stack: Vec::with_capacity(16),
        }
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        // 走到代码末尾等同于 Return
        while self.ip < self.unit.code.len() {
            let offset = self.ip;
            let byte = self.read_byte();
            let op = OpCode::try_from(byte).map_err(|_| RuntimeError::InvalidCode { offset })?;
            trace!(module = self.module.name(), offset, ?op, "exec");

            match op {
                OpCode::Const => {
                    let index = self.read_u16()? as usize;
                    let value = self
                        .unit
                        .constants
                        .get(index)
                        .ok_or(RuntimeError::InvalidCode { offset })?
                        .to_value();
                    self.push(value);
                }
                OpCode::Pop => {
                    self.pop()?;
                }
                OpCode::LoadName => {
                    let name = self.read_name(offset)?;
                    let value = self
                        .module
                        .get(name)
                        .ok_or_else(|| RuntimeError::NameError(name.to_string()))?;
                    self.push(value);
                }
                OpCode::StoreName => {
                    let name = self.read_name(offset)?;
                    let value = self.pop()?;
                    self.module.set(name, value);
                }
                OpCode::BuildList => {
                    let count = self.read_u16()? as usize;
                    if count > self.stack.len() {
                        return Err(RuntimeError::StackUnderflow);
                    }
                    let items = self.stack.split_off(self.stack.len() - count);
                    self.push(Value::List(items));
                }
                OpCode::LoadAttr => {
                    let attr = self.read_name(offset)?;
                    let target = self.pop()?;
                    let value = match &target {
                        Value::Module(m) => m.get(attr),
                        _ => None,
                    };
                    let value = value.ok_or_else(|| RuntimeError::AttributeError {
                        owner: target.to_string(),
                        attr: attr.to_string(),
                    })?;
                    self.push(value);
                }
                OpCode::ImportName => {
                    let name = self.read_name(offset)?;
                    let module = self.host.import(name)?;
                    self.push(Value::Module(module));
                }
                OpCode::Return => return Ok(()),
                OpCode::Raise => {
                    let message = self.pop()?;
                    return Err(RuntimeError::Raised(message.to_string()));
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn read_byte(&mut self) -> u8 {
        let byte = self.unit.code[self.ip];
        self.ip += 1;
        byte
    }

    /// 读取一个 u16（大端序）
    fn read_u16(&mut self) -> Result<u16, RuntimeError> {
        if self.ip + 2 > self.unit.code.len() {
            return Err(RuntimeError::InvalidCode { offset: self.ip });
        }
        let value = self.unit.read_u16(self.ip);
        self.ip += 2;
        Ok(value)
    }

    fn read_name(&mut self, offset: usize) -> Result<&'a str, RuntimeError> {
        let index = self.read_u16()? as usize;
        let unit: &'a CodeUnit = self.unit;
        unit.names
            .get(index)
            .map(String::as_str)
            .ok_or(RuntimeError::InvalidCode { offset })
    }

    #[inline]
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    #[inline]
    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }
}
