//! 字节码序列化
//!
//! `.qlc` blob 的布局（全部大端序）：
//!
//! ```text
//! magic     u32   0x514C_4300 ("QLC\0")
//! version   u16
//! flags     u16   目前必须为 0
//! consts    u32 count, 然后每项: tag u8 + 数据
//! names     u32 count, 然后每项: u32 len + utf-8
//! code      u32 len + 字节
//! ```
//!
//! 反序列化会校验指令流和操作数索引，任何截断、未知标签或多余字节都视为损坏。

use crate::error::DecodeError;
use super::bytecode::{CodeUnit, Constant, OpCode};

/// 字节码魔数: "QLC\0"
pub const BYTECODE_MAGIC: u32 = 0x514C_4300;

/// 当前格式版本
pub const FORMAT_VERSION: u16 = 1;

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STR: u8 = 0x04;

/// 序列化代码单元
pub fn dumps(unit: &CodeUnit) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + unit.code.len());
    out.extend_from_slice(&BYTECODE_MAGIC.to_be_bytes());
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());

    out.extend_from_slice(&(unit.constants.len() as u32).to_be_bytes());
    for constant in &unit.constants {
        match constant {
            Constant::Null => out.push(TAG_NULL),
            Constant::Bool(b) => {
                out.push(TAG_BOOL);
                out.push(*b as u8);
            }
            Constant::Int(i) => {
                out.push(TAG_INT);
                out.extend_from_slice(&i.to_be_bytes());
            }
            Constant::Float(f) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&f.to_be_bytes());
            }
            Constant::Str(s) => {
                out.push(TAG_STR);
                write_str(&mut out, s);
            }
        }
    }

    out.extend_from_slice(&(unit.names.len() as u32).to_be_bytes());
    for name in &unit.names {
        write_str(&mut out, name);
    }

    out.extend_from_slice(&(unit.code.len() as u32).to_be_bytes());
    out.extend_from_slice(&unit.code);
    out
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// 反序列化代码单元
pub fn loads(bytes: &[u8]) -> Result<CodeUnit, DecodeError> {
    let mut reader = Reader { bytes, cursor: 0 };

    let magic = reader.read_u32()?;
    if magic != BYTECODE_MAGIC {
        return Err(DecodeError::BadMagic(magic));
    }
    let version = reader.read_u16()?;
    if version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    // flags
    reader.read_u16()?;

    let constant_count = reader.read_u32()? as usize;
    let mut constants = Vec::with_capacity(constant_count.min(1024));
    for _ in 0..constant_count {
        constants.push(reader.read_constant()?);
    }

    let name_count = reader.read_u32()? as usize;
    let mut names = Vec::with_capacity(name_count.min(1024));
    for _ in 0..name_count {
        names.push(reader.read_str()?);
    }

    let code_len = reader.read_u32()? as usize;
    let code = reader.take(code_len)?.to_vec();

    let trailing = bytes.len() - reader.cursor;
    if trailing != 0 {
        return Err(DecodeError::TrailingBytes(trailing));
    }

    let unit = CodeUnit { code, constants, names };
    verify(&unit)?;
    Ok(unit)
}

/// 校验指令流：操作码合法、操作数完整、索引在范围内
fn verify(unit: &CodeUnit) -> Result<(), DecodeError> {
    let mut ip = 0;
    while ip < unit.code.len() {
        let byte = unit.code[ip];
        let op = OpCode::try_from(byte)
            .map_err(|op| DecodeError::InvalidOpcode { op, offset: ip })?;

        let width = op.operand_width();
        if width > 0 && ip + width >= unit.code.len() {
            return Err(DecodeError::Truncated { offset: ip });
        }

        if width == 2 {
            let index = unit.read_u16(ip + 1) as usize;
            let limit = match op {
                OpCode::Const => unit.constants.len(),
                OpCode::BuildList => usize::MAX,
                _ => unit.names.len(),
            };
            if index >= limit {
                return Err(DecodeError::OperandOutOfRange { index, offset: ip });
            }
        }
        ip += 1 + width;
    }
    Ok(())
}

/// 带游标的只读字节读取器
struct Reader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(DecodeError::Truncated { offset: self.cursor })?;
        let slice = &self.bytes[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let offset = self.cursor;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    fn read_constant(&mut self) -> Result<Constant, DecodeError> {
        match self.read_u8()? {
            TAG_NULL => Ok(Constant::Null),
            TAG_BOOL => Ok(Constant::Bool(self.read_u8()? != 0)),
            TAG_INT => Ok(Constant::Int(self.read_u64()? as i64)),
            TAG_FLOAT => Ok(Constant::Float(f64::from_bits(self.read_u64()?))),
            TAG_STR => Ok(Constant::Str(self.read_str()?)),
            tag => Err(DecodeError::BadConstantTag(tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CodeUnit {
        CodeUnit::new()
            .assign("answer", 42i64)
            .assign("ratio", 0.5f64)
            .assign("flag", true)
            .assign("title", "embedded")
            .import("pkg.sub", "sub")
            .finish()
    }

    #[test]
    fn test_roundtrip_preserves_unit() {
        let unit = sample();
        assert_eq!(loads(&dumps(&unit)).unwrap(), unit);
    }

    #[test]
    fn test_every_truncation_is_rejected() {
        let blob = dumps(&sample());
        for len in 0..blob.len() {
            assert!(loads(&blob[..len]).is_err(), "prefix of {} bytes decoded", len);
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut blob = dumps(&sample());
        blob[0] ^= 0xFF;
        assert!(matches!(loads(&blob), Err(DecodeError::BadMagic(_))));
    }

    #[test]
    fn test_version_mismatch() {
        let mut blob = dumps(&sample());
        blob[5] = 9;
        assert!(matches!(loads(&blob), Err(DecodeError::UnsupportedVersion(9))));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut blob = dumps(&sample());
        blob.push(0);
        assert!(matches!(loads(&blob), Err(DecodeError::TrailingBytes(1))));
    }

    #[test]
    fn test_operand_out_of_range() {
        let unit = CodeUnit {
            code: vec![OpCode::LoadName as u8, 0, 3, OpCode::Return as u8],
            constants: vec![],
            names: vec!["only".to_string()],
        };
        assert!(matches!(
            loads(&dumps(&unit)),
            Err(DecodeError::OperandOutOfRange { index: 3, offset: 0 })
        ));
    }

    #[test]
    fn test_invalid_opcode() {
        let unit = CodeUnit {
            code: vec![OpCode::Pop as u8, 7],
            constants: vec![],
            names: vec![],
        };
        assert!(matches!(
            loads(&dumps(&unit)),
            Err(DecodeError::InvalidOpcode { op: 7, offset: 1 })
        ));
    }
}
