//! 应答帧解析
//!
//! 应答载荷是若干个自描述条目的顺序拼接：
//!
//! ```text
//! [(register << 2) | resolution][value bytes ...]  × N
//! ```
//!
//! 设备只应答它支持的寄存器，因此条目集合可以是查询表的真子集——
//! 缺失的寄存器直接不出现在解码结果里，不是错误。未知寄存器号或
//! 被截断的条目说明协议失步，按错误上报（上层视为致命）。

use crate::registers::{Register, Resolution};
use crate::{ProtocolError, bytes_to_f32_be, bytes_to_i16_be, bytes_to_i32_be};

/// 解码后的寄存器值集合
///
/// 条目数量很小（通常 3 个），用保序向量存储，按寄存器线性查找。
/// 重复条目后写覆盖先写。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterValues {
    entries: Vec<(Register, f64)>,
}

impl RegisterValues {
    /// 从应答载荷解码
    ///
    /// 解码是纯数值变换，对给定字节串和编码严格确定。
    ///
    /// # 错误
    /// - `ProtocolError::InvalidValue`: 未知寄存器号
    /// - `ProtocolError::TruncatedEntry`: 条目值字节不足
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut values = RegisterValues::default();
        let mut i = 0;

        while i < payload.len() {
            let tag = payload[i];
            let register = Register::try_from(tag >> 2)?;
            let resolution = Resolution::from_code(tag);
            i += 1;

            let width = resolution.width();
            if payload.len() < i + width {
                return Err(ProtocolError::TruncatedEntry { register });
            }

            let raw = &payload[i..i + width];
            let value = match resolution {
                Resolution::Int8 => {
                    (raw[0] as i8) as f64 * register.fixed_scale(resolution)
                },
                Resolution::Int16 => {
                    bytes_to_i16_be([raw[0], raw[1]]) as f64 * register.fixed_scale(resolution)
                },
                Resolution::Int32 => {
                    bytes_to_i32_be([raw[0], raw[1], raw[2], raw[3]]) as f64
                        * register.fixed_scale(resolution)
                },
                Resolution::Float => bytes_to_f32_be([raw[0], raw[1], raw[2], raw[3]]) as f64,
            };

            values.insert(register, value);
            i += width;
        }

        Ok(values)
    }

    /// 写入一个寄存器值（已存在则覆盖）
    pub fn insert(&mut self, register: Register, value: f64) {
        match self.entries.iter_mut().find(|(r, _)| *r == register) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((register, value)),
        }
    }

    /// 按寄存器查值
    pub fn get(&self, register: Register) -> Option<f64> {
        self.entries
            .iter()
            .find(|(r, _)| *r == register)
            .map(|(_, v)| *v)
    }

    /// 位置（转）
    pub fn position(&self) -> Option<f64> {
        self.get(Register::Position)
    }

    /// 速度（转/秒）
    pub fn velocity(&self) -> Option<f64> {
        self.get(Register::Velocity)
    }

    /// 扭矩（N·m）
    pub fn torque(&self) -> Option<f64> {
        self.get(Register::Torque)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Register, f64)> + '_ {
        self.entries.iter().copied()
    }
}
