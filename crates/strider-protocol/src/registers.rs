//! 寄存器与数值编码定义
//!
//! 每个伺服暴露一组只读反馈寄存器。请求帧中携带查询表（`QuerySpec`），
//! 设备按表中的编码把寄存器值放进应答帧。定点编码的物理量比例因子
//! 由 `(寄存器, 分辨率)` 二元组唯一确定，解码严格确定（逐比特可复现）。

use crate::ProtocolError;

/// 反馈寄存器标识
///
/// 一个查询表项在线路上占一个字节：高 6 位是寄存器号，低 2 位是分辨率。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// 运行模式
    Mode = 0x00,
    /// 位置（单位：转）
    Position = 0x01,
    /// 速度（单位：转/秒）
    Velocity = 0x02,
    /// 扭矩（单位：N·m）
    Torque = 0x03,
    /// q 轴电流（单位：A），预留
    QCurrent = 0x04,
    /// d 轴电流（单位：A），预留
    DCurrent = 0x05,
    /// 母线电压（单位：V），预留
    Voltage = 0x06,
    /// 温度（单位：℃），预留
    Temperature = 0x07,
}

impl TryFrom<u8> for Register {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Register::Mode),
            0x01 => Ok(Register::Position),
            0x02 => Ok(Register::Velocity),
            0x03 => Ok(Register::Torque),
            0x04 => Ok(Register::QCurrent),
            0x05 => Ok(Register::DCurrent),
            0x06 => Ok(Register::Voltage),
            0x07 => Ok(Register::Temperature),
            _ => Err(ProtocolError::InvalidValue {
                field: "Register".to_string(),
                value,
            }),
        }
    }
}

/// 数值编码（分辨率）
///
/// 2 比特编码，决定应答中一个寄存器值占用的字节数和定点比例。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Resolution {
    /// 8 位定点
    Int8 = 0b00,
    /// 16 位定点
    Int16 = 0b01,
    /// 32 位定点
    Int32 = 0b10,
    /// IEEE-754 单精度浮点（原始值，无比例）
    #[default]
    Float = 0b11,
}

impl Resolution {
    /// 从 2 比特线路编码构造（高位被屏蔽）
    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0b00 => Resolution::Int8,
            0b01 => Resolution::Int16,
            0b10 => Resolution::Int32,
            _ => Resolution::Float,
        }
    }

    /// 值在应答中占用的字节数
    pub fn width(self) -> usize {
        match self {
            Resolution::Int8 => 1,
            Resolution::Int16 => 2,
            Resolution::Int32 => 4,
            Resolution::Float => 4,
        }
    }
}

impl Register {
    /// 定点编码的物理量比例因子（LSB 对应的物理量）
    ///
    /// `Float` 编码不经过比例（调用方不会用到返回值），统一返回 1.0。
    pub fn fixed_scale(self, resolution: Resolution) -> f64 {
        use Register::*;
        use Resolution::*;

        match (self, resolution) {
            (Position, Int8) => 0.01,
            (Position, Int16) => 0.0001,
            (Position, Int32) => 0.00001,

            (Velocity, Int8) => 0.1,
            (Velocity, Int16) => 0.00025,
            (Velocity, Int32) => 0.00001,

            (Torque, Int8) => 0.5,
            (Torque, Int16) => 0.01,
            (Torque, Int32) => 0.001,

            (QCurrent | DCurrent, Int8) => 1.0,
            (QCurrent | DCurrent, Int16) => 0.1,
            (QCurrent | DCurrent, Int32) => 0.001,

            (Voltage, Int8) => 0.5,
            (Voltage, Int16) => 0.1,
            (Voltage, Int32) => 0.001,

            // 模式 / 温度按原始计数透传
            (Mode | Temperature, _) => 1.0,

            (_, Float) => 1.0,
        }
    }
}

/// 查询表：请求应答中携带哪些寄存器、以何种编码
///
/// 线路编码：每项一个字节，`(register << 2) | resolution`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub entries: Vec<(Register, Resolution)>,
}

impl QuerySpec {
    /// 空查询表（不请求应答）
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 追加一个查询项
    pub fn with(mut self, register: Register, resolution: Resolution) -> Self {
        self.entries.push((register, resolution));
        self
    }

    /// 查询表项数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 单个查询项的线路字节
    pub fn entry_byte(register: Register, resolution: Resolution) -> u8 {
        ((register as u8) << 2) | (resolution as u8)
    }

    /// 把查询表编码进缓冲区
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        for (register, resolution) in &self.entries {
            out.push(Self::entry_byte(*register, *resolution));
        }
    }
}

impl Default for QuerySpec {
    /// 采集回路的固定寄存器集：位置 / 速度 / 扭矩，浮点编码
    fn default() -> Self {
        Self::empty()
            .with(Register::Position, Resolution::Float)
            .with(Register::Velocity, Resolution::Float)
            .with(Register::Torque, Resolution::Float)
    }
}
