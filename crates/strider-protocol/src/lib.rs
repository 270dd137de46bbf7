//! # Strider Protocol
//!
//! 外骨骼伺服总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `registers`: 寄存器与数值编码（分辨率）定义
//! - `command`: 控制帧构建（停止指令 / 位置指令）
//! - `reply`: 应答帧解析（寄存器值解码）
//!
//! ## 字节序
//!
//! 协议使用高位在前（大端字节序）。本模块提供了字节序转换工具函数。

pub mod command;
pub mod registers;
pub mod reply;

// 重新导出常用类型
pub use command::*;
pub use registers::*;
pub use reply::*;

use thiserror::Error;

/// 单帧最大有效载荷（字节）
///
/// 位置指令（12 字节设定值 + 查询表）和最大应答（全部寄存器按 F32 编码）
/// 都必须放进一帧。CAN FD 的 64 字节数据段足够容纳。
pub const MAX_PAYLOAD: usize = 24;

/// 总线帧的统一抽象
///
/// `BusFrame` 是协议层和硬件层之间的中间抽象：
/// - **层次解耦**：协议层不依赖底层总线实现
/// - **定长数据**：避免堆分配，适合高频收发场景
///
/// `id` 是帧内的伺服地址（1..=N），方向（请求/应答）由底层适配器
/// 在物理寻址时编码，协议层不关心。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFrame {
    /// 伺服地址
    pub id: u8,

    /// 帧数据（定长，未使用部分为 0）
    pub data: [u8; MAX_PAYLOAD],

    /// 有效数据长度 (0..=MAX_PAYLOAD)
    pub len: u8,
}

impl BusFrame {
    /// 构造新帧，超出 `MAX_PAYLOAD` 的数据被截断
    pub fn new(id: u8, data: &[u8]) -> Self {
        let mut fixed_data = [0u8; MAX_PAYLOAD];
        let len = data.len().min(MAX_PAYLOAD);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
        }
    }

    /// 获取有效载荷切片
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },

    #[error("Truncated reply entry for register {register:?}")]
    TruncatedEntry { register: Register },
}

/// 字节序转换工具函数
///
/// 协议使用高位在前（大端字节序），这些函数用于在协议层进行字节序转换。
///
/// 大端字节序转 i16
pub fn bytes_to_i16_be(bytes: [u8; 2]) -> i16 {
    i16::from_be_bytes(bytes)
}

/// 大端字节序转 i32
pub fn bytes_to_i32_be(bytes: [u8; 4]) -> i32 {
    i32::from_be_bytes(bytes)
}

/// 大端字节序转 f32
pub fn bytes_to_f32_be(bytes: [u8; 4]) -> f32 {
    f32::from_be_bytes(bytes)
}

/// f32 转大端字节序
pub fn f32_to_bytes_be(value: f32) -> [u8; 4] {
    value.to_be_bytes()
}
