//! # Strider Bus Adapter Layer
//!
//! 总线硬件抽象层。一条总线上挂多个伺服，按整数地址寻址；
//! 适配器负责一次「请求 → 应答」往返，不理解载荷语义。

use std::time::Duration;
use thiserror::Error;

// 重新导出 strider-protocol 中的 BusFrame
pub use strider_protocol::BusFrame;

#[cfg(target_os = "linux")]
pub mod socketcan_fd;

#[cfg(target_os = "linux")]
pub use socketcan_fd::SocketCanFdAdapter;

/// 总线适配层统一错误类型
///
/// 注意：单个伺服在窗口内不应答不是错误（`transact` 返回 `Ok(None)`）。
/// 这里的错误都是总线级故障，上层视为致命。
#[derive(Error, Debug)]
pub enum BusError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] BusDeviceError),
    #[error("Write timeout")]
    Timeout,
    #[error("Bus not started")]
    NotStarted,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDeviceErrorKind {
    Unknown,
    NotFound,
    AccessDenied,
    Busy,
    UnsupportedConfig,
    InvalidFrame,
    Backend,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct BusDeviceError {
    pub kind: BusDeviceErrorKind,
    pub message: String,
}

impl BusDeviceError {
    pub fn new(kind: BusDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            BusDeviceErrorKind::NotFound | BusDeviceErrorKind::AccessDenied
        )
    }
}

impl From<String> for BusDeviceError {
    fn from(message: String) -> Self {
        Self::new(BusDeviceErrorKind::Unknown, message)
    }
}

impl From<&str> for BusDeviceError {
    fn from(message: &str) -> Self {
        Self::new(BusDeviceErrorKind::Unknown, message)
    }
}

/// 总线适配器接口
///
/// 实现者持有一条物理总线的独占所有权。同一总线上的事务串行执行；
/// 不同总线的适配器互不相关，可以在各自线程里真并行。
pub trait BusAdapter: Send {
    /// 一次寻址往返：发送请求帧，在窗口内等待同地址的应答帧
    ///
    /// # 返回
    /// - `Ok(Some(frame))`: 收到应答
    /// - `Ok(None)`: 窗口内无应答（预期情况，非错误）
    /// - `Err(_)`: 总线级故障
    fn transact(
        &mut self,
        request: BusFrame,
        timeout: Duration,
    ) -> Result<Option<BusFrame>, BusError>;

    /// 只发送，不等待应答（用于停止广播等无应答指令）
    fn send(&mut self, frame: BusFrame) -> Result<(), BusError>;
}
