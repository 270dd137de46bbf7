//! 传输层错误类型定义

use strider_bus::BusError;
use strider_protocol::ProtocolError;
use thiserror::Error;

/// 传输层错误类型
///
/// 这里的所有变体都是总线级（而非单伺服级）故障：单个伺服在窗口内
/// 不应答只是当周期缺一条应答，不经过错误通道。
#[derive(Error, Debug)]
pub enum TransportError {
    /// 总线驱动错误
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// 协议解析错误（应答失步）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 指令指向了拓扑之外的伺服
    #[error("Servo {id} is not in the configured topology")]
    UnknownServo { id: u8 },

    /// 总线工作线程已退出
    #[error("Bus {bus} worker is gone (thread exited)")]
    WorkerGone { bus: u8 },

    /// 总线批次未在期限内完成
    #[error("Bus {bus} did not complete its transaction batch in time")]
    CycleTimeout { bus: u8 },

    /// 拓扑非法
    #[error("Invalid topology: {0}")]
    Topology(String),
}
