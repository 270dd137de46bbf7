//! SocketCAN (CAN FD) 总线适配器实现
//!
//! 每条物理总线对应一个内核 CAN FD 接口。伺服按地址映射到帧 ID：
//!
//! ```text
//! 请求帧 ID = 0x100 | servo_id
//! 应答帧 ID = 0x200 | servo_id
//! ```
//!
//! ## 依赖
//!
//! - `socketcan` crate（CAN FD socket）
//! - 接口必须已配置并启动（通过 `ip link` 命令，MTU 72）
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **波特率**：由系统工具（`ip link`）配置，不在应用层设置

use crate::{BusAdapter, BusDeviceError, BusDeviceErrorKind, BusError, BusFrame};
use socketcan::{CanAnyFrame, CanFdFrame, CanFdSocket, EmbeddedFrame, Frame, Socket, StandardId};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// 请求帧 ID 基址
pub const REQUEST_ID_BASE: u16 = 0x100;
/// 应答帧 ID 基址
pub const REPLY_ID_BASE: u16 = 0x200;

/// 伺服地址对应的请求帧 ID
pub fn request_id(servo_id: u8) -> u16 {
    REQUEST_ID_BASE | servo_id as u16
}

/// 伺服地址对应的应答帧 ID
pub fn reply_id(servo_id: u8) -> u16 {
    REPLY_ID_BASE | servo_id as u16
}

/// SocketCAN FD 适配器
///
/// 实现 `BusAdapter` trait，一个实例独占一个 CAN FD 接口。
pub struct SocketCanFdAdapter {
    socket: CanFdSocket,
    /// 接口名称（如 "can0"）
    interface: String,
}

impl SocketCanFdAdapter {
    /// 打开 CAN FD 接口
    ///
    /// 打开 socket 之前检查接口是否存在且已启动，接口缺失或未启动时
    /// 返回带修复提示的错误信息。
    ///
    /// # 错误
    /// - `BusError::Device`: 接口不存在 / 未启动 / 无法打开
    pub fn new(interface: impl Into<String>) -> Result<Self, BusError> {
        let interface = interface.into();

        check_interface_status(&interface)?;

        let socket = CanFdSocket::open(&interface).map_err(|e| {
            BusError::Device(BusDeviceError::new(
                BusDeviceErrorKind::Backend,
                format!("Failed to open CAN FD interface '{}': {}", interface, e),
            ))
        })?;

        trace!("CAN FD interface '{}' opened", interface);

        Ok(Self { socket, interface })
    }

    /// 接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn write_request(&mut self, frame: BusFrame) -> Result<(), BusError> {
        let id = StandardId::new(request_id(frame.id)).ok_or_else(|| {
            BusError::Device(BusDeviceError::new(
                BusDeviceErrorKind::InvalidFrame,
                format!("Servo id {} out of standard-id range", frame.id),
            ))
        })?;

        let fd_frame = CanFdFrame::new(id, frame.payload()).ok_or_else(|| {
            BusError::Device(BusDeviceError::new(
                BusDeviceErrorKind::InvalidFrame,
                format!("Payload of {} bytes rejected by CAN FD", frame.len),
            ))
        })?;

        self.socket.write_frame::<CanAnyFrame>(&fd_frame.into())?;
        Ok(())
    }
}

impl BusAdapter for SocketCanFdAdapter {
    fn transact(
        &mut self,
        request: BusFrame,
        timeout: Duration,
    ) -> Result<Option<BusFrame>, BusError> {
        let servo_id = request.id;
        self.write_request(request)?;

        let expected_id = reply_id(servo_id) as u32;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.socket.set_read_timeout(remaining)?;

            let any = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Ok(None);
                },
                Err(e) => return Err(BusError::Io(e)),
            };

            let (raw_id, data) = match &any {
                CanAnyFrame::Fd(frame) => (frame.raw_id(), frame.data().to_vec()),
                CanAnyFrame::Normal(frame) => (frame.raw_id(), frame.data().to_vec()),
                CanAnyFrame::Remote(_) => continue,
                CanAnyFrame::Error(frame) => {
                    warn!(interface = %self.interface, "CAN error frame: {:?}", frame);
                    continue;
                },
            };

            if raw_id == expected_id {
                return Ok(Some(BusFrame::new(servo_id, &data)));
            }

            // 上个周期的迟到应答或别的伺服的帧，丢弃继续等
            trace!(
                interface = %self.interface,
                id = raw_id,
                "Discarding unrelated frame while waiting for 0x{:X}",
                expected_id
            );
        }
    }

    fn send(&mut self, frame: BusFrame) -> Result<(), BusError> {
        self.write_request(frame)
    }
}

/// 检查接口是否存在且已启动（仅检查，不自动配置）
fn check_interface_status(interface: &str) -> Result<(), BusError> {
    let sysfs = Path::new("/sys/class/net").join(interface);
    if !sysfs.exists() {
        return Err(BusError::Device(BusDeviceError::new(
            BusDeviceErrorKind::NotFound,
            format!(
                "CAN interface '{}' does not exist. Create/configure it first:\n  sudo ip link set {} type can bitrate 1000000 dbitrate 5000000 fd on\n  sudo ip link set up {}",
                interface, interface, interface
            ),
        )));
    }

    // vcan 等虚拟接口的 operstate 是 "unknown"，只把明确的 "down" 当错误
    if let Ok(state) = std::fs::read_to_string(sysfs.join("operstate"))
        && state.trim() == "down"
    {
        return Err(BusError::Device(BusDeviceError::new(
            BusDeviceErrorKind::Backend,
            format!(
                "CAN interface '{}' exists but is not UP. Start it first:\n  sudo ip link set up {}",
                interface, interface
            ),
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_mapping() {
        assert_eq!(request_id(12), 0x10C);
        assert_eq!(reply_id(12), 0x20C);
        assert_eq!(request_id(13), 0x10D);
        assert_eq!(reply_id(13), 0x20D);
    }

    #[test]
    fn test_missing_interface_is_not_found() {
        let err = check_interface_status("stridercan-does-not-exist").unwrap_err();
        match err {
            BusError::Device(device) => {
                assert_eq!(device.kind, BusDeviceErrorKind::NotFound);
                assert!(device.is_fatal());
            },
            other => panic!("Unexpected error: {:?}", other),
        }
    }
}
