//! 外部力传感器读取
//!
//! 传感器通过点对点串口吐出以换行结尾的文本读数。回路每周期做一次
//! **非阻塞**轮询：有完整行就取最新一行，没有就立刻返回——绝不能
//! 因为传感器慢而拖住定时回路。
//!
//! 链路故障按"本周期无新数据"降级处理，永不致命：力遥测是次要
//! 数据，伺服安全优先。

use std::io::Read;
use std::time::Duration;
use tracing::warn;

use crate::config::SerialConfig;

/// 行式力读数来源
///
/// 回路只依赖这个 trait，测试可以注入内存实现。
pub trait ForceSource {
    /// 非阻塞轮询：返回自上次调用以来到达的最新完整行
    /// （去掉行尾的 `\r\n`），没有新行时返回 `None`。
    fn poll_line(&mut self) -> Option<String>;
}

/// 串口力传感器
pub struct SerialForceSensor {
    port: Box<dyn serialport::SerialPort>,
    /// 未凑满一行的字节暂存
    buf: Vec<u8>,
    /// 链路故障只告警一次，恢复后复位
    fault_logged: bool,
}

impl SerialForceSensor {
    /// 打开串口并清空输入缓冲区（丢弃运行开始之前的陈旧字节）
    pub fn open(config: &SerialConfig) -> Result<Self, serialport::Error> {
        let port = serialport::new(&config.port, config.baud)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()?;
        port.clear(serialport::ClearBuffer::Input)?;

        Ok(Self {
            port,
            buf: Vec::new(),
            fault_logged: false,
        })
    }
}

impl ForceSource for SerialForceSensor {
    fn poll_line(&mut self) -> Option<String> {
        // 先确认有字节可读，避免在定时回路里触发阻塞读
        let available = match self.port.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => {
                if !self.fault_logged {
                    warn!("Force sensor link error, degrading to no-data: {}", e);
                    self.fault_logged = true;
                }
                return None;
            },
        };

        if available > 0 {
            let mut chunk = vec![0u8; available];
            match self.port.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    self.fault_logged = false;
                },
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {},
                Err(e) => {
                    if !self.fault_logged {
                        warn!("Force sensor read error, degrading to no-data: {}", e);
                        self.fault_logged = true;
                    }
                    return None;
                },
            }
        }

        take_latest_line(&mut self.buf)
    }
}

/// 从暂存缓冲取走最新一条完整行，保留未完成的尾巴
///
/// 一次轮询间到达多行时只保留最新的一行（旧行已经过时）。
pub(crate) fn take_latest_line(buf: &mut Vec<u8>) -> Option<String> {
    let last_newline = buf.iter().rposition(|&b| b == b'\n')?;

    let mut complete: Vec<u8> = buf.drain(..=last_newline).collect();
    // 只留最后一条非空行
    while complete.last() == Some(&b'\n') || complete.last() == Some(&b'\r') {
        complete.pop();
    }
    let start = complete.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let line = String::from_utf8_lossy(&complete[start..]).trim_end_matches('\r').to_string();

    Some(line)
}
