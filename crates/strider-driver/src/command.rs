//! 周期事务的指令/应答类型与 `Transport` trait

use crate::error::TransportError;
use strider_protocol::{BusFrame, PositionCommand, RegisterValues, StopCommand};

/// 一条发往单个伺服的指令（每周期每伺服一条，用后即弃）
#[derive(Debug, Clone, Copy)]
pub struct ServoCommand {
    /// 目标伺服地址
    pub id: u8,
    /// 已组装的线路帧
    pub frame: BusFrame,
}

impl ServoCommand {
    /// 位置指令
    pub fn position(id: u8, command: &PositionCommand) -> Self {
        Self {
            id,
            frame: command.to_frame(id),
        }
    }

    /// 停止指令（清故障，无运动授权）
    pub fn stop(id: u8) -> Self {
        Self {
            id,
            frame: StopCommand::new().to_frame(id),
        }
    }
}

/// 单个伺服的事务结果（每周期零或一条）
#[derive(Debug, Clone)]
pub struct ServoReply {
    /// 应答来源伺服
    pub id: u8,
    /// 解码后的寄存器值（可能是查询表的子集）
    pub values: RegisterValues,
}

/// 周期事务接口
///
/// 采集回路通过该 trait 驱动传输层，测试可以注入脚本化实现。
pub trait Transport {
    /// 执行一次周期事务
    ///
    /// 不同总线上的指令并行收发，同总线内串行；所有总线的子事务
    /// 完成（或超时）后才返回。应答顺序不保证，调用方必须按
    /// `ServoReply::id` 索引。
    ///
    /// # 返回
    /// - `Ok(replies)`: 每个伺服至多一条应答；窗口内沉默的伺服没有条目
    /// - `Err(_)`: 总线级故障（致命，调用方应终止本次运行）
    fn cycle(&mut self, commands: &[ServoCommand]) -> Result<Vec<ServoReply>, TransportError>;

    /// 对拓扑内全部伺服各发送一条停止指令（清除锁存故障）
    ///
    /// 不等待应答；是否有伺服确认不影响结果。
    fn stop_all(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_protocol::OPCODE_STOP;

    #[test]
    fn test_servo_command_stop() {
        let cmd = ServoCommand::stop(12);
        assert_eq!(cmd.id, 12);
        assert_eq!(cmd.frame.payload(), &[OPCODE_STOP]);
    }

    #[test]
    fn test_servo_command_position_carries_id() {
        let cmd = ServoCommand::position(13, &PositionCommand::new(0.1));
        assert_eq!(cmd.id, 13);
        assert_eq!(cmd.frame.id, 13);
    }
}
