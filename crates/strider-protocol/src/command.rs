//! 控制帧构建
//!
//! 指令构建只负责组装线路层的请求意图，不做物理量边界检查
//! （设定值限幅是轨迹生成器的职责）。

use crate::registers::QuerySpec;
use crate::{BusFrame, f32_to_bytes_be};

/// 操作码：停止指令
pub const OPCODE_STOP: u8 = 0x00;
/// 操作码：位置指令
pub const OPCODE_POSITION: u8 = 0x01;

/// 停止指令
///
/// 零设定值、无运动授权。设备收到后清除锁存的看门狗故障并进入待机。
/// 启动序列对所有伺服各发送一次，用于清除上一次运行遗留的故障。
#[derive(Debug, Clone, Copy, Default)]
pub struct StopCommand;

impl StopCommand {
    pub fn new() -> Self {
        Self
    }

    /// 组装为线路帧：`[OPCODE_STOP]`
    pub fn to_frame(self, servo_id: u8) -> BusFrame {
        BusFrame::new(servo_id, &[OPCODE_STOP])
    }
}

/// 位置指令
///
/// 线路布局：
///
/// ```text
/// [OPCODE_POSITION]
/// [position     f32 BE]   目标位置（转）
/// [velocity     f32 BE]   目标速度（转/秒）
/// [ff_torque    f32 BE]   前馈扭矩（N·m）
/// [n_query      u8]       查询表项数（0 = 不请求应答）
/// [entries ...]           查询表，每项一个字节
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PositionCommand {
    /// 目标位置（转）
    pub position: f64,
    /// 目标速度（转/秒）
    pub velocity: f64,
    /// 前馈扭矩（N·m）
    pub ff_torque: f64,
    /// 查询表（`None` = 不请求应答）
    pub query: Option<QuerySpec>,
}

impl PositionCommand {
    /// 位置设定值 + 默认查询表（位置/速度/扭矩，浮点编码）
    pub fn new(position: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            ff_torque: 0.0,
            query: Some(QuerySpec::default()),
        }
    }

    /// 不请求应答的位置设定值
    pub fn without_query(position: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            ff_torque: 0.0,
            query: None,
        }
    }

    /// 替换查询表
    pub fn with_query(mut self, query: QuerySpec) -> Self {
        self.query = Some(query);
        self
    }

    /// 组装为线路帧
    pub fn to_frame(&self, servo_id: u8) -> BusFrame {
        let mut data = Vec::with_capacity(14 + self.query.as_ref().map_or(0, QuerySpec::len));
        data.push(OPCODE_POSITION);
        data.extend_from_slice(&f32_to_bytes_be(self.position as f32));
        data.extend_from_slice(&f32_to_bytes_be(self.velocity as f32));
        data.extend_from_slice(&f32_to_bytes_be(self.ff_torque as f32));

        match &self.query {
            Some(query) => {
                data.push(query.len() as u8);
                query.encode_into(&mut data);
            },
            None => data.push(0),
        }

        BusFrame::new(servo_id, &data)
    }
}
