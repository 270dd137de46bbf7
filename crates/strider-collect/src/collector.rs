//! 周期编排器
//!
//! 驱动「指令 → 事务 → 解码 → 打戳 → 落盘 → 睡眠」的确定性周期，
//! 同时守住三条硬约束：
//!
//! - 每个完成的周期**恰好**追加一条样本记录，时间戳单调不减；
//! - 单伺服缺应答只在记录里留空字段，绝不让周期崩溃；
//! - 周期超支时宁可整体落后，也不跳过落盘（睡眠量
//!   `max(0, period - elapsed_in_cycle)`，永不为负）。
//!
//! 状态机：`Uninitialized → FaultClearing → Running → Terminated`。
//! `Terminated` 只在致命的传输/落盘错误时进入；正常情况下回路一直
//! 运行到进程收到停止信号。

use crate::config::{Joint, ServoConfig};
use crate::error::CollectError;
use crate::force::ForceSource;
use crate::sink::{DatasetSink, SampleRecord};
use crate::trajectory::SineTrajectory;
use spin_sleep::SpinSleeper;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use strider_driver::{ServoCommand, Transport};
use strider_protocol::{PositionCommand, RegisterValues};
use tracing::{debug, error, info, trace};

/// 编排器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorPhase {
    /// 尚未启动
    Uninitialized,
    /// 正在发送停止指令清除锁存故障
    FaultClearing,
    /// 周期回路运行中
    Running,
    /// 因致命错误终止
    Terminated,
}

/// 一次运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// 完成的周期数（== 追加的样本行数）
    pub cycles: u64,
    /// 缺应答的伺服周期次数（每伺服每周期计一次）
    pub missed_replies: u64,
    /// 周期超支次数（忙时超过目标周期）
    pub overruns: u64,
}

struct ServoSlot {
    id: u8,
    joint: Joint,
    trajectory: SineTrajectory,
}

/// 周期编排器
///
/// 独占数据集句柄和传输会话；力传感器缺席时照常运行（Force 列留空）。
pub struct Collector<T: Transport, F: ForceSource> {
    transport: T,
    force: Option<F>,
    sink: DatasetSink,
    servos: Vec<ServoSlot>,
    episode: String,
    period: Duration,
    max_cycles: Option<u64>,
    phase: CollectorPhase,
}

impl<T: Transport, F: ForceSource> Collector<T, F> {
    pub fn new(
        transport: T,
        force: Option<F>,
        sink: DatasetSink,
        episode: impl Into<String>,
        period: Duration,
        servos: &[ServoConfig],
    ) -> Self {
        let servos = servos
            .iter()
            .map(|s| ServoSlot {
                id: s.id,
                joint: s.joint,
                trajectory: SineTrajectory::new(s.amplitude),
            })
            .collect();

        Self {
            transport,
            force,
            sink,
            servos,
            episode: episode.into(),
            period,
            max_cycles: None,
            phase: CollectorPhase::Uninitialized,
        }
    }

    /// 限定最大周期数（用于测试或定时采集，`None` = 无限运行）
    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// 当前状态
    pub fn phase(&self) -> CollectorPhase {
        self.phase
    }

    /// 运行采集回路（阻塞）
    ///
    /// 先对所有伺服发一次停止指令清除锁存故障（是否有确认不影响
    /// 进入周期阶段），然后以固定目标周期运行，直到 `shutdown` 置位、
    /// 达到 `max_cycles`，或发生致命错误。
    ///
    /// # 错误
    /// - `CollectError::Transport`: 总线级故障（已终止）
    /// - `CollectError::Sink`: 数据集写失败（已终止）
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<CycleStats, CollectError> {
        self.phase = CollectorPhase::FaultClearing;
        info!("Clearing latched servo faults (stop-all)");
        if let Err(e) = self.transport.stop_all() {
            self.phase = CollectorPhase::Terminated;
            error!("Stop-all transaction failed, aborting run: {}", e);
            return Err(e.into());
        }

        self.phase = CollectorPhase::Running;
        info!(
            episode = %self.episode,
            period_ms = self.period.as_millis() as u64,
            "Entering cyclic phase"
        );

        let sleeper = SpinSleeper::default();
        let mut stats = CycleStats::default();
        let mut last_force: Option<String> = None;
        let start = Instant::now();

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, leaving cyclic phase");
                break;
            }
            if let Some(max) = self.max_cycles
                && stats.cycles >= max
            {
                break;
            }

            let cycle_start = Instant::now();
            let t = start.elapsed().as_secs_f64();

            // 1. 轨迹 → 指令（每条都请求默认寄存器集的应答）
            let commands: Vec<ServoCommand> = self
                .servos
                .iter()
                .map(|slot| {
                    ServoCommand::position(
                        slot.id,
                        &PositionCommand::new(slot.trajectory.setpoint(t)),
                    )
                })
                .collect();

            // 2. 一次多总线事务；总线级故障终止运行
            let replies = match self.transport.cycle(&commands) {
                Ok(replies) => replies,
                Err(e) => {
                    self.phase = CollectorPhase::Terminated;
                    error!("Transport failure, aborting run: {}", e);
                    return Err(e.into());
                },
            };

            // 3. 应答顺序不保证且可能缺条目，按伺服地址索引
            let by_id: HashMap<u8, RegisterValues> =
                replies.into_iter().map(|r| (r.id, r.values)).collect();
            stats.missed_replies += self.servos.len().saturating_sub(by_id.len()) as u64;

            // 4. 轮询力传感器；没有新行就沿用上一条
            if let Some(force) = &mut self.force
                && let Some(line) = force.poll_line()
            {
                last_force = Some(line);
            }

            // 5. 组装并落盘（绝不跳过）
            let record = self.assemble_record(t, &by_id, last_force.clone());
            if let Err(e) = self.sink.append(&record) {
                self.phase = CollectorPhase::Terminated;
                error!("Dataset write failed, aborting run: {}", e);
                return Err(e.into());
            }
            stats.cycles += 1;

            // 6. 睡到下一个调度点：超支时落后而不丢样本
            let busy = cycle_start.elapsed();
            match self.period.checked_sub(busy) {
                Some(remaining) => sleeper.sleep(remaining),
                None => {
                    stats.overruns += 1;
                    trace!(busy_us = busy.as_micros() as u64, "cycle overrun");
                },
            }
        }

        debug!(
            cycles = stats.cycles,
            missed_replies = stats.missed_replies,
            overruns = stats.overruns,
            "Cyclic phase finished"
        );
        Ok(stats)
    }

    fn assemble_record(
        &self,
        t: f64,
        by_id: &HashMap<u8, RegisterValues>,
        force: Option<String>,
    ) -> SampleRecord {
        let mut record = SampleRecord {
            episode: self.episode.clone(),
            timestamp: t,
            position_shank: None,
            position_thigh: None,
            velocity_shank: None,
            velocity_thigh: None,
            torque_shank: None,
            torque_thigh: None,
            force,
        };

        for slot in &self.servos {
            // 缺应答的伺服：对应列保持 None（空字段哨兵）
            let Some(values) = by_id.get(&slot.id) else {
                continue;
            };
            match slot.joint {
                Joint::Shank => {
                    record.position_shank = values.position();
                    record.velocity_shank = values.velocity();
                    record.torque_shank = values.torque();
                },
                Joint::Thigh => {
                    record.position_thigh = values.position();
                    record.velocity_thigh = values.velocity();
                    record.torque_thigh = values.torque();
                },
            }
        }

        record
    }
}
