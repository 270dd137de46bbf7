//! 多总线路由器
//!
//! 每条总线一个工作线程，线程独占该总线的适配器。`cycle()` 把指令
//! 批次按拓扑分发给各工作线程，再收齐所有批次的结果——分发和收集
//! 之间各总线真并行，收集是一道屏障：所有子事务完成（或超时）之前
//! 不会返回。
//!
//! 共享资源模型：适配器只被它的工作线程触碰，任务/结果通道一端只有
//! 一个读者一个写者，因此不需要任何锁。

use crate::command::{ServoCommand, ServoReply, Transport};
use crate::error::TransportError;
use crate::topology::{BusChannel, validate_topology};
use crate::WATCHDOG_INTERVAL;
use crossbeam_channel::{Receiver, Sender, bounded};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

use strider_bus::BusAdapter;
use strider_protocol::RegisterValues;

/// 路由器配置
///
/// # Example
///
/// ```
/// use strider_driver::RouterConfig;
///
/// // 默认配置（5ms 单伺服事务窗口，100ms 批次期限）
/// let config = RouterConfig::default();
///
/// // 自定义配置
/// let config = RouterConfig {
///     transact_timeout_ms: 2,
///     cycle_timeout_ms: 50,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// 单个伺服的事务窗口（毫秒）——窗口内无应答按缺数据处理
    pub transact_timeout_ms: u64,
    /// 单条总线完成整个批次的期限（毫秒）——超过视为总线故障
    pub cycle_timeout_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            transact_timeout_ms: 5,
            cycle_timeout_ms: 100,
        }
    }
}

/// 发给总线工作线程的任务
enum BusJob {
    /// 周期批次：串行寻址，收集应答
    Cycle(Vec<ServoCommand>),
    /// 停止批次：只发送，不等应答
    StopAll(Vec<ServoCommand>),
}

type BusJobResult = Result<Vec<ServoReply>, TransportError>;

struct BusWorker {
    bus: u8,
    job_tx: Option<Sender<BusJob>>,
    result_rx: Receiver<BusJobResult>,
    handle: Option<JoinHandle<()>>,
}

/// 路由器 Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use strider_bus::SocketCanFdAdapter;
/// use strider_driver::{BusChannel, RouterBuilder, RouterConfig};
///
/// let router = RouterBuilder::new()
///     .config(RouterConfig::default())
///     .bus(BusChannel::new(1, [12]), SocketCanFdAdapter::new("can0").unwrap())
///     .bus(BusChannel::new(2, [13]), SocketCanFdAdapter::new("can1").unwrap())
///     .build()
///     .unwrap();
/// ```
pub struct RouterBuilder {
    config: RouterConfig,
    buses: Vec<(BusChannel, Box<dyn BusAdapter>)>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            config: RouterConfig::default(),
            buses: Vec::new(),
        }
    }

    /// 设置路由器配置（可选）
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// 挂载一条总线（适配器被移动进该总线的工作线程）
    pub fn bus(mut self, channel: BusChannel, adapter: impl BusAdapter + 'static) -> Self {
        self.buses.push((channel, Box::new(adapter)));
        self
    }

    /// 校验拓扑并启动所有总线工作线程
    ///
    /// # 错误
    /// - `TransportError::Topology`: 总线/伺服配置非法
    pub fn build(self) -> Result<MultiBusRouter, TransportError> {
        let channels: Vec<BusChannel> = self.buses.iter().map(|(c, _)| c.clone()).collect();
        validate_topology(&channels)?;

        let transact_timeout = Duration::from_millis(self.config.transact_timeout_ms);

        let mut workers = Vec::with_capacity(self.buses.len());
        let mut servo_to_worker = HashMap::new();

        for (index, (channel, adapter)) in self.buses.into_iter().enumerate() {
            for id in &channel.servo_ids {
                servo_to_worker.insert(*id, index);
            }

            let (job_tx, job_rx) = bounded::<BusJob>(1);
            let (result_tx, result_rx) = bounded::<BusJobResult>(1);

            let bus = channel.bus;
            let handle = std::thread::Builder::new()
                .name(format!("strider-bus-{}", bus))
                .spawn(move || {
                    bus_worker_loop(bus, adapter, job_rx, result_tx, transact_timeout);
                })
                .map_err(|e| {
                    TransportError::Topology(format!("failed to spawn bus {} worker: {}", bus, e))
                })?;

            workers.push(BusWorker {
                bus,
                job_tx: Some(job_tx),
                result_rx,
                handle: Some(handle),
            });
        }

        info!(
            "Multi-bus router started: {} buses, {} servos",
            workers.len(),
            servo_to_worker.len()
        );

        Ok(MultiBusRouter {
            config: self.config,
            workers,
            servo_to_worker,
            channels,
            last_cycle: None,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 多总线路由器
///
/// 对外实现 `Transport`。物理通道归各工作线程独占，其他组件不得
/// 直接触碰。
pub struct MultiBusRouter {
    config: RouterConfig,
    workers: Vec<BusWorker>,
    servo_to_worker: HashMap<u8, usize>,
    channels: Vec<BusChannel>,
    /// 上一次周期事务的时刻，用于看门狗间隔告警
    last_cycle: Option<Instant>,
}

impl MultiBusRouter {
    /// 拓扑内的伺服总数
    pub fn servo_count(&self) -> usize {
        self.servo_to_worker.len()
    }

    fn cycle_deadline(&self) -> Duration {
        Duration::from_millis(self.config.cycle_timeout_ms)
    }

    fn dispatch(&self, index: usize, job: BusJob) -> Result<(), TransportError> {
        let worker = &self.workers[index];
        worker
            .job_tx
            .as_ref()
            .ok_or(TransportError::WorkerGone { bus: worker.bus })?
            .send(job)
            .map_err(|_| TransportError::WorkerGone { bus: worker.bus })
    }

    fn collect(&self, index: usize) -> Result<Vec<ServoReply>, TransportError> {
        let worker = &self.workers[index];
        match worker.result_rx.recv_timeout(self.cycle_deadline()) {
            Ok(result) => result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                Err(TransportError::CycleTimeout { bus: worker.bus })
            },
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                Err(TransportError::WorkerGone { bus: worker.bus })
            },
        }
    }
}

impl Transport for MultiBusRouter {
    fn cycle(&mut self, commands: &[ServoCommand]) -> Result<Vec<ServoReply>, TransportError> {
        // 看门狗间隔监控：周期拖得太长，设备端可能已经锁存故障。
        // 中途发生的锁存故障不会被自动清除（需要操作员显式停止指令）。
        if let Some(last) = self.last_cycle {
            let gap = last.elapsed();
            if gap > WATCHDOG_INTERVAL {
                warn!(
                    "Cycle gap of {:?} exceeds the {:?} servo watchdog interval; \
                     devices may have latched a fault",
                    gap, WATCHDOG_INTERVAL
                );
            }
        }
        self.last_cycle = Some(Instant::now());

        // 按拓扑把指令切成每总线一个批次
        let mut batches: Vec<SmallVec<[ServoCommand; 4]>> =
            (0..self.workers.len()).map(|_| SmallVec::new()).collect();
        for command in commands {
            let index = *self
                .servo_to_worker
                .get(&command.id)
                .ok_or(TransportError::UnknownServo { id: command.id })?;
            batches[index].push(*command);
        }

        // 先全部分发，再全部收集：总线之间并行，收集处汇合。
        // 致命错误直接向上传播终止运行，不做通道排空。
        let mut dispatched: SmallVec<[usize; 4]> = SmallVec::new();
        for (index, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            self.dispatch(index, BusJob::Cycle(batch.into_vec()))?;
            dispatched.push(index);
        }

        let mut replies = Vec::with_capacity(commands.len());
        for index in dispatched {
            replies.extend(self.collect(index)?);
        }

        trace!(
            commanded = commands.len(),
            replied = replies.len(),
            "cycle transaction complete"
        );
        Ok(replies)
    }

    fn stop_all(&mut self) -> Result<(), TransportError> {
        let mut dispatched: SmallVec<[usize; 4]> = SmallVec::new();
        for (index, channel) in self.channels.iter().enumerate() {
            let stops: Vec<ServoCommand> =
                channel.servo_ids.iter().map(|id| ServoCommand::stop(*id)).collect();
            self.dispatch(index, BusJob::StopAll(stops))?;
            dispatched.push(index);
        }

        for index in dispatched {
            self.collect(index)?;
        }

        info!(
            "Stop-all issued to {} servos across {} buses",
            self.servo_count(),
            self.channels.len()
        );
        Ok(())
    }
}

impl Drop for MultiBusRouter {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            // 先关闭任务通道，worker 的 recv 立即返回 Disconnected
            worker.job_tx = None;
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take()
                && handle.join().is_err()
            {
                warn!(bus = worker.bus, "bus worker panicked during shutdown");
            }
        }
    }
}

/// 总线工作线程主循环
///
/// 线程独占适配器；任务通道关闭即退出。
fn bus_worker_loop(
    bus: u8,
    mut adapter: Box<dyn BusAdapter>,
    job_rx: Receiver<BusJob>,
    result_tx: Sender<BusJobResult>,
    transact_timeout: Duration,
) {
    while let Ok(job) = job_rx.recv() {
        let result = match job {
            BusJob::Cycle(commands) => {
                run_cycle_batch(bus, adapter.as_mut(), &commands, transact_timeout)
            },
            BusJob::StopAll(commands) => run_stop_batch(adapter.as_mut(), &commands),
        };
        if result_tx.send(result).is_err() {
            break;
        }
    }
    trace!(bus, "bus worker exiting");
}

/// 串行执行一条总线上的周期批次
fn run_cycle_batch(
    bus: u8,
    adapter: &mut dyn BusAdapter,
    commands: &[ServoCommand],
    transact_timeout: Duration,
) -> BusJobResult {
    let mut replies = Vec::with_capacity(commands.len());
    for command in commands {
        match adapter.transact(command.frame, transact_timeout) {
            Ok(Some(frame)) => {
                // 解码失败说明协议失步，按总线级故障上报
                let values = RegisterValues::decode(frame.payload())?;
                replies.push(ServoReply {
                    id: command.id,
                    values,
                });
            },
            Ok(None) => {
                trace!(bus, servo = command.id, "no reply within transaction window");
            },
            Err(e) => return Err(e.into()),
        }
    }
    Ok(replies)
}

/// 执行停止批次：只发送，不收应答
fn run_stop_batch(adapter: &mut dyn BusAdapter, commands: &[ServoCommand]) -> BusJobResult {
    for command in commands {
        adapter.send(command.frame)?;
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use strider_bus::{BusError, BusFrame};
    use strider_protocol::{OPCODE_STOP, PositionCommand, Register, Resolution};

    /// 脚本化的总线适配器：按伺服地址返回预置应答载荷，并记录发出的帧
    struct MockBusAdapter {
        replies: HashMap<u8, Vec<u8>>,
        sent: Arc<Mutex<Vec<BusFrame>>>,
        fail: bool,
    }

    impl MockBusAdapter {
        fn new(replies: HashMap<u8, Vec<u8>>) -> (Self, Arc<Mutex<Vec<BusFrame>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    replies,
                    sent: sent.clone(),
                    fail: false,
                },
                sent,
            )
        }

        fn failing() -> Self {
            Self {
                replies: HashMap::new(),
                sent: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            }
        }
    }

    impl BusAdapter for MockBusAdapter {
        fn transact(
            &mut self,
            request: BusFrame,
            _timeout: Duration,
        ) -> Result<Option<BusFrame>, BusError> {
            if self.fail {
                return Err(BusError::NotStarted);
            }
            self.sent.lock().unwrap().push(request);
            Ok(self
                .replies
                .get(&request.id)
                .map(|payload| BusFrame::new(request.id, payload)))
        }

        fn send(&mut self, frame: BusFrame) -> Result<(), BusError> {
            if self.fail {
                return Err(BusError::NotStarted);
            }
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }
    }

    /// 位置/速度/扭矩全浮点的应答载荷
    fn reply_payload(position: f32, velocity: f32, torque: f32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.push(QueryEntry::position());
        payload.extend_from_slice(&position.to_be_bytes());
        payload.push(QueryEntry::velocity());
        payload.extend_from_slice(&velocity.to_be_bytes());
        payload.push(QueryEntry::torque());
        payload.extend_from_slice(&torque.to_be_bytes());
        payload
    }

    struct QueryEntry;
    impl QueryEntry {
        fn position() -> u8 {
            strider_protocol::QuerySpec::entry_byte(Register::Position, Resolution::Float)
        }
        fn velocity() -> u8 {
            strider_protocol::QuerySpec::entry_byte(Register::Velocity, Resolution::Float)
        }
        fn torque() -> u8 {
            strider_protocol::QuerySpec::entry_byte(Register::Torque, Resolution::Float)
        }
    }

    fn two_bus_router(
        bus1_replies: HashMap<u8, Vec<u8>>,
        bus2_replies: HashMap<u8, Vec<u8>>,
    ) -> (MultiBusRouter, Arc<Mutex<Vec<BusFrame>>>, Arc<Mutex<Vec<BusFrame>>>) {
        let (adapter1, sent1) = MockBusAdapter::new(bus1_replies);
        let (adapter2, sent2) = MockBusAdapter::new(bus2_replies);
        let router = RouterBuilder::new()
            .bus(BusChannel::new(1, [12]), adapter1)
            .bus(BusChannel::new(2, [13]), adapter2)
            .build()
            .unwrap();
        (router, sent1, sent2)
    }

    #[test]
    fn test_cycle_returns_replies_for_both_buses() {
        let mut bus1 = HashMap::new();
        bus1.insert(12, reply_payload(0.1, 1.0, 0.01));
        let mut bus2 = HashMap::new();
        bus2.insert(13, reply_payload(-0.2, -2.0, -0.02));

        let (mut router, _, _) = two_bus_router(bus1, bus2);

        let commands = [
            ServoCommand::position(12, &PositionCommand::new(0.1)),
            ServoCommand::position(13, &PositionCommand::new(-0.2)),
        ];
        let replies = router.cycle(&commands).unwrap();
        assert_eq!(replies.len(), 2);

        // 应答顺序不保证，按 id 索引
        let by_id: HashMap<u8, &ServoReply> = replies.iter().map(|r| (r.id, r)).collect();
        assert_eq!(by_id[&12].values.position(), Some(0.1_f32 as f64));
        assert_eq!(by_id[&13].values.position(), Some(-0.2_f32 as f64));
    }

    #[test]
    fn test_silent_servo_is_a_gap_not_an_error() {
        // 伺服 13 沉默：结果里只有 12，周期不报错
        let mut bus1 = HashMap::new();
        bus1.insert(12, reply_payload(0.5, 0.0, 0.0));
        let (mut router, _, _) = two_bus_router(bus1, HashMap::new());

        let commands = [
            ServoCommand::position(12, &PositionCommand::new(0.5)),
            ServoCommand::position(13, &PositionCommand::new(0.0)),
        ];
        let replies = router.cycle(&commands).unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].id, 12);
    }

    #[test]
    fn test_bus_failure_is_fatal() {
        let (adapter1, _) = MockBusAdapter::new(HashMap::new());
        let mut router = RouterBuilder::new()
            .bus(BusChannel::new(1, [12]), adapter1)
            .bus(BusChannel::new(2, [13]), MockBusAdapter::failing())
            .build()
            .unwrap();

        let commands = [
            ServoCommand::position(12, &PositionCommand::new(0.0)),
            ServoCommand::position(13, &PositionCommand::new(0.0)),
        ];
        assert!(matches!(
            router.cycle(&commands),
            Err(TransportError::Bus(_))
        ));
    }

    #[test]
    fn test_unknown_servo_rejected() {
        let (mut router, _, _) = two_bus_router(HashMap::new(), HashMap::new());
        let commands = [ServoCommand::position(99, &PositionCommand::new(0.0))];
        assert!(matches!(
            router.cycle(&commands),
            Err(TransportError::UnknownServo { id: 99 })
        ));
    }

    #[test]
    fn test_garbled_reply_is_fatal() {
        // 未知寄存器号 -> 协议失步 -> 致命
        let mut bus1 = HashMap::new();
        bus1.insert(12, vec![0xFF, 0x00, 0x00, 0x00, 0x00]);
        let (mut router, _, _) = two_bus_router(bus1, HashMap::new());

        let commands = [ServoCommand::position(12, &PositionCommand::new(0.0))];
        assert!(matches!(
            router.cycle(&commands),
            Err(TransportError::Protocol(_))
        ));
    }

    #[test]
    fn test_stop_all_sends_one_stop_frame_per_servo() {
        let (mut router, sent1, sent2) = two_bus_router(HashMap::new(), HashMap::new());
        router.stop_all().unwrap();

        let sent1 = sent1.lock().unwrap();
        assert_eq!(sent1.len(), 1);
        assert_eq!(sent1[0].id, 12);
        assert_eq!(sent1[0].payload(), &[OPCODE_STOP]);

        let sent2 = sent2.lock().unwrap();
        assert_eq!(sent2.len(), 1);
        assert_eq!(sent2[0].id, 13);
        assert_eq!(sent2[0].payload(), &[OPCODE_STOP]);
    }

    #[test]
    fn test_builder_rejects_duplicate_servo() {
        let (adapter1, _) = MockBusAdapter::new(HashMap::new());
        let (adapter2, _) = MockBusAdapter::new(HashMap::new());
        let result = RouterBuilder::new()
            .bus(BusChannel::new(1, [12]), adapter1)
            .bus(BusChannel::new(2, [12]), adapter2)
            .build();
        assert!(matches!(result, Err(TransportError::Topology(_))));
    }

    #[test]
    fn test_servo_count() {
        let (router, _, _) = two_bus_router(HashMap::new(), HashMap::new());
        assert_eq!(router.servo_count(), 2);
    }
}
