//! # Strider Collect
//!
//! 周期性「指令 → 事务 → 解码 → 打戳 → 落盘」采集回路。
//!
//! 每个周期：按经过时间生成各关节的设定值，构建位置指令并执行一次
//! 多总线事务，把解码结果与最近一条外部力传感器读数融合成一条样本
//! 记录，追加写入数据集文件，然后睡到下一个调度点。
//!
//! ## 模块
//!
//! - `config`: 采集配置（TOML）
//! - `trajectory`: 轨迹生成（有界正弦）
//! - `force`: 外部力传感器读取（串口行协议，非阻塞轮询）
//! - `sink`: 数据集落盘（追加写 CSV）
//! - `collector`: 周期编排器（状态机 + 调度循环）

pub mod collector;
pub mod config;
pub mod error;
pub mod force;
pub mod sink;
pub mod trajectory;

pub use collector::{Collector, CollectorPhase, CycleStats};
pub use config::{BusConfig, CollectConfig, Joint, SerialConfig, ServoConfig};
pub use error::{CollectError, ConfigError};
pub use force::{ForceSource, SerialForceSensor};
pub use sink::{DATASET_HEADER, DatasetSink, SampleRecord, SinkError};
pub use trajectory::SineTrajectory;
