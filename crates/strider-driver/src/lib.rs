//! # Strider Driver
//!
//! 多总线传输会话层。一次「周期事务」把一批指令按拓扑分发到各总线，
//! 不同总线并行收发，同一总线内串行寻址，全部完成后合并应答返回。
//!
//! ## 模块
//!
//! - `topology`: 总线拓扑描述与校验
//! - `command`: 周期事务的指令/应答类型与 `Transport` trait
//! - `router`: 多总线路由器（每条总线一个工作线程）
//! - `error`: 传输层错误类型

pub mod command;
pub mod error;
pub mod router;
pub mod topology;

pub use command::{ServoCommand, ServoReply, Transport};
pub use error::TransportError;
pub use router::{MultiBusRouter, RouterBuilder, RouterConfig};
pub use topology::BusChannel;

use std::time::Duration;

/// 伺服侧看门狗间隔
///
/// 设备要求至少每 100 ms 收到一次请求，超时进入锁存故障态，
/// 必须由显式停止指令清除。路由器在周期间隔超过该值时告警。
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(100);
