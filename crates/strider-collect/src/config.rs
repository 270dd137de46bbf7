//! 采集配置（TOML）
//!
//! 运行一次采集需要的全部静态信息：数据集标签与路径、周期、串口
//! 参数、总线拓扑、每个伺服的关节角色和轨迹幅值。
//!
//! # Example
//!
//! ```toml
//! episode = "Sit_Stand__Center"
//! output = "dataset.csv"
//! period_ms = 2
//!
//! [serial]
//! port = "/dev/ttyACM0"
//! baud = 9600
//!
//! [[buses]]
//! bus = 1
//! interface = "can0"
//!
//! [[buses]]
//! bus = 2
//! interface = "can1"
//!
//! [[servos]]
//! id = 12
//! bus = 1
//! joint = "thigh"
//! amplitude = 0.135638
//!
//! [[servos]]
//! id = 13
//! bus = 2
//! joint = "shank"
//! amplitude = -0.242956
//! ```

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strider_driver::BusChannel;

/// 关节角色（决定样本记录里的列归属）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Shank,
    Thigh,
}

/// 一条总线的配置
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// 总线编号
    pub bus: u8,
    /// CAN 接口名（如 "can0"）
    pub interface: String,
}

/// 一个伺服的配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServoConfig {
    /// 伺服地址（1..=N，全局唯一）
    pub id: u8,
    /// 所在总线编号
    pub bus: u8,
    /// 关节角色
    pub joint: Joint,
    /// 轨迹幅值（转，符号决定运动方向）
    pub amplitude: f64,
}

/// 串口力传感器配置
#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    /// 串口设备路径（如 "/dev/ttyACM0"）
    pub port: String,
    /// 波特率
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// 读超时（毫秒）
    #[serde(default = "default_serial_timeout_ms")]
    pub timeout_ms: u64,
}

/// 采集配置
#[derive(Debug, Clone, Deserialize)]
pub struct CollectConfig {
    /// 数据集标签（整次运行不变）
    pub episode: String,
    /// 数据集输出路径
    pub output: PathBuf,
    /// 目标周期（毫秒）
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// 单伺服事务窗口（毫秒）
    #[serde(default = "default_transact_timeout_ms")]
    pub transact_timeout_ms: u64,
    /// 力传感器串口（缺省则本次运行不接力传感器）
    #[serde(default)]
    pub serial: Option<SerialConfig>,
    /// 总线列表
    pub buses: Vec<BusConfig>,
    /// 伺服列表
    pub servos: Vec<ServoConfig>,
}

fn default_period_ms() -> u64 {
    2
}

fn default_transact_timeout_ms() -> u64 {
    5
}

fn default_baud() -> u32 {
    9600
}

fn default_serial_timeout_ms() -> u64 {
    1000
}

impl CollectConfig {
    /// 从 TOML 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: CollectConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置一致性
    ///
    /// - 恰好一个 shank、一个 thigh 伺服（样本记录的列是按关节命名的）
    /// - 每个伺服的总线都已声明，地址全局唯一
    /// - 幅值有限，周期非零
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::Invalid("period_ms must be >= 1".to_string()));
        }

        let shanks = self.servos.iter().filter(|s| s.joint == Joint::Shank).count();
        let thighs = self.servos.iter().filter(|s| s.joint == Joint::Thigh).count();
        if shanks != 1 || thighs != 1 {
            return Err(ConfigError::Invalid(format!(
                "expected exactly one shank and one thigh servo, got {} shank / {} thigh",
                shanks, thighs
            )));
        }

        let mut seen_ids = Vec::new();
        for servo in &self.servos {
            if seen_ids.contains(&servo.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate servo id {}",
                    servo.id
                )));
            }
            seen_ids.push(servo.id);

            if !self.buses.iter().any(|b| b.bus == servo.bus) {
                return Err(ConfigError::Invalid(format!(
                    "servo {} references undeclared bus {}",
                    servo.id, servo.bus
                )));
            }

            if !servo.amplitude.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "servo {} amplitude must be finite",
                    servo.id
                )));
            }
        }

        Ok(())
    }

    /// 目标周期
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    /// 导出传输层拓扑（每条总线一个通道，带它的伺服地址）
    pub fn channels(&self) -> Vec<BusChannel> {
        self.buses
            .iter()
            .map(|bus| {
                let ids: Vec<u8> = self
                    .servos
                    .iter()
                    .filter(|s| s.bus == bus.bus)
                    .map(|s| s.id)
                    .collect();
                BusChannel::new(bus.bus, ids)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_toml() -> &'static str {
        r#"
            episode = "Sit_Stand__Center"
            output = "dataset.csv"

            [serial]
            port = "/dev/ttyACM0"

            [[buses]]
            bus = 1
            interface = "can0"

            [[buses]]
            bus = 2
            interface = "can1"

            [[servos]]
            id = 12
            bus = 1
            joint = "thigh"
            amplitude = 0.135638

            [[servos]]
            id = 13
            bus = 2
            joint = "shank"
            amplitude = -0.242956
        "#
    }

    #[test]
    fn test_parse_reference_config() {
        let config: CollectConfig = toml::from_str(reference_toml()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.episode, "Sit_Stand__Center");
        assert_eq!(config.period_ms, 2);
        assert_eq!(config.transact_timeout_ms, 5);
        assert_eq!(config.buses.len(), 2);
        assert_eq!(config.servos.len(), 2);
        assert_eq!(config.servos[0].joint, Joint::Thigh);

        let serial = config.serial.unwrap();
        assert_eq!(serial.port, "/dev/ttyACM0");
        assert_eq!(serial.baud, 9600);
        assert_eq!(serial.timeout_ms, 1000);
    }

    #[test]
    fn test_channels_partition_servos_by_bus() {
        let config: CollectConfig = toml::from_str(reference_toml()).unwrap();
        let channels = config.channels();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].bus, 1);
        assert_eq!(channels[0].servo_ids, vec![12]);
        assert_eq!(channels[1].bus, 2);
        assert_eq!(channels[1].servo_ids, vec![13]);
    }

    #[test]
    fn test_serial_section_is_optional() {
        let toml = r#"
            episode = "e"
            output = "out.csv"
            [[buses]]
            bus = 1
            interface = "can0"
            [[servos]]
            id = 1
            bus = 1
            joint = "shank"
            amplitude = 0.1
            [[servos]]
            id = 2
            bus = 1
            joint = "thigh"
            amplitude = 0.1
        "#;
        let config: CollectConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert!(config.serial.is_none());
    }

    #[test]
    fn test_validate_rejects_two_shanks() {
        let toml = r#"
            episode = "e"
            output = "out.csv"
            [[buses]]
            bus = 1
            interface = "can0"
            [[servos]]
            id = 1
            bus = 1
            joint = "shank"
            amplitude = 0.1
            [[servos]]
            id = 2
            bus = 1
            joint = "shank"
            amplitude = 0.1
        "#;
        let config: CollectConfig = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_undeclared_bus() {
        let toml = r#"
            episode = "e"
            output = "out.csv"
            [[buses]]
            bus = 1
            interface = "can0"
            [[servos]]
            id = 1
            bus = 1
            joint = "shank"
            amplitude = 0.1
            [[servos]]
            id = 2
            bus = 9
            joint = "thigh"
            amplitude = 0.1
        "#;
        let config: CollectConfig = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let mut config: CollectConfig = toml::from_str(reference_toml()).unwrap();
        config.period_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_nan_amplitude() {
        let mut config: CollectConfig = toml::from_str(reference_toml()).unwrap();
        config.servos[0].amplitude = f64::NAN;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
