//! 采集层错误类型定义

use crate::sink::SinkError;
use strider_driver::TransportError;
use thiserror::Error;

/// 采集回路错误类型
///
/// 到达这里的都是致命错误：传输层总线故障或数据集写失败都会终止
/// 本次运行。单伺服缺应答和力传感器链路异常在回路内部降级处理，
/// 不经过错误通道。
#[derive(Error, Debug)]
pub enum CollectError {
    /// 传输层故障（总线不可达、协议失步等）
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// 数据集写失败（磁盘满、权限等）
    #[error("Dataset sink failure: {0}")]
    Sink(#[from] SinkError),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_error_from_transport() {
        let err: CollectError = TransportError::UnknownServo { id: 3 }.into();
        assert!(matches!(err, CollectError::Transport(_)));
        assert!(format!("{}", err).starts_with("Transport failure"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid("no shank servo".to_string());
        assert_eq!(format!("{}", err), "Invalid config: no shank servo");
    }
}
