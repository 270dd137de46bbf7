//! 总线拓扑描述
//!
//! 拓扑是静态的：每条总线挂哪些伺服在启动时确定，运行期间不变。

use crate::error::TransportError;

/// 一条总线及其挂载的伺服
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusChannel {
    /// 总线编号（用于日志和错误信息）
    pub bus: u8,
    /// 该总线上的伺服地址
    pub servo_ids: Vec<u8>,
}

impl BusChannel {
    pub fn new(bus: u8, servo_ids: impl Into<Vec<u8>>) -> Self {
        Self {
            bus,
            servo_ids: servo_ids.into(),
        }
    }
}

/// 校验拓扑：总线编号唯一、伺服地址全局唯一、每条总线非空
pub fn validate_topology(channels: &[BusChannel]) -> Result<(), TransportError> {
    if channels.is_empty() {
        return Err(TransportError::Topology("no buses configured".to_string()));
    }

    let mut seen_buses = Vec::new();
    let mut seen_servos = Vec::new();

    for channel in channels {
        if seen_buses.contains(&channel.bus) {
            return Err(TransportError::Topology(format!(
                "duplicate bus {}",
                channel.bus
            )));
        }
        seen_buses.push(channel.bus);

        if channel.servo_ids.is_empty() {
            return Err(TransportError::Topology(format!(
                "bus {} has no servos",
                channel.bus
            )));
        }

        for id in &channel.servo_ids {
            if seen_servos.contains(id) {
                return Err(TransportError::Topology(format!(
                    "servo {} assigned to more than one bus",
                    id
                )));
            }
            seen_servos.push(*id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_topology() {
        let channels = vec![BusChannel::new(1, [12]), BusChannel::new(2, [13])];
        assert!(validate_topology(&channels).is_ok());
    }

    #[test]
    fn test_empty_topology_rejected() {
        assert!(matches!(
            validate_topology(&[]),
            Err(TransportError::Topology(_))
        ));
    }

    #[test]
    fn test_duplicate_bus_rejected() {
        let channels = vec![BusChannel::new(1, [12]), BusChannel::new(1, [13])];
        assert!(matches!(
            validate_topology(&channels),
            Err(TransportError::Topology(_))
        ));
    }

    #[test]
    fn test_duplicate_servo_rejected() {
        let channels = vec![BusChannel::new(1, [12]), BusChannel::new(2, [12])];
        assert!(matches!(
            validate_topology(&channels),
            Err(TransportError::Topology(_))
        ));
    }

    #[test]
    fn test_bus_without_servos_rejected() {
        let channels = vec![BusChannel::new(1, [])];
        assert!(matches!(
            validate_topology(&channels),
            Err(TransportError::Topology(_))
        ));
    }
}
