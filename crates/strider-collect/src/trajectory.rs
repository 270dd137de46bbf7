//! 轨迹生成
//!
//! 设定值是经过时间的纯函数，幅值即物理限幅。

/// 有界正弦轨迹
///
/// `setpoint(t) = amplitude * |sin(t)|`，对任意 t >= 0 有
/// `|setpoint| <= |amplitude|`。符号由幅值携带：负幅值的关节
/// 朝负方向摆动。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SineTrajectory {
    /// 幅值（转）
    pub amplitude: f64,
}

impl SineTrajectory {
    pub fn new(amplitude: f64) -> Self {
        Self { amplitude }
    }

    /// t 秒时刻的位置设定值（转）
    pub fn setpoint(&self, t: f64) -> f64 {
        self.amplitude * t.sin().abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_setpoint_zero_at_t0() {
        // sin(0) = 0，两个参考幅值在 t=0 都给出 0
        assert_eq!(SineTrajectory::new(0.135638).setpoint(0.0), 0.0);
        assert_eq!(SineTrajectory::new(-0.242956).setpoint(0.0), 0.0);
    }

    #[test]
    fn test_setpoint_reaches_amplitude_at_quarter_period() {
        // sin(π/2) = 1，设定值等于幅值本身（含符号）
        assert_eq!(
            SineTrajectory::new(0.135638).setpoint(FRAC_PI_2),
            0.135638
        );
        assert_eq!(
            SineTrajectory::new(-0.242956).setpoint(FRAC_PI_2),
            -0.242956
        );
    }

    #[test]
    fn test_setpoint_is_bounded() {
        let trajectory = SineTrajectory::new(-0.242956);
        let mut t = 0.0;
        while t < 100.0 {
            assert!(trajectory.setpoint(t).abs() <= 0.242956);
            t += 0.037;
        }
    }

    #[test]
    fn test_negative_amplitude_keeps_sign() {
        let trajectory = SineTrajectory::new(-0.242956);
        let mut t = 0.01;
        while t < 10.0 {
            assert!(trajectory.setpoint(t) <= 0.0);
            t += 0.1;
        }
    }
}
