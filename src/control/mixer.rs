//! Микширование выходов регуляторов в импульсы моторов (X-схема)
//!
//! Винты: передний правый и задний левый вращаются против часовой стрелки,
//! задний правый и передний левый - по часовой.

use crate::config::flight::battery;
use crate::config::hardware::motors::{IDLE_PULSE, PULSE_CUTOFF, PULSE_MAX, THROTTLE_LIMIT};
use crate::control::attitude::AxisOutputs;
use crate::data::MotorOutputs;
use crate::utils::math::constrain;

/// Множитель компенсации просадки батареи
///
/// Действует только в рабочем диапазоне напряжений, вне его равен 1.
pub fn battery_factor(voltage: f32, compensation: f32) -> f32 {
    if voltage > battery::COMPENSATION_MIN_VOLTAGE && voltage < battery::FULL_VOLTAGE {
        1.0 + (battery::FULL_VOLTAGE - voltage) / compensation
    } else {
        1.0
    }
}

/// Расчет импульсов моторов
///
/// Без арминга все моторы остановлены. В полете каждый мотор не опускается
/// ниже холостых оборотов и не превышает максимум.
pub fn mix(
    throttle: f32,
    axes: &AxisOutputs,
    battery_voltage: f32,
    compensation: f32,
    armed: bool,
) -> MotorOutputs {
    if !armed {
        return MotorOutputs::cutoff();
    }

    let t = constrain(throttle, PULSE_CUTOFF as f32, THROTTLE_LIMIT as f32);
    let (r, p, y) = (axes.roll, axes.pitch, axes.yaw);
    let factor = battery_factor(battery_voltage, compensation);

    let pulse = |value: f32| -> u16 {
        let compensated = value * factor;
        libm::roundf(constrain(compensated, IDLE_PULSE as f32, PULSE_MAX as f32)) as u16
    };

    MotorOutputs {
        front_right: pulse(t + p - r + y),
        rear_right: pulse(t - p - r - y),
        rear_left: pulse(t - p + r + y),
        front_left: pulse(t + p + r - y),
    }
}

// Тесты для отладки на хосте
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::value_close;

    #[test]
    fn test_disarmed_is_cutoff() {
        let outputs = mix(1600.0, &AxisOutputs::default(), 12.0, 65.0, false);
        assert!(outputs.is_cutoff());
    }

    #[test]
    fn test_pitch_up_raises_front() {
        let axes = AxisOutputs {
            pitch: 50.0,
            ..AxisOutputs::default()
        };
        let outputs = mix(1500.0, &axes, 12.4, 65.0, true);
        assert_eq!(outputs.front_right, 1550);
        assert_eq!(outputs.front_left, 1550);
        assert_eq!(outputs.rear_right, 1450);
        assert_eq!(outputs.rear_left, 1450);
    }

    #[test]
    fn test_roll_and_yaw_signs() {
        let axes = AxisOutputs {
            roll: 40.0,
            yaw: 10.0,
            ..AxisOutputs::default()
        };
        let outputs = mix(1500.0, &axes, 0.0, 65.0, true);
        // Крен вправо: левые моторы быстрее
        assert_eq!(outputs.front_left, 1530);
        assert_eq!(outputs.rear_left, 1550);
        assert_eq!(outputs.front_right, 1470);
        assert_eq!(outputs.rear_right, 1450);
    }

    #[test]
    fn test_idle_floor_and_max() {
        let axes = AxisOutputs {
            roll: 400.0,
            ..AxisOutputs::default()
        };
        let outputs = mix(1000.0, &axes, 12.4, 65.0, true);
        assert_eq!(outputs.front_right, IDLE_PULSE);
        assert_eq!(outputs.rear_right, IDLE_PULSE);
        assert_eq!(outputs.front_left, 1400);

        let outputs = mix(1800.0, &axes, 12.4, 65.0, true);
        assert_eq!(outputs.front_left, PULSE_MAX);
    }

    #[test]
    fn test_battery_compensation() {
        assert!(value_close(battery_factor(11.1, 65.0), 1.02));
        assert_eq!(battery_factor(12.6, 65.0), 1.0);
        assert_eq!(battery_factor(5.0, 65.0), 1.0);

        let outputs = mix(1500.0, &AxisOutputs::default(), 11.1, 65.0, true);
        assert_eq!(outputs.front_right, 1530);
    }
}
