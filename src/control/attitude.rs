//! Контроллер стабилизации положения квадрокоптера

use crate::config::flight::{filters, stick};
use crate::config::hardware::motors::PULSE_CENTER;
use crate::config::PidSet;
use crate::control::pid::PidController;
use crate::sensors::AttitudeState;
use crate::utils::math::{apply_deadband, constrain};

/// Команда по осям в импульсах пульта (мкс, центр 1500)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisCommand {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub throttle: f32,
}

impl Default for AxisCommand {
    fn default() -> Self {
        let center = PULSE_CENTER as f32;
        Self {
            roll: center,
            pitch: center,
            yaw: center,
            throttle: 1000.0,
        }
    }
}

/// Выходы регуляторов по осям
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisOutputs {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Уставка угловой скорости по импульсу стика и текущему углу
///
/// Отклонение стика задает скорость, угол вычитается для выравнивания
/// по горизонту (режим "angle").
pub fn rate_setpoint(pulse: f32, angle_deg: f32) -> f32 {
    let offset = apply_deadband(pulse - PULSE_CENTER as f32, stick::DEADBAND);
    (offset - angle_deg * filters::LEVEL_ADJUST_GAIN) / stick::RATE_DIVIDER
}

/// Контроллер стабилизации положения (attitude)
#[derive(Debug, Clone)]
pub struct AttitudeController {
    roll_pid: PidController,
    pitch_pid: PidController,
    yaw_pid: PidController,
    /// Последние уставки скоростей (для телеметрии и отладки)
    setpoints: AxisOutputs,
}

impl AttitudeController {
    pub fn new(gains: &PidSet) -> Self {
        Self {
            roll_pid: PidController::new(gains.roll),
            pitch_pid: PidController::new(gains.pitch),
            yaw_pid: PidController::new(gains.yaw),
            setpoints: AxisOutputs::default(),
        }
    }

    /// Расчет выходов регуляторов скоростей
    pub fn update(&mut self, command: &AxisCommand, attitude: &AttitudeState, dt: f32) -> AxisOutputs {
        let roll_sp = rate_setpoint(command.roll, attitude.roll);
        let pitch_sp = rate_setpoint(command.pitch, attitude.pitch);

        // Рыскание только при газе выше минимального, иначе аппарат
        // закручивается на земле
        let yaw_sp = if command.throttle > stick::YAW_MIN_THROTTLE as f32 {
            apply_deadband(command.yaw - PULSE_CENTER as f32, stick::DEADBAND) / stick::RATE_DIVIDER
        } else {
            0.0
        };

        self.setpoints = AxisOutputs {
            roll: roll_sp,
            pitch: pitch_sp,
            yaw: yaw_sp,
        };

        AxisOutputs {
            roll: self.roll_pid.update(roll_sp, attitude.roll_rate, dt),
            pitch: self.pitch_pid.update(pitch_sp, attitude.pitch_rate, dt),
            yaw: self.yaw_pid.update(yaw_sp, attitude.yaw_rate, dt),
        }
    }

    /// Сброс интегральных составляющих PID контроллеров
    pub fn reset(&mut self) {
        self.roll_pid.reset();
        self.pitch_pid.reset();
        self.yaw_pid.reset();
        self.setpoints = AxisOutputs::default();
    }

    /// Последние уставки скоростей (град/с)
    pub fn setpoints(&self) -> AxisOutputs {
        self.setpoints
    }
}

/// Ограничение импульса стика диапазоном пульта
pub fn clamp_pulse(value: f32) -> f32 {
    constrain(value, 1000.0, 2000.0)
}
