//! Каскад регуляторов: позиция и высота поверх стабилизации положения

pub mod altitude;
pub mod attitude;
pub mod gps;
pub mod mixer;
pub mod pid;
pub mod sonar;

use crate::config::hardware::motors::PULSE_CENTER;
use crate::config::FlightConfig;
use crate::data::MotorOutputs;
use crate::sensors::{AttitudeState, PositionFix};

use self::altitude::AltitudeController;
use self::attitude::{clamp_pulse, AttitudeController, AxisCommand, AxisOutputs};
use self::gps::{GpsAdjust, GpsController};
use self::sonar::SonarController;

/// Удержание позиции по GPS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsHold {
    /// Цель (1e-7 градуса)
    pub target_lat: f32,
    pub target_lon: f32,
    pub fix: PositionFix,
    pub heading_deg: f32,
}

/// Удержание высоты
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AltitudeHold {
    /// По барометру: быстрое давление и уставка (Па)
    Pressure { fast: f32, hold: f32 },
    /// По нижнему сонару (мм)
    Sonar { target_mm: f32, distance_mm: f32 },
}

/// Входы каскада за один цикл
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeInputs {
    /// Команда по осям после ручного управления и навигации
    pub command: AxisCommand,
    pub attitude: AttitudeState,
    /// `None` - газ напрямую из команды
    pub altitude: Option<AltitudeHold>,
    /// Газ зависания над центром стика, найденный при взлете
    pub hover_offset: f32,
    pub gps: Option<GpsHold>,
    /// Отклик пружины переднего сонара, `None` если защита выключена
    pub front_spring: Option<f32>,
    pub battery_voltage: f32,
    pub armed: bool,
}

/// Результат каскада
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CascadeOutput {
    pub motors: MotorOutputs,
    pub axes: AxisOutputs,
    pub throttle: f32,
    pub gps_adjust: GpsAdjust,
    /// Отклонение тангажа назад от защиты сонара
    pub collision_pitch: f32,
}

/// Каскад регуляторов
///
/// Каждый внешний контур сбрасывается при включении, чтобы накопленный
/// интеграл прошлого режима не давал рывка.
#[derive(Debug, Clone)]
pub struct ControlCascade {
    attitude: AttitudeController,
    altitude: AltitudeController,
    gps: GpsController,
    sonar: SonarController,
    battery_compensation: f32,
    dt: f32,
    pressure_active: bool,
    sonar_hold_active: bool,
    gps_active: bool,
}

impl ControlCascade {
    pub fn new(config: &FlightConfig) -> Self {
        Self {
            attitude: AttitudeController::new(&config.pid),
            altitude: AltitudeController::new(config.pid.altitude),
            gps: GpsController::new(&config.pid),
            sonar: SonarController::new(&config.pid),
            battery_compensation: config.battery_compensation,
            dt: config.dt(),
            pressure_active: false,
            sonar_hold_active: false,
            gps_active: false,
        }
    }

    pub fn update(&mut self, inputs: &CascadeInputs) -> CascadeOutput {
        if !inputs.armed {
            self.reset();
            return CascadeOutput {
                throttle: inputs.command.throttle,
                ..CascadeOutput::default()
            };
        }

        let dt = self.dt;
        let mut command = inputs.command;

        let gps_adjust = match &inputs.gps {
            Some(hold) => {
                if !self.gps_active {
                    self.gps.reset();
                    self.gps_active = true;
                }
                self.gps
                    .update(hold.target_lat, hold.target_lon, &hold.fix, hold.heading_deg, dt)
            }
            None => {
                self.gps_active = false;
                GpsAdjust::default()
            }
        };
        command.roll += gps_adjust.roll;
        command.pitch += gps_adjust.pitch;

        let collision_pitch = match inputs.front_spring {
            Some(spring) => self.sonar.collision(spring, dt),
            None => 0.0,
        };
        command.pitch += collision_pitch;

        command.roll = clamp_pulse(command.roll);
        command.pitch = clamp_pulse(command.pitch);

        let base = PULSE_CENTER as f32 + inputs.hover_offset;
        let throttle = match inputs.altitude {
            Some(AltitudeHold::Pressure { fast, hold }) => {
                self.sonar_hold_active = false;
                if !self.pressure_active {
                    self.altitude.reset();
                    self.pressure_active = true;
                }
                base + self.altitude.update(fast, hold, dt)
            }
            Some(AltitudeHold::Sonar {
                target_mm,
                distance_mm,
            }) => {
                self.pressure_active = false;
                if !self.sonar_hold_active {
                    self.sonar.reset_hold();
                    self.sonar_hold_active = true;
                }
                base + self.sonar.hold(target_mm, distance_mm, dt)
            }
            None => {
                self.pressure_active = false;
                self.sonar_hold_active = false;
                command.throttle
            }
        };
        command.throttle = throttle;

        let axes = self.attitude.update(&command, &inputs.attitude, dt);
        let motors = mixer::mix(
            throttle,
            &axes,
            inputs.battery_voltage,
            self.battery_compensation,
            true,
        );

        CascadeOutput {
            motors,
            axes,
            throttle,
            gps_adjust,
            collision_pitch,
        }
    }

    /// Сброс всех регуляторов (арминг, дизарм)
    pub fn reset(&mut self) {
        self.attitude.reset();
        self.altitude.reset();
        self.gps.reset();
        self.sonar.reset();
        self.pressure_active = false;
        self.sonar_hold_active = false;
        self.gps_active = false;
    }
}

// Тесты для отладки на хосте
#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> CascadeInputs {
        CascadeInputs {
            command: AxisCommand {
                throttle: 1500.0,
                ..AxisCommand::default()
            },
            attitude: AttitudeState::default(),
            altitude: None,
            hover_offset: 0.0,
            gps: None,
            front_spring: None,
            battery_voltage: 12.4,
            armed: true,
        }
    }

    #[test]
    fn test_disarmed_cuts_motors() {
        let mut cascade = ControlCascade::new(&FlightConfig::default());
        let output = cascade.update(&CascadeInputs {
            armed: false,
            ..inputs()
        });
        assert!(output.motors.is_cutoff());
    }

    #[test]
    fn test_manual_throttle_passes_through() {
        let mut cascade = ControlCascade::new(&FlightConfig::default());
        let output = cascade.update(&inputs());
        assert_eq!(output.motors.as_array(), [1500; 4]);
    }

    #[test]
    fn test_pressure_hold_uses_hover_offset() {
        let mut cascade = ControlCascade::new(&FlightConfig::default());
        let output = cascade.update(&CascadeInputs {
            altitude: Some(AltitudeHold::Pressure {
                fast: 100_000.0,
                hold: 100_000.0,
            }),
            hover_offset: -60.0,
            ..inputs()
        });
        assert_eq!(output.throttle, 1440.0);
    }

    #[test]
    fn test_collision_pitches_back() {
        let mut cascade = ControlCascade::new(&FlightConfig::default());
        let output = cascade.update(&CascadeInputs {
            front_spring: Some(100.0),
            ..inputs()
        });
        // Первый такт без истории: только P 0.6 * 100
        assert!((output.collision_pitch - 60.0).abs() < 1e-3);
        assert!(output.axes.pitch > 0.0);
        assert!(output.motors.front_left > output.motors.rear_left);
    }
}
