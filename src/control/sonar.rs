//! Регуляторы по сонару: удержание расстояния при посадке и защита
//! от столкновений

use crate::config::PidSet;
use crate::control::pid::PidController;

/// Регуляторы сонара
#[derive(Debug, Clone)]
pub struct SonarController {
    hold_pid: PidController,
    collision_pd: PidController,
}

impl SonarController {
    pub fn new(gains: &PidSet) -> Self {
        Self {
            hold_pid: PidController::new(gains.sonar),
            collision_pd: PidController::new(gains.sonar_protection),
        }
    }

    /// Прибавка газа для удержания расстояния до земли (мм)
    pub fn hold(&mut self, target_mm: f32, distance_mm: f32, dt: f32) -> f32 {
        self.hold_pid.update(target_mm, distance_mm, dt)
    }

    /// Отклонение тангажа назад по отклику пружины
    pub fn collision(&mut self, spring: f32, dt: f32) -> f32 {
        self.collision_pd.update(spring, 0.0, dt)
    }

    pub fn reset_hold(&mut self) {
        self.hold_pid.reset();
    }

    pub fn reset(&mut self) {
        self.hold_pid.reset();
        self.collision_pd.reset();
    }
}
