//! Регулятор удержания высоты по барометру

use crate::config::PidGains;
use crate::control::pid::PidController;

/// Регулятор высоты
///
/// Давление растет при снижении, поэтому уставкой служит измеренное
/// давление, а измерением - уставка удержания: аппарат ниже уставки дает
/// положительную прибавку газа.
#[derive(Debug, Clone)]
pub struct AltitudeController {
    pid: PidController,
    output: f32,
}

impl AltitudeController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            pid: PidController::new(gains),
            output: 0.0,
        }
    }

    /// Прибавка газа (мкс)
    pub fn update(&mut self, fast_pressure: f32, hold_pressure: f32, dt: f32) -> f32 {
        self.output = self.pid.update(fast_pressure, hold_pressure, dt);
        self.output
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn reset(&mut self) {
        self.pid.reset();
        self.output = 0.0;
    }
}
