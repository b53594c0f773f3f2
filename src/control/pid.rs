//! PID регулятор с ограничением интегральной составляющей

use crate::config::PidGains;
use crate::utils::math::constrain;

/// PID регулятор
///
/// Производная берется по ошибке. Интеграл и выход ограничены пределом
/// выхода. После создания или `reset()` первый вызов `update()` не имеет
/// истории: производная и интеграл в нем равны нулю.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    output_limit: f32,
    integral: f32,
    previous_error: f32,
    has_history: bool,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            output_limit: gains.output_limit,
            integral: 0.0,
            previous_error: 0.0,
            has_history: false,
        }
    }

    /// Один шаг регулятора, `dt` в секундах и всегда больше нуля
    pub fn update(&mut self, setpoint: f32, measurement: f32, dt: f32) -> f32 {
        debug_assert!(dt > 0.0);
        let error = setpoint - measurement;
        let limit = self.output_limit;

        let derivative = if self.has_history {
            self.integral = constrain(self.integral + error * self.ki * dt, -limit, limit);
            self.kd * (error - self.previous_error) / dt
        } else {
            self.has_history = true;
            0.0
        };
        self.previous_error = error;

        constrain(self.kp * error + self.integral + derivative, -limit, limit)
    }

    /// Сброс интеграла и истории ошибки
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
        self.has_history = false;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn output_limit(&self) -> f32 {
        self.output_limit
    }
}

// Тесты для отладки на хосте
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::value_close;

    const DT: f32 = 0.004;

    fn controller() -> PidController {
        PidController::new(PidGains::new(2.0, 25.0, 0.5, 100.0))
    }

    #[test]
    fn test_first_update_is_proportional() {
        let mut pid = controller();
        assert!(value_close(pid.update(10.0, 7.0, DT), 6.0));

        pid.update(10.0, 0.0, DT);
        pid.reset();
        assert!(value_close(pid.update(1.0, 0.0, DT), 2.0));
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut pid = controller();
        pid.update(1.0, 0.0, DT);
        // Ошибка 1 -> 2: интеграл 2 * 25 * 0.004 = 0.2, производная 0.5 * 1 / 0.004 = 125
        let output = pid.update(2.0, 0.0, DT);
        assert!(value_close(pid.integral(), 0.2));
        assert!(value_close(output, 100.0));
    }

    #[test]
    fn test_anti_windup() {
        let mut pid = controller();
        for _ in 0..100_000 {
            let output = pid.update(1_000.0, 0.0, DT);
            assert!(output.abs() <= pid.output_limit());
            assert!(pid.integral().abs() <= pid.output_limit());
        }
        assert!(value_close(pid.integral(), 100.0));

        for _ in 0..100_000 {
            let output = pid.update(-1_000.0, 0.0, DT);
            assert!(output >= -100.0);
        }
        assert!(value_close(pid.integral(), -100.0));
    }
}
