//! Обработка данных барометра и уставки удержания высоты

#[allow(unused_imports)]
use num_traits::Float;

use crate::config::{BaroCoefficients, FlightConfig};
use crate::data::BaroSample;
use crate::utils::filters::{IntRingBuffer, LowPassFilter};
use crate::utils::math::constrain;

/// Окно усреднения давления
pub const PRESSURE_WINDOW: usize = 20;

/// Окно усреднения сырой температуры
pub const TEMPERATURE_WINDOW: usize = 5;

/// Результат компенсации отсчетов барометра
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Compensated {
    /// Температура (0.01 °C)
    pub temperature: i32,
    /// Давление (Па)
    pub pressure: i32,
}

/// Компенсация первого порядка по заводским коэффициентам MS5611
pub fn compensate(coefficients: &BaroCoefficients, raw_pressure: u32, raw_temperature: u32) -> Compensated {
    let c = coefficients.c.map(i64::from);
    let d1 = raw_pressure as i64;
    let d2 = raw_temperature as i64;

    let dt = d2 - (c[4] << 8);
    let temperature = 2000 + dt * c[5] / (1 << 23);
    let off = (c[1] << 16) + c[3] * dt / (1 << 7);
    let sens = (c[0] << 15) + c[2] * dt / (1 << 8);
    let pressure = (d1 * sens / (1 << 21) - off) / (1 << 15);

    Compensated {
        temperature: temperature as i32,
        pressure: pressure as i32,
    }
}

/// Обработчик данных барометра
///
/// Медленный фильтр служит опорой уставки удержания, быстрый - входом
/// регулятора высоты. Давление растет при снижении.
#[derive(Debug, Clone)]
pub struct AltitudeEstimator {
    coefficients: BaroCoefficients,
    temperature_window: IntRingBuffer<TEMPERATURE_WINDOW>,
    pressure_window: IntRingBuffer<PRESSURE_WINDOW>,
    slow: LowPassFilter,
    fast: LowPassFilter,
    /// Последнее компенсированное давление (Па)
    raw_pressure: f32,
    /// Давление на земле, зафиксированное при арминге
    ground_pressure: Option<f32>,
    /// Текущая уставка удержания (Па)
    hold_pressure: f32,
    /// Целевая уставка, к которой движется текущая
    hold_target: f32,
    /// Оставшиеся такты стабилизации после арминга
    stabilization: u16,
    stabilization_ticks: u16,
    max_step: f32,
}

impl AltitudeEstimator {
    pub fn new(config: &FlightConfig, coefficients: BaroCoefficients) -> Self {
        Self {
            coefficients,
            temperature_window: IntRingBuffer::new(),
            pressure_window: IntRingBuffer::new(),
            slow: LowPassFilter::new(config.pressure_slow_weight),
            fast: LowPassFilter::new(config.pressure_fast_weight),
            raw_pressure: 0.0,
            ground_pressure: None,
            hold_pressure: 0.0,
            hold_target: 0.0,
            stabilization: 0,
            stabilization_ticks: config.pressure_stab_ticks,
            max_step: config.max_setpoint_step,
        }
    }

    /// Обработка новых отсчетов барометра, возвращает быстрое давление
    pub fn update(&mut self, sample: &BaroSample) -> f32 {
        // Отсчеты АЦП 24-битные, в i32 помещаются без потерь
        self.temperature_window.push(sample.raw_temperature as i32);
        let raw_temperature = self.temperature_window.average() as u32;
        let compensated = compensate(&self.coefficients, sample.raw_pressure, raw_temperature);

        self.raw_pressure = compensated.pressure as f32;
        self.pressure_window.push(compensated.pressure);
        let current = self.pressure_window.average() as f32;

        let fast = self.fast.filter(current);
        let slow = self.slow.filter(current);

        // Медленный фильтр догоняет быстрый при расхождении
        let diff = constrain(slow - fast, -8.0, 8.0);
        if diff.abs() > 1.0 {
            self.slow.set_output(slow - diff / 6.0);
        }

        fast
    }

    /// Продвижение уставки к цели, вызывается раз в цикл
    pub fn step_hold(&mut self) {
        if self.stabilization > 0 {
            self.stabilization -= 1;
            return;
        }
        let step = constrain(self.hold_target - self.hold_pressure, -self.max_step, self.max_step);
        self.hold_pressure += step;
    }

    /// Фиксация давления земли при арминге и запуск стабилизации
    pub fn capture_ground(&mut self) {
        let ground = self.slow.output();
        self.ground_pressure = Some(ground);
        self.hold_pressure = ground;
        self.hold_target = ground;
        self.stabilization = self.stabilization_ticks;
        info!("Давление на земле: {} Па", ground);
    }

    /// Удержание текущей высоты
    pub fn hold_current(&mut self) {
        let current = self.slow.output();
        self.hold_pressure = current;
        self.hold_target = current;
    }

    pub fn set_hold_target(&mut self, target: f32) {
        self.hold_target = target;
    }

    /// Сдвиг цели уставки, отрицательное значение - подъем
    pub fn shift_hold_target(&mut self, delta: f32) {
        self.hold_target += delta;
    }

    /// Ручная коррекция уставки стиком газа
    ///
    /// Во время стабилизации уставка заморожена. Цель и уставка сдвигаются
    /// вместе, шаг ограничен.
    pub fn nudge_hold(&mut self, delta: f32) {
        if self.is_stabilizing() {
            return;
        }
        let step = constrain(delta, -self.max_step, self.max_step);
        self.hold_target += step;
        self.hold_pressure += step;
    }

    /// Уставка достигла цели
    pub fn hold_reached(&self) -> bool {
        (self.hold_target - self.hold_pressure).abs() < 0.01
    }

    pub fn is_stabilizing(&self) -> bool {
        self.stabilization > 0
    }

    pub fn hold_pressure(&self) -> f32 {
        self.hold_pressure
    }

    pub fn hold_target(&self) -> f32 {
        self.hold_target
    }

    pub fn ground_pressure(&self) -> Option<f32> {
        self.ground_pressure
    }

    pub fn slow_pressure(&self) -> f32 {
        self.slow.output()
    }

    pub fn fast_pressure(&self) -> f32 {
        self.fast.output()
    }

    pub fn raw_pressure(&self) -> f32 {
        self.raw_pressure
    }

    /// Высота над точкой арминга (м)
    pub fn relative_altitude_m(&self) -> f32 {
        match self.ground_pressure {
            Some(ground) if ground > 0.0 => {
                44330.0 * (1.0 - libm::powf(self.slow.output() / ground, 0.1903))
            }
            _ => 0.0,
        }
    }
}

// Тесты для отладки на хосте
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::value_within;

    // Пример из документации датчика
    const D1: u32 = 9_085_466;
    const D2: u32 = 8_569_150;

    fn estimator(stab_ticks: u16) -> AltitudeEstimator {
        let config = FlightConfig {
            pressure_stab_ticks: stab_ticks,
            ..FlightConfig::default()
        };
        AltitudeEstimator::new(&config, BaroCoefficients::default())
    }

    fn sample() -> BaroSample {
        BaroSample {
            raw_pressure: D1,
            raw_temperature: D2,
        }
    }

    #[test]
    fn test_datasheet_compensation() {
        let result = compensate(&BaroCoefficients::default(), D1, D2);
        assert_eq!(result.temperature, 2007);
        assert_eq!(result.pressure, 100_009);
    }

    #[test]
    fn test_filters_settle_on_constant_input() {
        let mut baro = estimator(0);
        for _ in 0..100 {
            baro.update(&sample());
        }
        assert!(value_within(100_009.0, baro.fast_pressure(), 0.01));
        assert!(value_within(100_009.0, baro.slow_pressure(), 0.01));
    }

    #[test]
    fn test_temperature_ramp_window_is_exact() {
        let mut baro = estimator(0);
        for i in 0..1_000 {
            baro.update(&BaroSample {
                raw_pressure: D1,
                raw_temperature: D2 + i,
            });
        }
        // Среднее окна из 5 последних отсчетов без потери младших разрядов
        let expected = compensate(&BaroCoefficients::default(), D1, D2 + 997);
        assert_eq!(baro.raw_pressure(), expected.pressure as f32);
    }

    #[test]
    fn test_hold_is_rate_limited() {
        let mut baro = estimator(0);
        baro.update(&sample());
        baro.capture_ground();
        baro.shift_hold_target(-20.0);

        baro.step_hold();
        assert!(value_within(100_009.0 - 0.1, baro.hold_pressure(), 1e-2));
        assert!(!baro.hold_reached());

        for _ in 0..250 {
            baro.step_hold();
        }
        assert!(baro.hold_reached());
        assert!(value_within(100_009.0 - 20.0, baro.hold_pressure(), 1e-2));
    }

    #[test]
    fn test_stabilization_freezes_hold() {
        let mut baro = estimator(3);
        baro.update(&sample());
        baro.capture_ground();
        baro.shift_hold_target(-5.0);
        baro.nudge_hold(-0.1);

        for _ in 0..3 {
            assert!(baro.is_stabilizing());
            baro.step_hold();
        }
        assert!(value_within(100_009.0, baro.hold_pressure(), 1e-2));

        baro.step_hold();
        assert!(value_within(100_008.9, baro.hold_pressure(), 1e-2));
    }

    #[test]
    fn test_relative_altitude() {
        let mut baro = estimator(0);
        assert_eq!(baro.relative_altitude_m(), 0.0);
        baro.update(&sample());
        baro.capture_ground();
        assert!(value_within(0.0, baro.relative_altitude_m(), 1e-3));
    }
}
