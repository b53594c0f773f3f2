//! Алгоритмы объединения данных с датчиков (sensor fusion)

#[allow(unused_imports)]
use num_traits::Float;

use crate::config::flight::filters::COMPASS_PULL_DIVIDER;
use crate::config::{Calibration, CompassCalibration};
use crate::data::{ImuSample, MagSample};
use crate::utils::filters::RingBuffer;
use crate::utils::math::{heading_deviation, wrap_heading};

/// Размер окна вертикального ускорения
pub const VERTICAL_ACCEL_WINDOW: usize = 25;

/// Результат работы фильтра
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttitudeState {
    /// Угол крена (градусы), правое крыло вниз положительно
    pub roll: f32,
    /// Угол тангажа (градусы), нос вверх положительно
    pub pitch: f32,
    /// Курс (градусы, 0..360)
    pub yaw: f32,
    /// Сглаженная угловая скорость крена для PID (град/с)
    pub roll_rate: f32,
    /// Сглаженная угловая скорость тангажа для PID (град/с)
    pub pitch_rate: f32,
    /// Сглаженная угловая скорость рыскания для PID (град/с)
    pub yaw_rate: f32,
}

/// Комплементарный фильтр ориентации
///
/// Углы интегрируются по гироскопу, акселерометр медленно подтягивает крен
/// и тангаж к горизонту, компас так же медленно подтягивает курс.
#[derive(Debug, Clone)]
pub struct AttitudeEstimator {
    state: AttitudeState,
    /// Вес акселерометра за такт
    weight: f32,
    /// Вес нового значения гироскопа во входе PID
    gyro_input_weight: f32,
    gyro_bias: nalgebra::Vector3<f32>,
    roll_trim: f32,
    pitch_trim: f32,
    compass: CompassCalibration,
    /// Последний курс по компасу
    last_heading: Option<f32>,
    /// Флаг первой итерации
    initialized: bool,
}

impl AttitudeEstimator {
    pub fn new(weight: f32, gyro_input_weight: f32, calibration: &Calibration) -> Self {
        Self {
            state: AttitudeState::default(),
            weight: weight.clamp(0.0, 1.0),
            gyro_input_weight: gyro_input_weight.clamp(0.0, 1.0),
            gyro_bias: calibration.gyro_bias,
            roll_trim: calibration.acc_roll_trim_deg,
            pitch_trim: calibration.acc_pitch_trim_deg,
            compass: calibration.compass,
            last_heading: None,
            initialized: false,
        }
    }

    /// Обновление фильтра новыми данными
    pub fn update(&mut self, imu: &ImuSample, mag: Option<&MagSample>, dt: f32) -> AttitudeState {
        let gyro = imu.gyro - self.gyro_bias;
        let level = self.accel_angles(imu);

        // При первом вызове инициализируем углы из акселерометра
        if !self.initialized {
            if let Some((roll, pitch)) = level {
                self.state.roll = roll;
                self.state.pitch = pitch;
            }
            self.state.roll_rate = gyro.x;
            self.state.pitch_rate = gyro.y;
            self.state.yaw_rate = gyro.z;
            self.initialized = true;
        } else {
            let w = self.gyro_input_weight;
            self.state.roll_rate = self.state.roll_rate * (1.0 - w) + gyro.x * w;
            self.state.pitch_rate = self.state.pitch_rate * (1.0 - w) + gyro.y * w;
            self.state.yaw_rate = self.state.yaw_rate * (1.0 - w) + gyro.z * w;

            // Интегрирование угловых скоростей гироскопа
            self.state.roll += gyro.x * dt;
            self.state.pitch += gyro.y * dt;
            self.state.yaw = wrap_heading(self.state.yaw + gyro.z * dt);

            // Поворот по рысканию переносит крен в тангаж и обратно
            let yaw_step = libm::sinf((gyro.z * dt).to_radians());
            let roll = self.state.roll;
            self.state.pitch -= roll * yaw_step;
            self.state.roll += self.state.pitch * yaw_step;

            // Коррекция дрейфа по акселерометру
            if let Some((roll_acc, pitch_acc)) = level {
                self.state.roll = self.state.roll * (1.0 - self.weight) + roll_acc * self.weight;
                self.state.pitch = self.state.pitch * (1.0 - self.weight) + pitch_acc * self.weight;
            }
        }

        if let Some(sample) = mag {
            let heading = self.compass_heading(sample);
            match self.last_heading {
                // Первый отсчет компаса задает курс
                None => self.state.yaw = heading,
                Some(_) => {
                    let deviation = heading_deviation(self.state.yaw, heading);
                    self.state.yaw = wrap_heading(self.state.yaw + deviation / COMPASS_PULL_DIVIDER);
                }
            }
            self.last_heading = Some(heading);
        }

        self.state
    }

    /// Крен и тангаж по вектору гравитации, `None` при нулевом векторе
    fn accel_angles(&self, imu: &ImuSample) -> Option<(f32, f32)> {
        let a = imu.accel;
        let total = a.norm();
        if total < 1e-3 {
            return None;
        }
        let roll = libm::atan2f(a.y, a.z).to_degrees();
        let pitch = libm::asinf((a.x / total).clamp(-1.0, 1.0)).to_degrees();
        Some((roll - self.roll_trim, pitch - self.pitch_trim))
    }

    /// Курс по компасу с компенсацией наклона и склонения
    pub fn compass_heading(&self, sample: &MagSample) -> f32 {
        let c = &self.compass;
        let m = sample.field - c.offsets;
        let (mx, my, mz) = (m.x, m.y * c.scale_y, m.z * c.scale_z);

        let roll = self.state.roll.to_radians();
        let pitch = self.state.pitch.to_radians();
        let (sin_r, cos_r) = (libm::sinf(roll), libm::cosf(roll));
        let (sin_p, cos_p) = (libm::sinf(pitch), libm::cosf(pitch));

        let x_h = mx * cos_p + my * sin_r * sin_p + mz * cos_r * sin_p;
        let y_h = my * cos_r - mz * sin_r;

        wrap_heading(libm::atan2f(y_h, x_h).to_degrees() + c.declination_deg)
    }

    pub fn state(&self) -> AttitudeState {
        self.state
    }

    /// Сброс фильтра
    pub fn reset(&mut self) {
        self.state = AttitudeState::default();
        self.last_heading = None;
        self.initialized = false;
    }
}

/// Окно модуля ускорения для детекции отрыва при взлете
#[derive(Debug, Clone, Default)]
pub struct VerticalAccel {
    window: RingBuffer<VERTICAL_ACCEL_WINDOW>,
    /// Среднее значение, зафиксированное при арминге
    reference: f32,
}

impl VerticalAccel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, imu: &ImuSample) {
        self.window.push(imu.accel.norm());
    }

    /// Фиксация опорного значения (на земле)
    pub fn capture_reference(&mut self) {
        self.reference = self.window.average();
    }

    /// Превышение среднего ускорения над опорным (g)
    pub fn excess(&self) -> f32 {
        self.window.average() - self.reference
    }
}

// Тесты для отладки на хосте
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{value_close, value_within};
    use nalgebra::Vector3;

    const DT: f32 = 0.004;

    fn level_imu(gyro: Vector3<f32>) -> ImuSample {
        ImuSample {
            accel: Vector3::new(0.0, 0.0, 1.0),
            gyro,
        }
    }

    #[test]
    fn test_first_update_levels_from_accel() {
        let mut estimator = AttitudeEstimator::new(0.0004, 0.3, &Calibration::default());
        // Нос поднят на 30 градусов
        let imu = ImuSample {
            accel: Vector3::new(0.5, 0.0, 0.866),
            gyro: Vector3::zeros(),
        };
        let state = estimator.update(&imu, None, DT);
        assert!(value_within(30.0, state.pitch, 0.05));
        assert!(value_close(0.0, state.roll));
    }

    #[test]
    fn test_gyro_integration_and_bias() {
        let calibration = Calibration {
            gyro_bias: Vector3::new(1.0, 0.0, 0.0),
            ..Calibration::default()
        };
        let mut estimator = AttitudeEstimator::new(0.0004, 0.3, &calibration);
        estimator.update(&level_imu(Vector3::new(1.0, 0.0, 0.0)), None, DT);

        // 250 тактов по 11 град/с (10 после вычета смещения) дают 10 градусов,
        // акселерометр за это время возвращает около полуградуса
        for _ in 0..250 {
            estimator.update(&level_imu(Vector3::new(11.0, 0.0, 0.0)), None, DT);
        }
        let state = estimator.state();
        assert!(value_within(9.51, state.roll, 0.05));
        assert!(value_within(10.0, state.roll_rate, 0.01));
    }

    #[test]
    fn test_accel_pulls_drift_back() {
        let mut estimator = AttitudeEstimator::new(0.0004, 0.3, &Calibration::default());
        estimator.update(&level_imu(Vector3::zeros()), None, DT);
        estimator.state.roll = 5.0;
        for _ in 0..2500 {
            estimator.update(&level_imu(Vector3::zeros()), None, DT);
        }
        // Через 10 секунд остается около 5 * (1 - 0.0004)^2500 ~ 1.8 градуса
        let roll = estimator.state().roll;
        assert!(roll < 2.0 && roll > 1.5);
    }

    #[test]
    fn test_compass_heading_level() {
        let calibration = Calibration {
            compass: CompassCalibration {
                declination_deg: 0.0,
                ..CompassCalibration::default()
            },
            ..Calibration::default()
        };
        let estimator = AttitudeEstimator::new(0.0004, 0.3, &calibration);
        let north = MagSample {
            field: Vector3::new(1.0, 0.0, 0.0),
        };
        assert!(value_within(0.0, estimator.compass_heading(&north), 0.01));

        // Север справа от носа - аппарат смотрит на запад
        let west = MagSample {
            field: Vector3::new(0.0, -1.0, 0.0),
        };
        assert!(value_within(270.0, estimator.compass_heading(&west), 0.01));
    }

    #[test]
    fn test_compass_snaps_then_pulls() {
        let calibration = Calibration {
            compass: CompassCalibration {
                declination_deg: 0.0,
                ..CompassCalibration::default()
            },
            ..Calibration::default()
        };
        let mut estimator = AttitudeEstimator::new(0.0004, 0.3, &calibration);
        let east = MagSample {
            field: Vector3::new(0.0, 1.0, 0.0),
        };
        let state = estimator.update(&level_imu(Vector3::zeros()), Some(&east), DT);
        assert!(value_within(90.0, state.yaw, 0.01));

        // Отклонение 12 градусов уменьшается на 12 / 1200 за такт
        estimator.state.yaw = 78.0;
        let state = estimator.update(&level_imu(Vector3::zeros()), Some(&east), DT);
        assert!(value_within(78.01, state.yaw, 0.001));
    }

    #[test]
    fn test_vertical_accel_excess() {
        let mut accel = VerticalAccel::new();
        for _ in 0..VERTICAL_ACCEL_WINDOW {
            accel.update(&level_imu(Vector3::zeros()));
        }
        accel.capture_reference();
        assert!(value_close(0.0, accel.excess()));

        let lift = ImuSample {
            accel: Vector3::new(0.0, 0.0, 1.3),
            gyro: Vector3::zeros(),
        };
        for _ in 0..VERTICAL_ACCEL_WINDOW {
            accel.update(&lift);
        }
        assert!(value_within(0.3, accel.excess(), 1e-3));
    }
}
