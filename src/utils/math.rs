//! Математические функции и утилиты

#[allow(unused_imports)]
use num_traits::Float;

use crate::config::flight::stick;
use crate::config::hardware::motors::PULSE_CENTER;

/// Метров в единице фиксированной точки координат (1e-7 градуса широты)
pub const METERS_PER_COORD_UNIT: f32 = 0.011_132;

/// Ограничение значения в заданных пределах
#[inline(always)]
pub fn constrain(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Зона нечувствительности для отклонения стика от центра (мкс)
///
/// Внутри зоны возвращает 0, снаружи значение сдвигается к нулю на ширину
/// зоны, чтобы на ее границе не было скачка.
#[inline]
pub fn apply_deadband(offset: f32, deadband: f32) -> f32 {
    if offset > deadband {
        offset - deadband
    } else if offset < -deadband {
        offset + deadband
    } else {
        0.0
    }
}

/// Экспоненциальная кривая газа в ручном режиме
///
/// `1500 ± exp(|t - 1500| / exp) * rate`, уменьшает чувствительность около
/// центра. Результат ограничен диапазоном стика.
pub fn throttle_expo(throttle: u16) -> f32 {
    let offset = throttle as f32 - PULSE_CENTER as f32;
    // Ступень ±rate в центре заложена в кривой, exp(0) = 1
    let shaped = libm::expf(offset.abs() / stick::THROTTLE_EXP) * stick::THROTTLE_RATE;
    let value = if offset >= 0.0 {
        PULSE_CENTER as f32 + shaped
    } else {
        PULSE_CENTER as f32 - shaped
    };
    constrain(value, 1000.0, 2000.0)
}

/// Нормализация курса в диапазон [0, 360)
#[inline]
pub fn wrap_heading(heading: f32) -> f32 {
    let mut wrapped = heading % 360.0;
    if wrapped < 0.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Кратчайшее отклонение от курса `from` до курса `to`, диапазон [-180, 180]
#[inline]
pub fn heading_deviation(from: f32, to: f32) -> f32 {
    let mut diff = wrap_heading(to) - wrap_heading(from);
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff < -180.0 {
        diff += 360.0;
    }
    diff
}

/// Масштаб долготы на заданной широте (1e-7 градуса)
#[inline]
pub fn longitude_scale(lat: i32) -> f32 {
    libm::cosf((lat as f32 / 10_000_000.0).to_radians())
}

/// Смещение цели относительно текущей позиции в метрах (север, восток)
///
/// Плоская аппроксимация, пригодная для расстояний миссии в пределах
/// нескольких километров.
pub fn gps_offset_m(from_lat: i32, from_lon: i32, to_lat: i32, to_lon: i32) -> (f32, f32) {
    let d_lat = to_lat.wrapping_sub(from_lat) as f32;
    let d_lon = to_lon.wrapping_sub(from_lon) as f32;
    let north = d_lat * METERS_PER_COORD_UNIT;
    let east = d_lon * METERS_PER_COORD_UNIT * longitude_scale(from_lat);
    (north, east)
}

/// Расстояние между двумя точками в метрах
pub fn gps_distance_m(from_lat: i32, from_lon: i32, to_lat: i32, to_lon: i32) -> f32 {
    let (north, east) = gps_offset_m(from_lat, from_lon, to_lat, to_lon);
    libm::sqrtf(north * north + east * east)
}

// Модульные тесты
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{value_close, value_within};

    #[test]
    fn test_constrain() {
        assert_eq!(constrain(5.0, 0.0, 10.0), 5.0);
        assert_eq!(constrain(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(constrain(15.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn test_deadband_is_continuous() {
        assert_eq!(apply_deadband(5.0, 8.0), 0.0);
        assert_eq!(apply_deadband(-8.0, 8.0), 0.0);
        assert!(value_close(apply_deadband(10.0, 8.0), 2.0));
        assert!(value_close(apply_deadband(-58.0, 50.0), -8.0));
    }

    #[test]
    fn test_throttle_expo_symmetric() {
        let up = throttle_expo(1700) - 1500.0;
        let down = 1500.0 - throttle_expo(1300);
        assert!(value_within(up, down, 1e-3));
        // Около центра кривая пологая
        assert!(throttle_expo(1510) - 1500.0 < 10.0);
        assert!(throttle_expo(2000) <= 2000.0);
        assert!(throttle_expo(1000) >= 1000.0);
    }

    #[test]
    fn test_throttle_expo_center_step() {
        assert!(value_close(throttle_expo(1500), 1506.0));
        assert!(value_within(throttle_expo(1499), 1494.0, 0.1));
    }

    #[test]
    fn test_heading_deviation_wraps() {
        assert!(value_close(heading_deviation(350.0, 10.0), 20.0));
        assert!(value_close(heading_deviation(10.0, 350.0), -20.0));
        assert!(value_close(wrap_heading(-90.0), 270.0));
        assert!(value_close(wrap_heading(720.0), 0.0));
    }

    #[test]
    fn test_gps_distance_on_equator() {
        // 0.001 градуса долготы на экваторе ~ 111 метров
        let distance = gps_distance_m(0, 0, 0, 10_000);
        assert!(value_within(111.32, distance, 0.5));

        // На широте 60 градусов долгота сжимается вдвое
        let lat = 600_000_000;
        let (_, east) = gps_offset_m(lat, 0, lat, 10_000);
        assert!(value_within(55.66, east, 0.5));
    }
}
