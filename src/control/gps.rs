//! Регулятор удержания позиции по GPS

use crate::config::PidSet;
use crate::control::pid::PidController;
use crate::sensors::{GpsErrorWindow, PositionFix};
use crate::utils::math::{constrain, longitude_scale};

/// Ошибка переводится в единицы 1e-6 градуса (~11 см)
const ERROR_SCALE: f32 = 0.1;

/// Поправки к стикам крена и тангажа (мкс)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsAdjust {
    pub roll: f32,
    pub pitch: f32,
}

/// Регулятор позиции: P по ошибке и D по окну приращений ошибки
#[derive(Debug, Clone)]
pub struct GpsController {
    lat_pid: PidController,
    lon_pid: PidController,
    window: GpsErrorWindow,
    window_kd: f32,
    limit: f32,
}

impl GpsController {
    pub fn new(gains: &PidSet) -> Self {
        Self {
            lat_pid: PidController::new(gains.gps),
            lon_pid: PidController::new(gains.gps),
            window: GpsErrorWindow::new(),
            window_kd: gains.gps_window_kd,
            limit: gains.gps.output_limit,
        }
    }

    /// Поправки для движения к цели с учетом курса аппарата
    ///
    /// Цель на севере при курсе 0 дает наклон носом вниз (отрицательный
    /// тангаж), цель на востоке - крен вправо.
    pub fn update(
        &mut self,
        target_lat: f32,
        target_lon: f32,
        fix: &PositionFix,
        heading_deg: f32,
        dt: f32,
    ) -> GpsAdjust {
        let error_lat = (target_lat - fix.lat as f32) * ERROR_SCALE;
        let error_lon = (target_lon - fix.lon as f32) * ERROR_SCALE * longitude_scale(fix.lat);

        let (d_lat, d_lon) = self.window.update(error_lat, error_lon);
        let north = constrain(
            self.lat_pid.update(error_lat, 0.0, dt) + d_lat * self.window_kd,
            -self.limit,
            self.limit,
        );
        let east = constrain(
            self.lon_pid.update(error_lon, 0.0, dt) + d_lon * self.window_kd,
            -self.limit,
            self.limit,
        );

        let heading = heading_deg.to_radians();
        let (sin_h, cos_h) = (libm::sinf(heading), libm::cosf(heading));
        let forward = north * cos_h + east * sin_h;
        let right = east * cos_h - north * sin_h;

        GpsAdjust {
            roll: constrain(right, -self.limit, self.limit),
            pitch: constrain(-forward, -self.limit, self.limit),
        }
    }

    pub fn reset(&mut self) {
        self.lat_pid.reset();
        self.lon_pid.reset();
        self.window.reset();
    }
}
