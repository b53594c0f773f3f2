//! Позиция по GPS с предсказанием между решениями приемника

use crate::protocols::gps::GpsFrame;
use crate::utils::filters::RingBuffer;

/// Окно ошибок позиции для производной регулятора GPS
pub const GPS_ERROR_WINDOW: usize = 35;

/// Решение о позиции
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionFix {
    /// Широта (1e-7 градуса)
    pub lat: i32,
    /// Долгота (1e-7 градуса)
    pub lon: i32,
    /// Номер цикла, в котором получено решение
    pub tick: u32,
    pub satellites: u8,
    /// Горизонтальный фактор точности (0.1)
    pub hdop: u8,
}

/// Оценка позиции
///
/// GPS выдает решение раз в `predict_cycles` циклов. Между решениями позиция
/// сдвигается на шаг линейной интерполяции, не более `predict_cycles - 1`
/// раз. Новое решение заменяет предсказание без смешивания.
#[derive(Debug, Clone)]
pub struct PositionEstimator {
    estimate: PositionFix,
    /// Последнее настоящее решение
    last_real: Option<PositionFix>,
    /// Шаг предсказания за цикл (1e-7 градуса)
    step_lat: i32,
    step_lon: i32,
    /// Число предсказанных шагов с последнего решения
    predicted: u16,
    predict_cycles: u16,
    /// Циклы без нового кадра
    lost_cycles: u16,
}

impl PositionEstimator {
    pub fn new(predict_cycles: u16) -> Self {
        Self {
            estimate: PositionFix::default(),
            last_real: None,
            step_lat: 0,
            step_lon: 0,
            predicted: 0,
            predict_cycles: predict_cycles.max(1),
            // До первого кадра GPS считается потерянным
            lost_cycles: u16::MAX,
        }
    }

    /// Прием нового решения
    pub fn ingest(&mut self, frame: &GpsFrame, tick: u32) {
        let fix = PositionFix {
            lat: frame.lat,
            lon: frame.lon,
            tick,
            satellites: frame.satellites,
            hdop: frame.hdop,
        };

        let cycles = self.predict_cycles as i32;
        match self.last_real {
            Some(prev) => {
                self.step_lat = frame.lat.wrapping_sub(prev.lat) / cycles;
                self.step_lon = frame.lon.wrapping_sub(prev.lon) / cycles;
            }
            None => {
                self.step_lat = 0;
                self.step_lon = 0;
            }
        }

        self.estimate = fix;
        self.last_real = Some(fix);
        self.predicted = 0;
        self.lost_cycles = 0;
    }

    /// Цикл без нового кадра: предсказание и счетчик потери
    pub fn predict(&mut self) {
        self.lost_cycles = self.lost_cycles.saturating_add(1);
        if self.last_real.is_none() {
            return;
        }
        if self.predicted + 1 < self.predict_cycles {
            self.estimate.lat = self.estimate.lat.wrapping_add(self.step_lat);
            self.estimate.lon = self.estimate.lon.wrapping_add(self.step_lon);
            self.predicted += 1;
        }
    }

    pub fn fix(&self) -> PositionFix {
        self.estimate
    }

    pub fn last_real(&self) -> Option<PositionFix> {
        self.last_real
    }

    pub fn has_fix(&self) -> bool {
        self.last_real.is_some()
    }

    pub fn satellites(&self) -> u8 {
        self.estimate.satellites
    }

    pub fn lost_cycles(&self) -> u16 {
        self.lost_cycles
    }
}

/// Скользящее окно приращений ошибки позиции
///
/// Сумма приращений за окно равна изменению ошибки за 35 циклов и служит
/// сглаженной производной для регулятора GPS.
#[derive(Debug, Clone, Default)]
pub struct GpsErrorWindow {
    lat: RingBuffer<GPS_ERROR_WINDOW>,
    lon: RingBuffer<GPS_ERROR_WINDOW>,
    previous: Option<(f32, f32)>,
}

impl GpsErrorWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавление ошибок, возвращает сглаженные производные по осям
    pub fn update(&mut self, error_lat: f32, error_lon: f32) -> (f32, f32) {
        let (prev_lat, prev_lon) = self.previous.unwrap_or((error_lat, error_lon));
        self.lat.push(error_lat - prev_lat);
        self.lon.push(error_lon - prev_lon);
        self.previous = Some((error_lat, error_lon));
        (self.lat.sum(), self.lon.sum())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
