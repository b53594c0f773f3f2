//! Модель двухканального ультразвукового дальномера

use crate::config::FlightConfig;
use crate::data::SonarSample;

/// Последние два отсчета одного канала (мм), 0 - нет эха
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SonarChannel {
    latest: u16,
    previous: u16,
}

impl SonarChannel {
    fn push(&mut self, distance_mm: u16) {
        self.previous = self.latest;
        self.latest = distance_mm;
    }

    pub fn latest(&self) -> u16 {
        self.latest
    }

    pub fn previous(&self) -> u16 {
        self.previous
    }

    pub fn has_echo(&self) -> bool {
        self.latest != 0
    }

    /// Оба последних отсчета есть и ниже порога
    pub fn stably_below(&self, threshold_mm: u16) -> bool {
        self.latest != 0
            && self.previous != 0
            && self.latest < threshold_mm
            && self.previous < threshold_mm
    }
}

/// Модель "пружины": чем ближе препятствие, тем сильнее отклонение назад
#[derive(Debug, Clone)]
pub struct SonarModel {
    bottom: SonarChannel,
    front: SonarChannel,
    start_mm: u16,
    stop_mm: u16,
    max_pitch: f32,
}

impl SonarModel {
    pub fn new(config: &FlightConfig) -> Self {
        Self {
            bottom: SonarChannel::default(),
            front: SonarChannel::default(),
            start_mm: config.sonar_spring_start_mm,
            stop_mm: config.sonar_spring_stop_mm,
            max_pitch: config.sonar_spring_max_pitch,
        }
    }

    pub fn update(&mut self, sample: &SonarSample) {
        self.bottom.push(sample.bottom_mm);
        self.front.push(sample.front_mm);
    }

    /// Отклик пружины на расстояние
    ///
    /// Ноль при отсутствии эха и на расстоянии от `start` и дальше, максимум
    /// на `stop` и ближе, между порогами линейно.
    pub fn spring(&self, distance_mm: u16) -> f32 {
        if distance_mm == 0 || distance_mm >= self.start_mm {
            return 0.0;
        }
        if distance_mm <= self.stop_mm {
            return self.max_pitch;
        }
        let span = (self.start_mm - self.stop_mm) as f32;
        self.max_pitch * (self.start_mm - distance_mm) as f32 / span
    }

    /// Отклик по переднему каналу
    pub fn front_spring(&self) -> f32 {
        self.spring(self.front.latest())
    }

    pub fn bottom(&self) -> &SonarChannel {
        &self.bottom
    }

    pub fn front(&self) -> &SonarChannel {
        &self.front
    }

    /// Изменение нижнего расстояния относительно опорного (мм)
    pub fn bottom_rise(&self, reference_mm: u16) -> i32 {
        if !self.bottom.has_echo() {
            return 0;
        }
        self.bottom.latest() as i32 - reference_mm as i32
    }
}

// Тесты для отладки на хосте
#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SonarModel {
        SonarModel::new(&FlightConfig::default())
    }

    #[test]
    fn test_spring_envelope() {
        let sonar = model();
        assert_eq!(sonar.spring(0), 0.0);
        assert_eq!(sonar.spring(1000), 0.0);
        assert_eq!(sonar.spring(3000), 0.0);
        assert_eq!(sonar.spring(100), 200.0);
        assert_eq!(sonar.spring(20), 200.0);
        assert!((sonar.spring(550) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_spring_monotonic() {
        let sonar = model();
        let mut previous = sonar.spring(1000);
        for distance in (1..1000u16).rev() {
            let value = sonar.spring(distance);
            assert!(value >= previous);
            previous = value;
        }
    }

    #[test]
    fn test_shutoff_requires_two_samples() {
        let mut sonar = model();
        sonar.update(&SonarSample {
            bottom_mm: 300,
            front_mm: 0,
        });
        assert!(!sonar.bottom().stably_below(500));
        sonar.update(&SonarSample {
            bottom_mm: 280,
            front_mm: 0,
        });
        assert!(sonar.bottom().stably_below(500));
        assert_eq!(sonar.bottom_rise(200), 80);
        assert_eq!(sonar.front_spring(), 0.0);
    }
}
