//! Аварийная защита: набор ошибок, ошибки старта и ежетактная проверка
//! состояния

use embassy_time::Instant;

use crate::config::flight::battery;
use crate::config::FlightConfig;

/// Флаг ошибки времени работы
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorFlag {
    LowBattery,
    LoopOverrun,
    GpsLost,
    LinkLost,
    /// Взлет отклонен предполетной проверкой
    ManualTakeoffRejected,
    /// Отрыв не обнаружен до потолка газа
    TakeoffNotDetected,
    /// Газ отрыва неправдоподобно мал
    TakeoffNotCalculated,
    /// Нет эха нижнего сонара при взлете по сонару
    SonarTakeoff,
    /// Передний сонар видит препятствие
    SonarCollision,
    /// Аварийное отключение моторов, не сбрасывается
    FlightTermination,
}

impl ErrorFlag {
    pub const ALL: [ErrorFlag; 10] = [
        ErrorFlag::LowBattery,
        ErrorFlag::LoopOverrun,
        ErrorFlag::GpsLost,
        ErrorFlag::LinkLost,
        ErrorFlag::ManualTakeoffRejected,
        ErrorFlag::TakeoffNotDetected,
        ErrorFlag::TakeoffNotCalculated,
        ErrorFlag::SonarTakeoff,
        ErrorFlag::SonarCollision,
        ErrorFlag::FlightTermination,
    ];

    /// Бит флага в телеметрии
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// Набор активных ошибок
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorSet(u16);

impl ErrorSet {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn contains(&self, flag: ErrorFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn insert(&mut self, flag: ErrorFlag) {
        if !self.contains(flag) {
            warn!("Ошибка: {:?}", flag);
        }
        self.0 |= flag.bit();
    }

    /// Снятие флага; аварийное отключение снять нельзя
    pub fn remove(&mut self, flag: ErrorFlag) {
        if flag == ErrorFlag::FlightTermination {
            return;
        }
        self.0 &= !flag.bit();
    }

    /// Установка или снятие флага по условию
    pub fn set(&mut self, flag: ErrorFlag, active: bool) {
        if active {
            self.insert(flag);
        } else {
            self.remove(flag);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_terminated(&self) -> bool {
        self.contains(ErrorFlag::FlightTermination)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = ErrorFlag> + '_ {
        ErrorFlag::ALL.into_iter().filter(|flag| self.contains(*flag))
    }
}

/// Ошибка старта: датчик не отвечает
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    Imu,
    Compass,
    Barometer,
    Sonar,
    Receiver,
}

impl BootError {
    const ALL: [BootError; 5] = [
        BootError::Imu,
        BootError::Compass,
        BootError::Barometer,
        BootError::Sonar,
        BootError::Receiver,
    ];

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Результат проверки датчиков при старте
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport(u8);

impl BootReport {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, error: BootError) {
        error!("Ошибка старта: {:?}", error);
        self.0 |= error.bit();
    }

    pub fn contains(&self, error: BootError) -> bool {
        self.0 & error.bit() != 0
    }

    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }

    /// Первая ошибка по порядку проверки
    pub fn first(&self) -> Option<BootError> {
        BootError::ALL.into_iter().find(|e| self.contains(*e))
    }
}

/// Ошибка арминга
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmError {
    /// Датчик не прошел проверку при старте
    Boot(BootError),
    /// Было аварийное отключение
    Terminated,
}

impl From<BootError> for ArmError {
    fn from(error: BootError) -> Self {
        ArmError::Boot(error)
    }
}

/// Данные для проверки одного цикла
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInputs {
    pub started_at: Instant,
    pub battery_voltage: f32,
    /// Циклы без кадра GPS
    pub gps_lost_cycles: u16,
    /// Отклик переднего сонара
    pub front_spring: f32,
}

/// Действие, которое защита навязывает циклу
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FailSafeAction {
    /// Прервать автономный полет
    pub abort: bool,
    /// Отключить моторы
    pub cutoff: bool,
}

/// Проверка состояния каждый цикл
///
/// Все флаги кроме аварийного отключения пересчитываются заново.
#[derive(Debug, Clone)]
pub struct FailSafe {
    max_period_us: u64,
    warning_voltage: f32,
    present_voltage: f32,
    gps_lost_cycles: u16,
    link_lost_cycles: u16,
    link_enabled: bool,
    last_start: Option<Instant>,
    /// Циклы без кадра Liberty-Link
    link_silence: u16,
}

impl FailSafe {
    pub fn new(config: &FlightConfig, link_enabled: bool) -> Self {
        Self {
            max_period_us: config.max_loop_period_us,
            warning_voltage: config.battery_warning_voltage,
            present_voltage: battery::PRESENT_VOLTAGE,
            gps_lost_cycles: config.gps_lost_cycles,
            link_lost_cycles: config.link_lost_cycles,
            link_enabled,
            last_start: None,
            link_silence: 0,
        }
    }

    /// Принят корректный кадр Liberty-Link
    pub fn note_link_frame(&mut self) {
        self.link_silence = 0;
    }

    pub fn link_silence(&self) -> u16 {
        self.link_silence
    }

    pub fn evaluate(&mut self, errors: &mut ErrorSet, inputs: &HealthInputs) -> FailSafeAction {
        let battery_low =
            inputs.battery_voltage < self.warning_voltage && inputs.battery_voltage > self.present_voltage;
        errors.set(ErrorFlag::LowBattery, battery_low);

        let overrun = match self.last_start {
            Some(last) => inputs
                .started_at
                .checked_duration_since(last)
                .is_some_and(|period| period.as_micros() > self.max_period_us),
            None => false,
        };
        self.last_start = Some(inputs.started_at);
        errors.set(ErrorFlag::LoopOverrun, overrun);

        errors.set(
            ErrorFlag::GpsLost,
            inputs.gps_lost_cycles >= self.gps_lost_cycles,
        );

        self.link_silence = self.link_silence.saturating_add(1);
        let link_lost = self.link_enabled && self.link_silence >= self.link_lost_cycles;
        errors.set(ErrorFlag::LinkLost, link_lost);

        errors.set(ErrorFlag::SonarCollision, inputs.front_spring > 0.0);

        FailSafeAction {
            abort: link_lost,
            cutoff: errors.is_terminated(),
        }
    }
}
