//! Автономная навигация Liberty-Link

pub mod mission;
pub mod waypoint;

pub use mission::{NavigationContext, NavigationOutput, Navigator};
pub use waypoint::{Waypoint, WaypointCommand, WaypointError, WaypointQueue, MAX_WAYPOINTS};

use crate::protocols::link::LinkCommand;

/// Шаг автономного полета
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStep {
    #[default]
    Idle,
    /// Подбор газа и ожидание отрыва
    Takeoff,
    /// Набор безопасной высоты
    Ascent,
    /// Выбор следующей точки
    WaypointCalc,
    /// Движение уставки к точке
    GpsWaypoint,
    /// Удержание точки
    GpsSetpoint,
    /// Снижение по барометру
    Descent,
    /// Посадка по сонару
    SonarFinal,
    /// Завершение точки
    AfterSonar,
}

impl LinkStep {
    /// Номер шага в телеметрии
    pub fn code(self) -> u8 {
        match self {
            LinkStep::Idle => 0,
            LinkStep::Takeoff => 1,
            LinkStep::Ascent => 2,
            LinkStep::WaypointCalc => 3,
            LinkStep::GpsWaypoint => 4,
            LinkStep::GpsSetpoint => 5,
            LinkStep::Descent => 6,
            LinkStep::SonarFinal => 7,
            LinkStep::AfterSonar => 8,
        }
    }
}

/// Причина прерывания миссии
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AbortCause {
    LinkLost,
    GpsLost,
    /// Спутников меньше минимума
    Satellites,
    /// Команда IDLE с Liberty-Link
    Command,
}

/// Состояние навигации
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavigationState {
    pub step: LinkStep,
    /// Активная точка маршрута
    pub target: Option<Waypoint>,
    /// Текущая уставка позиции (1e-7 градуса)
    pub setpoint_lat: f32,
    pub setpoint_lon: f32,
    /// Примененный подъем уставки давления (Па)
    pub ascend_offset: f32,
    /// Последняя команда Liberty-Link
    pub last_command: Option<LinkCommand>,
}
