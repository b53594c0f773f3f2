//! Ядро полетного контроллера квадрокоптера Liberty-X
//!
//! Оценка положения, каскад PID регуляторов, автономная навигация
//! Liberty-Link и слой аварийной защиты. Работа с шинами датчиков
//! и запись в EEPROM остаются за пределами крейта.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod control;
pub mod data;
pub mod flight;
pub mod navigation;
pub mod protocols;
pub mod safety;
pub mod sensors;
pub mod tasks;
pub mod utils;

pub use config::{Calibration, Capabilities, ConfigError, FlightConfig};
pub use data::{CycleInputs, CycleOutputs, MotorOutputs};
pub use flight::{FlightController, FlightState};
pub use navigation::LinkStep;
pub use safety::{ArmError, BootError, BootReport, ErrorFlag, ErrorSet};

#[cfg(test)]
mod test_utils;

// Реализация критической секции для каналов embassy-sync на хосте
#[cfg(test)]
use critical_section as _;
