//! Данные одного цикла: входы датчиков и пульта, выходы на моторы
//! и очереди кадров между прерываниями UART и главным циклом

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Instant;
use heapless::Vec;
use nalgebra::Vector3;

use crate::config::flight::telemetry::BURST_BYTES;
use crate::config::hardware::motors::{PULSE_CENTER, PULSE_CUTOFF};
use crate::config::hardware::serial::{GPS_CHANNEL_SIZE, LINK_CHANNEL_SIZE};
use crate::config::hardware::voltmeter::VOLTAGE_ADC_DIVIDER;
use crate::protocols::gps::GpsFrame;
use crate::protocols::link::LinkFrame;

/// Данные с IMU после вычета смещений нуля
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImuSample {
    /// Ускорение (g), X - вперед, Y - влево, Z - вверх
    pub accel: Vector3<f32>,
    /// Угловая скорость (град/с): крен, тангаж, рыскание
    pub gyro: Vector3<f32>,
}

impl Default for ImuSample {
    fn default() -> Self {
        Self {
            accel: Vector3::new(0.0, 0.0, 1.0),
            gyro: Vector3::zeros(),
        }
    }
}

/// Сырые отсчеты АЦП барометра (D1 - давление, D2 - температура)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaroSample {
    pub raw_pressure: u32,
    pub raw_temperature: u32,
}

/// Сырые показания магнитометра
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MagSample {
    pub field: Vector3<f32>,
}

/// Расстояния двухканального сонара (мм), 0 - нет эха
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SonarSample {
    /// Нижний канал: расстояние до земли
    pub bottom_mm: u16,
    /// Передний канал: расстояние до препятствия
    pub front_mm: u16,
}

/// Показания датчиков за один цикл
///
/// Барометр, компас и сонар обновляются реже цикла, поэтому необязательны.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorInputs {
    pub imu: ImuSample,
    pub baro: Option<BaroSample>,
    pub mag: Option<MagSample>,
    pub sonar: Option<SonarSample>,
    /// Напряжение батареи (В)
    pub battery_voltage: f32,
}

impl Default for SensorInputs {
    fn default() -> Self {
        Self {
            imu: ImuSample::default(),
            baro: None,
            mag: None,
            sonar: None,
            battery_voltage: 12.4,
        }
    }
}

/// Перевод отсчета АЦП делителя батареи в вольты
pub fn battery_voltage_from_adc(raw: u16) -> f32 {
    raw as f32 / VOLTAGE_ADC_DIVIDER
}

/// Режим полета, выбранный переключателем пульта
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlightMode {
    /// Стабилизация горизонта, газ напрямую
    #[default]
    Manual,
    /// Удержание высоты по барометру
    AltitudeHold,
    /// Удержание высоты и позиции по GPS
    GpsHold,
}

impl FlightMode {
    pub fn holds_altitude(self) -> bool {
        matches!(self, FlightMode::AltitudeHold | FlightMode::GpsHold)
    }

    pub fn code(self) -> u8 {
        match self {
            FlightMode::Manual => 1,
            FlightMode::AltitudeHold => 2,
            FlightMode::GpsHold => 3,
        }
    }
}

/// Импульсы пульта (мкс)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickInputs {
    pub roll: u16,
    pub pitch: u16,
    pub yaw: u16,
    pub throttle: u16,
    pub mode: FlightMode,
    /// Положение тумблера арминга
    pub arm_switch: bool,
}

impl Default for StickInputs {
    fn default() -> Self {
        Self {
            roll: PULSE_CENTER,
            pitch: PULSE_CENTER,
            yaw: PULSE_CENTER,
            throttle: PULSE_CUTOFF,
            mode: FlightMode::Manual,
            arm_switch: false,
        }
    }
}

/// Все входы одного цикла
#[derive(Clone, Debug)]
pub struct CycleInputs {
    /// Момент начала цикла
    pub started_at: Instant,
    pub sensors: SensorInputs,
    pub sticks: StickInputs,
    /// Кадры GPS, принятые с прошлого цикла
    pub gps_frames: Vec<GpsFrame, GPS_CHANNEL_SIZE>,
    /// Кадры Liberty-Link, принятые с прошлого цикла
    pub link_frames: Vec<LinkFrame, LINK_CHANNEL_SIZE>,
}

impl CycleInputs {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            sensors: SensorInputs::default(),
            sticks: StickInputs::default(),
            gps_frames: Vec::new(),
            link_frames: Vec::new(),
        }
    }
}

/// Импульсы на регуляторы моторов (мкс), X-схема
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorOutputs {
    pub front_right: u16,
    pub rear_right: u16,
    pub rear_left: u16,
    pub front_left: u16,
}

impl MotorOutputs {
    /// Все моторы остановлены
    pub const fn cutoff() -> Self {
        Self {
            front_right: PULSE_CUTOFF,
            rear_right: PULSE_CUTOFF,
            rear_left: PULSE_CUTOFF,
            front_left: PULSE_CUTOFF,
        }
    }

    pub fn as_array(&self) -> [u16; 4] {
        [
            self.front_right,
            self.rear_right,
            self.rear_left,
            self.front_left,
        ]
    }

    pub fn is_cutoff(&self) -> bool {
        self.as_array().iter().all(|p| *p == PULSE_CUTOFF)
    }
}

impl Default for MotorOutputs {
    fn default() -> Self {
        Self::cutoff()
    }
}

/// Результат одного цикла
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleOutputs {
    pub motors: MotorOutputs,
    /// Очередная порция кадра телеметрии
    pub telemetry: Vec<u8, BURST_BYTES>,
    /// Импульс сброса груза (один цикл)
    pub parcel_release: bool,
    /// Запуск измерения сонара в этом цикле
    pub sonar_trigger: bool,
}

/// Каналы кадров от обработчиков UART к главному циклу
pub struct DataChannels {
    pub gps_channel: Channel<CriticalSectionRawMutex, GpsFrame, GPS_CHANNEL_SIZE>,
    pub link_channel: Channel<CriticalSectionRawMutex, LinkFrame, LINK_CHANNEL_SIZE>,
}

impl DataChannels {
    pub const fn new() -> Self {
        Self {
            gps_channel: Channel::new(),
            link_channel: Channel::new(),
        }
    }

    /// Перенос всех принятых кадров во входы цикла
    ///
    /// Кадр попадает в канал только целиком после проверки контрольной
    /// суммы, поэтому цикл никогда не видит частично записанных полей.
    pub fn drain_into(&self, inputs: &mut CycleInputs) {
        while let Ok(frame) = self.gps_channel.try_receive() {
            if inputs.gps_frames.push(frame).is_err() {
                break;
            }
        }
        while let Ok(frame) = self.link_channel.try_receive() {
            if inputs.link_frames.push(frame).is_err() {
                break;
            }
        }
    }
}

impl Default for DataChannels {
    fn default() -> Self {
        Self::new()
    }
}

// Статический экземпляр для обработчиков прерываний
pub static CHANNELS: DataChannels = DataChannels::new();
