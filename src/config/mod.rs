//! Конфигурация полетного контроллера
//!
//! Константы по умолчанию лежат в `flight` и `hardware`, здесь собраны
//! структуры, которые передаются в ядро при старте: настраиваемые параметры,
//! таблица включенных подсистем и калибровки датчиков.

pub mod flight;
pub mod hardware;

use nalgebra::Vector3;

use self::flight as f;
use self::hardware as hw;

/// Ошибка проверки конфигурации
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Период цикла равен нулю или больше допустимого
    InvalidLoopPeriod,
    /// Порог начала защиты сонара не больше порога остановки
    InvalidSonarSpring,
    /// Минимальный множитель движения больше максимального
    InvalidWaypointFactors,
    /// Нулевой интервал обновления GPS
    InvalidGpsPredictCycles,
    /// Вес фильтра вне диапазона (0, 1]
    InvalidFilterWeight,
    /// Нулевой или отрицательный предел выхода PID
    InvalidPidLimit,
    /// Порог газа автовзлета не выше порога правдоподобия
    InvalidTakeoffRamp,
}

/// Коэффициенты одного PID регулятора
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub output_limit: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32, output_limit: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            output_limit,
        }
    }
}

/// Набор коэффициентов всех регуляторов каскада
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidSet {
    pub roll: PidGains,
    pub pitch: PidGains,
    pub yaw: PidGains,
    pub altitude: PidGains,
    pub gps: PidGains,
    /// Коэффициент D по окну ошибок GPS
    pub gps_window_kd: f32,
    pub sonar: PidGains,
    pub sonar_protection: PidGains,
}

impl Default for PidSet {
    fn default() -> Self {
        use self::f::pid::*;
        Self {
            roll: PidGains::new(roll::KP, roll::KI, roll::KD, roll::OUTPUT_LIMIT),
            pitch: PidGains::new(pitch::KP, pitch::KI, pitch::KD, pitch::OUTPUT_LIMIT),
            yaw: PidGains::new(yaw::KP, yaw::KI, yaw::KD, yaw::OUTPUT_LIMIT),
            altitude: PidGains::new(
                altitude::KP,
                altitude::KI,
                altitude::KD,
                altitude::OUTPUT_LIMIT,
            ),
            gps: PidGains::new(gps::KP, gps::KI, 0.0, gps::OUTPUT_LIMIT),
            gps_window_kd: gps::KD_WINDOW,
            sonar: PidGains::new(sonar::KP, sonar::KI, sonar::KD, sonar::OUTPUT_LIMIT),
            sonar_protection: PidGains::new(
                sonar_protection::KP,
                0.0,
                sonar_protection::KD,
                sonar_protection::OUTPUT_LIMIT,
            ),
        }
    }
}

/// Настраиваемые параметры полета
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightConfig {
    /// Номинальный период цикла (мкс)
    pub loop_period_us: u64,
    /// Максимально допустимый период цикла (мкс)
    pub max_loop_period_us: u64,
    pub pid: PidSet,

    // Фильтры
    pub complementary_weight: f32,
    pub gyro_input_weight: f32,
    pub pressure_slow_weight: f32,
    pub pressure_fast_weight: f32,

    // Взлет
    /// Газ ручного взлета, 0 - автоматический взлет с подбором газа
    pub manual_takeoff_throttle: u16,
    pub takeoff_acc_threshold_g: f32,
    pub takeoff_sonar_increment_mm: u16,
    pub takeoff_throttle_ceiling: f32,
    pub takeoff_throttle_floor: f32,

    // Барометр
    pub pressure_takeoff: f32,
    pub pressure_sp_factor: f32,
    pub pressure_stab_ticks: u16,
    pub max_setpoint_step: f32,

    // GPS
    pub gps_lost_cycles: u16,
    pub gps_predict_cycles: u16,

    // Сонар
    pub sonar_spring_start_mm: u16,
    pub sonar_spring_stop_mm: u16,
    pub sonar_spring_max_pitch: f32,
    pub sonar_mtof_mm: u16,
    pub sonar_settle_ticks: u16,

    // Liberty-Link
    pub link_lost_cycles: u16,
    pub setpoint_distance_m: f32,
    pub waypoint_far_distance_m: f32,
    pub pressure_ascend: f32,
    pub waypoint_min_factor: f32,
    pub waypoint_max_factor: f32,
    pub waypoint_altitude_term: f32,
    pub abort_pressure_ascend: f32,
    pub min_satellites: u8,
    pub min_takeoff_voltage: f32,
    pub setpoint_settle_ticks: u16,

    // Батарея
    pub battery_warning_voltage: f32,
    pub battery_compensation: f32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            loop_period_us: hw::system::LOOP_PERIOD_US,
            max_loop_period_us: hw::system::MAX_ALLOWED_LOOP_PERIOD_US,
            pid: PidSet::default(),

            complementary_weight: f::filters::COMPLEMENTARY_WEIGHT,
            gyro_input_weight: f::filters::GYRO_INPUT_WEIGHT,
            pressure_slow_weight: f::barometer::SLOW_FILTER_WEIGHT,
            pressure_fast_weight: f::barometer::FAST_FILTER_WEIGHT,

            manual_takeoff_throttle: f::takeoff::MANUAL_TAKEOFF_THROTTLE,
            takeoff_acc_threshold_g: f::takeoff::ACC_THRESHOLD_G,
            takeoff_sonar_increment_mm: f::takeoff::SONAR_INCREMENT_MM,
            takeoff_throttle_ceiling: f::takeoff::THROTTLE_CEILING,
            takeoff_throttle_floor: f::takeoff::THROTTLE_FLOOR,

            pressure_takeoff: f::barometer::PRESSURE_TAKEOFF,
            pressure_sp_factor: f::barometer::PRESSURE_SP_FACTOR,
            pressure_stab_ticks: f::barometer::PRESSURE_STAB_TICKS,
            max_setpoint_step: f::barometer::MAX_SETPOINT_STEP,

            gps_lost_cycles: f::gps::LOST_CYCLES,
            gps_predict_cycles: f::gps::PREDICT_AFTER_CYCLES,

            sonar_spring_start_mm: f::sonar::SPRING_START_MM,
            sonar_spring_stop_mm: f::sonar::SPRING_STOP_MM,
            sonar_spring_max_pitch: f::sonar::SPRING_MAX_PITCH,
            sonar_mtof_mm: f::sonar::LINK_MTOF_MM,
            sonar_settle_ticks: f::sonar::SETTLE_TICKS,

            link_lost_cycles: f::link::LOST_CYCLES,
            setpoint_distance_m: f::link::GPS_SETPOINT_MAX_DISTANCE_M,
            waypoint_far_distance_m: f::link::WAYPOINT_FAR_DISTANCE_M,
            pressure_ascend: f::link::PRESSURE_ASCEND,
            waypoint_min_factor: f::link::WAYPOINT_GPS_MIN_FACTOR,
            waypoint_max_factor: f::link::WAYPOINT_GPS_MAX_FACTOR,
            waypoint_altitude_term: f::link::WAYPOINT_ALTITUDE_TERM,
            abort_pressure_ascend: f::link::ABORT_PRESSURE_ASCEND,
            min_satellites: f::link::MIN_NUM_SATS,
            min_takeoff_voltage: f::link::MIN_BAT_VOLTAGE,
            setpoint_settle_ticks: f::link::SETPOINT_SETTLE_TICKS,

            battery_warning_voltage: f::battery::WARNING_VOLTAGE,
            battery_compensation: f::battery::COMPENSATION,
        }
    }
}

impl FlightConfig {
    /// Проверка согласованности параметров
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_period_us == 0 || self.loop_period_us > self.max_loop_period_us {
            return Err(ConfigError::InvalidLoopPeriod);
        }
        if self.sonar_spring_start_mm <= self.sonar_spring_stop_mm {
            return Err(ConfigError::InvalidSonarSpring);
        }
        if self.waypoint_min_factor > self.waypoint_max_factor {
            return Err(ConfigError::InvalidWaypointFactors);
        }
        if self.gps_predict_cycles == 0 {
            return Err(ConfigError::InvalidGpsPredictCycles);
        }

        let weights = [
            self.complementary_weight,
            self.gyro_input_weight,
            self.pressure_slow_weight,
            self.pressure_fast_weight,
        ];
        if weights.iter().any(|w| !(*w > 0.0 && *w <= 1.0)) {
            return Err(ConfigError::InvalidFilterWeight);
        }

        let pid = &self.pid;
        let limits = [
            pid.roll.output_limit,
            pid.pitch.output_limit,
            pid.yaw.output_limit,
            pid.altitude.output_limit,
            pid.gps.output_limit,
            pid.sonar.output_limit,
            pid.sonar_protection.output_limit,
        ];
        if limits.iter().any(|l| !(*l > 0.0)) {
            return Err(ConfigError::InvalidPidLimit);
        }

        if self.takeoff_throttle_ceiling <= self.takeoff_throttle_floor {
            return Err(ConfigError::InvalidTakeoffRamp);
        }

        Ok(())
    }

    /// Шаг цикла в секундах
    pub fn dt(&self) -> f32 {
        self.loop_period_us as f32 / 1_000_000.0
    }
}

/// Таблица включенных подсистем, определяется при старте
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    /// Двухканальный ультразвуковой дальномер установлен
    pub sonar: bool,
    /// Детекция отрыва по нижнему сонару
    pub sonar_takeoff_detection: bool,
    /// Защита от столкновений по переднему сонару
    pub sonar_collision_protection: bool,
    /// Отключение моторов при посадке только в зоне сонара
    pub sonar_mtof_protection: bool,
    /// Автономная навигация Liberty-Link
    pub liberty_link: bool,
    /// Передача телеметрии
    pub telemetry: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            sonar: true,
            sonar_takeoff_detection: false,
            sonar_collision_protection: true,
            sonar_mtof_protection: true,
            liberty_link: true,
            telemetry: true,
        }
    }
}

impl Capabilities {
    /// Конфигурация без сонара
    pub fn without_sonar(self) -> Self {
        Self {
            sonar: false,
            sonar_takeoff_detection: false,
            sonar_collision_protection: false,
            sonar_mtof_protection: false,
            ..self
        }
    }

    pub fn takeoff_by_sonar(&self) -> bool {
        self.sonar && self.sonar_takeoff_detection
    }

    pub fn collision_protection(&self) -> bool {
        self.sonar && self.sonar_collision_protection
    }

    pub fn landing_by_sonar(&self) -> bool {
        self.sonar && self.sonar_mtof_protection
    }
}

/// Калибровка компаса: смещения и коррекция эллипса
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompassCalibration {
    /// Смещения по осям (сырые единицы)
    pub offsets: Vector3<f32>,
    /// Масштаб оси Y относительно X
    pub scale_y: f32,
    /// Масштаб оси Z относительно X
    pub scale_z: f32,
    /// Магнитное склонение (градусы)
    pub declination_deg: f32,
}

impl Default for CompassCalibration {
    fn default() -> Self {
        Self {
            offsets: Vector3::zeros(),
            scale_y: 1.0,
            scale_z: 1.0,
            declination_deg: f::compass::DECLINATION_DEG,
        }
    }
}

/// Заводские коэффициенты барометра (PROM C1..C6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaroCoefficients {
    pub c: [u16; 6],
}

impl Default for BaroCoefficients {
    fn default() -> Self {
        // Типовые значения из документации датчика
        Self {
            c: [40127, 36924, 23317, 23282, 33464, 28312],
        }
    }
}

/// Калибровки, полученные при старте из внешнего загрузчика
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration {
    /// Смещение нуля гироскопа (град/с)
    pub gyro_bias: Vector3<f32>,
    /// Поправка горизонта акселерометра по крену (градусы)
    pub acc_roll_trim_deg: f32,
    /// Поправка горизонта акселерометра по тангажу (градусы)
    pub acc_pitch_trim_deg: f32,
    pub compass: CompassCalibration,
    pub baro: BaroCoefficients,
}
