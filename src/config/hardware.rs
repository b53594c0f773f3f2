//! Конфигурация аппаратного обеспечения и временных параметров цикла

/// Параметры главного цикла
pub mod system {
    /// Период главного цикла (мкс), 250 Гц
    pub const LOOP_PERIOD_US: u64 = 4_000;

    /// Максимально допустимый период цикла (мкс)
    pub const MAX_ALLOWED_LOOP_PERIOD_US: u64 = 4_050;

    /// Частота главного цикла (Гц)
    pub const LOOP_RATE_HZ: u32 = 250;

    /// Шаг интегрирования (секунды)
    pub const LOOP_DT_S: f32 = LOOP_PERIOD_US as f32 / 1_000_000.0;
}

/// Скорости последовательных портов
pub mod frequencies {
    /// Скорость UART GPS-микшера (бод)
    pub const GPS_BAUDRATE: u32 = 115_200;

    /// Скорость UART телеметрии и Liberty-Link (бод)
    pub const TELEMETRY_BAUDRATE: u32 = 115_200;
}

/// Форматы кадров последовательных протоколов
pub mod serial {
    /// Первый байт суффикса GPS кадра
    pub const GPS_SUFFIX_1: u8 = 0xEE;
    /// Второй байт суффикса GPS кадра
    pub const GPS_SUFFIX_2: u8 = 0xEF;

    /// Первый байт суффикса кадра Liberty-Link
    pub const LINK_SUFFIX_1: u8 = 0xEE;
    /// Второй байт суффикса кадра Liberty-Link
    pub const LINK_SUFFIX_2: u8 = 0xEF;

    /// Первый байт суффикса кадра телеметрии
    pub const TELEMETRY_SUFFIX_1: u8 = 0xEE;
    /// Второй байт суффикса кадра телеметрии
    pub const TELEMETRY_SUFFIX_2: u8 = 0xEF;

    /// Полезная нагрузка GPS кадра (байт)
    pub const GPS_PAYLOAD_LEN: usize = 16;

    /// Полезная нагрузка кадра Liberty-Link (байт)
    pub const LINK_PAYLOAD_LEN: usize = 10;

    /// Полезная нагрузка кадра телеметрии (байт)
    pub const TELEMETRY_PAYLOAD_LEN: usize = 26;

    /// Полный размер кадра телеметрии: нагрузка, контрольный байт, суффикс
    pub const TELEMETRY_FRAME_LEN: usize = TELEMETRY_PAYLOAD_LEN + 3;

    /// Емкость очередей принятых кадров
    pub const GPS_CHANNEL_SIZE: usize = 4;
    pub const LINK_CHANNEL_SIZE: usize = 8;
}

/// Диапазон управляющих импульсов ESC (мкс)
pub mod motors {
    /// Импульс остановки мотора
    pub const PULSE_CUTOFF: u16 = 1000;

    /// Центральное значение стика
    pub const PULSE_CENTER: u16 = 1500;

    /// Максимальный импульс
    pub const PULSE_MAX: u16 = 2000;

    /// Минимальные обороты в полете
    pub const IDLE_PULSE: u16 = 1200;

    /// Предел газа до микширования, оставляет запас для стабилизации
    pub const THROTTLE_LIMIT: u16 = 1800;
}

/// Измерение напряжения батареи
pub mod voltmeter {
    /// Делитель для перевода отсчета АЦП в вольты
    pub const VOLTAGE_ADC_DIVIDER: f32 = 109.88;
}
