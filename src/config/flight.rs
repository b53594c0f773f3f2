//! Конфигурация параметров полета и PID контроллеров
//!
//! Коэффициенты заданы в единицах "на секунду": интегральные делены на шаг
//! цикла, дифференциальные умножены на него, поэтому при 250 Гц поведение
//! совпадает с настройкой "на такт".

/// Параметры PID контроллеров
pub mod pid {

    /// PID коэффициенты крена (вход - угловая скорость, град/с)
    pub mod roll {
        use crate::config::hardware::system::LOOP_DT_S;
        pub const KP: f32 = 3.8;
        pub const KI: f32 = 0.087 / LOOP_DT_S;
        pub const KD: f32 = 47.0 * LOOP_DT_S;
        pub const OUTPUT_LIMIT: f32 = 400.0;
    }

    /// PID коэффициенты тангажа
    pub mod pitch {
        use crate::config::hardware::system::LOOP_DT_S;
        pub const KP: f32 = 3.8;
        pub const KI: f32 = 0.087 / LOOP_DT_S;
        pub const KD: f32 = 47.0 * LOOP_DT_S;
        pub const OUTPUT_LIMIT: f32 = 400.0;
    }

    /// PID коэффициенты рыскания
    pub mod yaw {
        use crate::config::hardware::system::LOOP_DT_S;
        pub const KP: f32 = 15.2;
        pub const KI: f32 = 0.2 / LOOP_DT_S;
        pub const KD: f32 = 0.0;
        pub const OUTPUT_LIMIT: f32 = 400.0;
    }

    /// PID коэффициенты удержания высоты (вход - давление, Па)
    pub mod altitude {
        use crate::config::hardware::system::LOOP_DT_S;
        pub const KP: f32 = 1.8;
        pub const KI: f32 = 0.0014 / LOOP_DT_S;
        pub const KD: f32 = 14.0 * LOOP_DT_S;
        pub const OUTPUT_LIMIT: f32 = 200.0;
    }

    /// P-регулятор GPS и D по скользящему окну ошибок
    pub mod gps {
        pub const KP: f32 = 3.4;
        pub const KI: f32 = 0.0;
        /// Коэффициент D по сумме окна
        pub const KD_WINDOW: f32 = 7.6;
        pub const OUTPUT_LIMIT: f32 = 300.0;
    }

    /// PID удержания расстояния по сонару при посадке (вход - мм)
    pub mod sonar {
        use crate::config::hardware::system::LOOP_DT_S;
        pub const KP: f32 = 0.22;
        pub const KI: f32 = 0.0006 / LOOP_DT_S;
        pub const KD: f32 = 24.0 * LOOP_DT_S;
        pub const OUTPUT_LIMIT: f32 = 150.0;
    }

    /// PD защиты от столкновений по переднему сонару
    pub mod sonar_protection {
        use crate::config::hardware::system::LOOP_DT_S;
        pub const KP: f32 = 0.6;
        pub const KD: f32 = 4.0 * LOOP_DT_S;
        pub const OUTPUT_LIMIT: f32 = 200.0;
    }
}

/// Параметры взлета
pub mod takeoff {
    /// Газ ручного взлета, 0 включает автоматический подбор газа отрыва.
    /// Типовое значение для ручной настройки 1500.
    pub const MANUAL_TAKEOFF_THROTTLE: u16 = 0;

    /// Превышение ускорения над значением при арминге для детекции отрыва (g)
    pub const ACC_THRESHOLD_G: f32 = 0.2;

    /// Изменение расстояния нижнего сонара для детекции отрыва (мм)
    pub const SONAR_INCREMENT_MM: u16 = 90;

    /// Шаг увеличения газа за такт при автовзлете
    pub const THROTTLE_RAMP_STEP: f32 = 1.0;

    /// Потолок газа при автовзлете: отрыв не обнаружен
    pub const THROTTLE_CEILING: f32 = 1750.0;

    /// Нижняя граница правдоподобного газа отрыва
    pub const THROTTLE_FLOOR: f32 = 1350.0;
}

/// Параметры барометра
pub mod barometer {
    /// Уставка после взлета: давление земли минус это значение (~1.5 м)
    pub const PRESSURE_TAKEOFF: f32 = 10.0;

    /// Скорость изменения уставки стиком газа
    pub const PRESSURE_SP_FACTOR: f32 = 0.0003;

    /// Число тактов стабилизации давления после арминга (4 с)
    pub const PRESSURE_STAB_TICKS: u16 = 1000;

    /// Максимальное изменение уставки давления за такт (Па)
    pub const MAX_SETPOINT_STEP: f32 = 0.1;

    /// Вес медленного фильтра давления
    pub const SLOW_FILTER_WEIGHT: f32 = 0.015;

    /// Вес быстрого фильтра давления
    pub const FAST_FILTER_WEIGHT: f32 = 0.2;
}

/// Параметры GPS
pub mod gps {
    /// Без данных 100 * 4 мс = 400 мс GPS считается потерянным
    pub const LOST_CYCLES: u16 = 100;

    /// Новые координаты каждые 5 тактов, 4 промежуточных предсказываются
    pub const PREDICT_AFTER_CYCLES: u16 = 5;
}

/// Параметры ультразвукового дальномера
pub mod sonar {
    /// Опрос каждые 20 * 4 мс = 80 мс
    pub const REQUEST_CYCLES: u8 = 20;

    /// Расстояние начала защиты от столкновения (мм)
    pub const SPRING_START_MM: u16 = 1000;

    /// Расстояние максимального отклонения назад (мм)
    pub const SPRING_STOP_MM: u16 = 100;

    /// Максимальное отклонение тангажа назад (1500 + значение)
    pub const SPRING_MAX_PITCH: f32 = 200.0;

    /// Расстояние, ниже которого разрешено отключение моторов (мм)
    pub const LINK_MTOF_MM: u16 = 500;

    /// Число тактов стабильного нахождения в зоне перед отключением
    pub const SETTLE_TICKS: u16 = 125;
}

/// Параметры Liberty-Link
pub mod link {
    /// Без кадров 125 * 4 мс = 500 мс связь считается потерянной
    pub const LOST_CYCLES: u16 = 125;

    /// Расстояние перехода в режим удержания GPS уставки (метры)
    pub const GPS_SETPOINT_MAX_DISTANCE_M: f32 = 5.0;

    /// Расстояние, начиная с которого множитель движения минимален (метры)
    pub const WAYPOINT_FAR_DISTANCE_M: f32 = 100.0;

    /// Снижение давления (подъем) перед полетом по точкам (Па)
    pub const PRESSURE_ASCEND: f32 = 20.0;

    /// Множитель движения уставки на больших расстояниях
    pub const WAYPOINT_GPS_MIN_FACTOR: f32 = 0.015;

    /// Множитель движения уставки на малых расстояниях
    pub const WAYPOINT_GPS_MAX_FACTOR: f32 = 0.05;

    /// Скорость изменения уставки давления при снижении (Па за такт)
    pub const WAYPOINT_ALTITUDE_TERM: f32 = 0.025;

    /// Подъем при прерывании миссии (Па)
    pub const ABORT_PRESSURE_ASCEND: f32 = 20.0;

    /// Минимальное количество спутников для взлета
    pub const MIN_NUM_SATS: u8 = 5;

    /// Минимальное напряжение батареи для взлета (В)
    pub const MIN_BAT_VOLTAGE: f32 = 11.0;

    /// Число тактов удержания GPS уставки перед следующим шагом
    pub const SETPOINT_SETTLE_TICKS: u16 = 250;
}

/// Параметры батареи
pub mod battery {
    /// При этом напряжении выставляется ошибка низкого заряда (В)
    pub const WARNING_VOLTAGE: f32 = 10.4;

    /// Ниже этого напряжения батарея считается отключенной (В)
    pub const PRESENT_VOLTAGE: f32 = 6.0;

    /// Коэффициент компенсации просадки напряжения
    pub const COMPENSATION: f32 = 65.0;

    /// Напряжение полностью заряженной батареи (В)
    pub const FULL_VOLTAGE: f32 = 12.4;

    /// Нижняя граница компенсации (В)
    pub const COMPENSATION_MIN_VOLTAGE: f32 = 8.0;
}

/// Обработка стиков
pub mod stick {
    /// Экспонента газа в ручном режиме
    pub const THROTTLE_EXP: f32 = 120.0;

    /// Множитель экспоненты газа
    pub const THROTTLE_RATE: f32 = 6.0;

    /// Зона нечувствительности стиков крена/тангажа/рыскания (мкс)
    pub const DEADBAND: f32 = 8.0;

    /// Зона нечувствительности газа при удержании высоты (мкс)
    pub const ALTITUDE_DEADBAND: f32 = 50.0;

    /// Делитель стика в угловую скорость (град/с)
    pub const RATE_DIVIDER: f32 = 3.0;

    /// Газ, ниже которого управление рысканием не работает
    pub const YAW_MIN_THROTTLE: u16 = 1050;

    /// Газ, ниже которого разрешен арминг
    pub const ARM_MAX_THROTTLE: u16 = 1050;
}

/// Параметры фильтрации
pub mod filters {
    /// Вес акселерометра в комплементарном фильтре за такт
    pub const COMPLEMENTARY_WEIGHT: f32 = 0.0004;

    /// Вес нового значения гироскопа во входе PID
    pub const GYRO_INPUT_WEIGHT: f32 = 0.3;

    /// Коэффициент выравнивания: угол * значение вычитается из уставки
    pub const LEVEL_ADJUST_GAIN: f32 = 15.0;

    /// Делитель притяжения рыскания к компасу
    pub const COMPASS_PULL_DIVIDER: f32 = 1200.0;
}

/// Параметры компаса
pub mod compass {
    /// Магнитное склонение (градусы)
    pub const DECLINATION_DEG: f32 = -4.89;
}

/// Параметры телеметрии
pub mod telemetry {
    /// Сколько байт отправляется за один такт
    pub const BURST_BYTES: usize = 4;
}
