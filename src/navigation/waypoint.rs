//! Точки маршрута Liberty-Link

use heapless::Vec;

/// Максимальное число точек маршрута
pub const MAX_WAYPOINTS: usize = 16;

/// Команда, выполняемая по прибытии в точку (3 бита)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaypointCommand {
    /// Точка пропускается
    #[default]
    Skip,
    /// Прямое управление без GPS и без снижения
    DirectNoGpsNoDescent,
    /// Прямое управление с удержанием GPS, без снижения
    DirectNoDescent,
    /// Прямое управление с посадкой по команде
    DirectDescent,
    /// Пролет точки
    Fly,
    /// Снижение в точке и продолжение маршрута
    Descend,
    /// Снижение и сброс груза
    Parcel,
    /// Посадка с отключением моторов
    Land,
}

impl WaypointCommand {
    /// Разбор трехбитного поля, старшие биты игнорируются
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => WaypointCommand::Skip,
            0b001 => WaypointCommand::DirectNoGpsNoDescent,
            0b010 => WaypointCommand::DirectNoDescent,
            0b011 => WaypointCommand::DirectDescent,
            0b100 => WaypointCommand::Fly,
            0b101 => WaypointCommand::Descend,
            0b110 => WaypointCommand::Parcel,
            _ => WaypointCommand::Land,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            WaypointCommand::Skip => 0b000,
            WaypointCommand::DirectNoGpsNoDescent => 0b001,
            WaypointCommand::DirectNoDescent => 0b010,
            WaypointCommand::DirectDescent => 0b011,
            WaypointCommand::Fly => 0b100,
            WaypointCommand::Descend => 0b101,
            WaypointCommand::Parcel => 0b110,
            WaypointCommand::Land => 0b111,
        }
    }

    /// В точке удерживается GPS позиция
    pub fn holds_gps(self) -> bool {
        !matches!(
            self,
            WaypointCommand::Skip | WaypointCommand::DirectNoGpsNoDescent
        )
    }

    /// Снижение начинается сразу после удержания уставки
    pub fn descends(self) -> bool {
        matches!(
            self,
            WaypointCommand::Descend | WaypointCommand::Parcel | WaypointCommand::Land
        )
    }

    /// Оператор управляет аппаратом через Liberty-Link
    pub fn direct_control(self) -> bool {
        matches!(
            self,
            WaypointCommand::DirectNoGpsNoDescent
                | WaypointCommand::DirectNoDescent
                | WaypointCommand::DirectDescent
        )
    }

    /// Снижение разрешается командой посадки с Liberty-Link
    pub fn descends_on_command(self) -> bool {
        self == WaypointCommand::DirectDescent
    }

    /// После касания моторы отключаются
    pub fn cuts_motors(self) -> bool {
        matches!(self, WaypointCommand::Land | WaypointCommand::DirectDescent)
    }

    pub fn releases_parcel(self) -> bool {
        self == WaypointCommand::Parcel
    }
}

/// Точка маршрута
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Waypoint {
    /// Широта (1e-7 градуса)
    pub lat: i32,
    /// Долгота (1e-7 градуса)
    pub lon: i32,
    pub command: WaypointCommand,
}

impl Waypoint {
    pub const fn new(lat: i32, lon: i32, command: WaypointCommand) -> Self {
        Self { lat, lon, command }
    }
}

/// Ошибка загрузки точки
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaypointError {
    /// Номер слота вне диапазона очереди
    SlotOutOfRange(u8),
}

/// Очередь точек маршрута
///
/// Индекс только растет, уменьшается лишь при сбросе миссии.
#[derive(Clone, Debug, Default)]
pub struct WaypointQueue {
    points: Vec<Waypoint, MAX_WAYPOINTS>,
    index: usize,
}

impl WaypointQueue {
    pub const fn new() -> Self {
        Self {
            points: Vec::new(),
            index: 0,
        }
    }

    /// Запись точки в слот, пропущенные слоты заполняются `Skip`
    pub fn upload(&mut self, slot: u8, waypoint: Waypoint) -> Result<(), WaypointError> {
        let slot_index = slot as usize;
        if slot_index >= MAX_WAYPOINTS {
            return Err(WaypointError::SlotOutOfRange(slot));
        }
        while self.points.len() <= slot_index {
            self.points
                .push(Waypoint::default())
                .map_err(|_| WaypointError::SlotOutOfRange(slot))?;
        }
        self.points[slot_index] = waypoint;
        Ok(())
    }

    /// Текущая точка, `None` если маршрут исчерпан
    pub fn current(&self) -> Option<&Waypoint> {
        self.points.get(self.index)
    }

    /// Переход к следующей точке
    pub fn advance(&mut self) {
        if self.index < self.points.len() {
            self.index += 1;
        }
    }

    /// Пропуск точек с командой `Skip`, возвращает первую исполнимую
    pub fn next_active(&mut self) -> Option<Waypoint> {
        while let Some(point) = self.current() {
            if point.command != WaypointCommand::Skip {
                return Some(*point);
            }
            self.index += 1;
        }
        None
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.points.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Сброс миссии: очистка очереди и возврат индекса
    pub fn reset(&mut self) {
        self.points.clear();
        self.index = 0;
    }
}
