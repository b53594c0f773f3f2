//! Кадр канала Liberty-Link (наземная станция -> аппарат)
//!
//! Нагрузка 10 байт: 8 байт значения, системный байт (логический канал)
//! и байт данных канала.

use super::{encode_frame, DecodeError, FrameDecoder, PayloadReader, PayloadWriter};
use crate::config::hardware::serial::{LINK_PAYLOAD_LEN, LINK_SUFFIX_1, LINK_SUFFIX_2};
use crate::navigation::waypoint::{Waypoint, WaypointCommand};

/// Полный размер кадра Liberty-Link
pub const LINK_FRAME_LEN: usize = LINK_PAYLOAD_LEN + 3;

/// Логические каналы (системный байт)
pub mod channel {
    pub const KEEP_ALIVE: u8 = 0;
    pub const STICKS: u8 = 1;
    pub const WAYPOINT: u8 = 2;
    pub const COMMAND: u8 = 3;
    pub const MISSION_RESET: u8 = 4;
}

/// Команда Liberty-Link (3 бита)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkCommand {
    /// Прерывание миссии, возврат в IDLE
    Idle,
    /// Прямое управление стиками через Liberty-Link
    DirectControl,
    /// Автоматический взлет и выполнение маршрута
    AutoTakeoff,
    /// Посадка в текущей точке
    AutoLand,
    /// Прямое управление с последующей посадкой
    DirectControlLand,
    /// Аварийное отключение моторов
    FlightTermination,
}

impl TryFrom<u8> for LinkCommand {
    type Error = DecodeError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits & 0b111 {
            0b000 => Ok(LinkCommand::Idle),
            0b001 => Ok(LinkCommand::DirectControl),
            0b010 => Ok(LinkCommand::AutoTakeoff),
            0b100 => Ok(LinkCommand::AutoLand),
            0b110 => Ok(LinkCommand::DirectControlLand),
            0b111 => Ok(LinkCommand::FlightTermination),
            other => Err(DecodeError::IllegalCommand(other)),
        }
    }
}

impl From<LinkCommand> for u8 {
    fn from(command: LinkCommand) -> u8 {
        match command {
            LinkCommand::Idle => 0b000,
            LinkCommand::DirectControl => 0b001,
            LinkCommand::AutoTakeoff => 0b010,
            LinkCommand::AutoLand => 0b100,
            LinkCommand::DirectControlLand => 0b110,
            LinkCommand::FlightTermination => 0b111,
        }
    }
}

/// Импульсы стиков, переданные по Liberty-Link (мкс)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkSticks {
    pub roll: u16,
    pub pitch: u16,
    pub yaw: u16,
    pub throttle: u16,
}

/// Разобранный кадр Liberty-Link
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkFrame {
    /// Поддержание связи
    KeepAlive,
    /// Прямое управление
    Sticks(LinkSticks),
    /// Загрузка точки маршрута в слот
    Waypoint { slot: u8, waypoint: Waypoint },
    /// Команда
    Command(LinkCommand),
    /// Сброс миссии
    MissionReset,
}

impl LinkFrame {
    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != LINK_PAYLOAD_LEN {
            return Err(DecodeError::InvalidLength);
        }
        let system = payload[8];
        let data = payload[9];
        let mut r = PayloadReader::new(&payload[..8]);

        match system {
            channel::KEEP_ALIVE => Ok(LinkFrame::KeepAlive),
            channel::STICKS => Ok(LinkFrame::Sticks(LinkSticks {
                roll: r.u16(),
                pitch: r.u16(),
                yaw: r.u16(),
                throttle: r.u16(),
            })),
            channel::WAYPOINT => {
                let lat = r.i32();
                let lon = r.i32();
                Ok(LinkFrame::Waypoint {
                    slot: data & 0b1_1111,
                    waypoint: Waypoint::new(lat, lon, WaypointCommand::from_bits(data >> 5)),
                })
            }
            channel::COMMAND => Ok(LinkFrame::Command(LinkCommand::try_from(data)?)),
            channel::MISSION_RESET => Ok(LinkFrame::MissionReset),
            other => Err(DecodeError::UnknownChannel(other)),
        }
    }

    pub fn to_payload(&self) -> [u8; LINK_PAYLOAD_LEN] {
        let mut payload = [0u8; LINK_PAYLOAD_LEN];
        let (system, data) = {
            let mut w = PayloadWriter::new(&mut payload[..8]);
            match self {
                LinkFrame::KeepAlive => (channel::KEEP_ALIVE, 0),
                LinkFrame::Sticks(s) => {
                    w.u16(s.roll);
                    w.u16(s.pitch);
                    w.u16(s.yaw);
                    w.u16(s.throttle);
                    (channel::STICKS, 0)
                }
                LinkFrame::Waypoint { slot, waypoint } => {
                    w.i32(waypoint.lat);
                    w.i32(waypoint.lon);
                    (
                        channel::WAYPOINT,
                        (slot & 0b1_1111) | (waypoint.command.bits() << 5),
                    )
                }
                LinkFrame::Command(command) => (channel::COMMAND, u8::from(*command)),
                LinkFrame::MissionReset => (channel::MISSION_RESET, 0),
            }
        };
        payload[8] = system;
        payload[9] = data;
        payload
    }

    /// Кадр целиком, как его отправляет наземная станция
    pub fn encode(&self) -> [u8; LINK_FRAME_LEN] {
        let mut frame = [0u8; LINK_FRAME_LEN];
        // Буфер точно по размеру кадра, ошибка невозможна
        let _ = encode_frame(&self.to_payload(), [LINK_SUFFIX_1, LINK_SUFFIX_2], &mut frame);
        frame
    }
}

/// Приемник кадров Liberty-Link
#[derive(Debug, Clone)]
pub struct LinkDecoder {
    frames: FrameDecoder<{ LINK_PAYLOAD_LEN + 1 }>,
}

impl Default for LinkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkDecoder {
    pub const fn new() -> Self {
        Self {
            frames: FrameDecoder::new([LINK_SUFFIX_1, LINK_SUFFIX_2]),
        }
    }

    /// Обработка байта. Кадр с неизвестным каналом или недопустимой
    /// командой отбрасывается так же, как кадр с неверной суммой.
    pub fn push(&mut self, byte: u8) -> Option<Result<LinkFrame, DecodeError>> {
        let parsed = match self.frames.push(byte)? {
            Ok(payload) => LinkFrame::from_payload(payload),
            Err(e) => return Some(Err(e)),
        };
        if parsed.is_err() {
            self.frames.note_rejected();
        }
        Some(parsed)
    }

    pub fn accepted(&self) -> u32 {
        self.frames.accepted()
    }

    pub fn rejected(&self) -> u32 {
        self.frames.rejected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut LinkDecoder, bytes: &[u8]) -> Option<Result<LinkFrame, DecodeError>> {
        bytes.iter().filter_map(|b| decoder.push(*b)).last()
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(LinkCommand::try_from(0b111), Ok(LinkCommand::FlightTermination));
        assert_eq!(LinkCommand::try_from(0b010), Ok(LinkCommand::AutoTakeoff));
        assert_eq!(LinkCommand::try_from(0b011), Err(DecodeError::IllegalCommand(0b011)));
        assert_eq!(LinkCommand::try_from(0b101), Err(DecodeError::IllegalCommand(0b101)));
    }

    #[test]
    fn test_waypoint_frame_layout() {
        let frame = LinkFrame::Waypoint {
            slot: 2,
            waypoint: Waypoint::new(523_000_000, 45_000_000, WaypointCommand::Land),
        };
        let payload = frame.to_payload();
        assert_eq!(payload[8], channel::WAYPOINT);
        assert_eq!(payload[9], 0b111_00010);

        let mut decoder = LinkDecoder::new();
        assert_eq!(decode_all(&mut decoder, &frame.encode()), Some(Ok(frame)));
    }

    #[test]
    fn test_waypoint_with_suffix_bytes_after_broken_frame() {
        // 520155118 = 0x1F00EFEE: в нагрузке встречается пара EE EF
        let waypoint = LinkFrame::Waypoint {
            slot: 1,
            waypoint: Waypoint::new(520_155_118, 45_000_000, WaypointCommand::Fly),
        };
        let mut broken = LinkFrame::KeepAlive.encode();
        let end = broken.len() - 1;
        broken[end] ^= 0xFF;

        let mut decoder = LinkDecoder::new();
        let mut results = std::vec::Vec::new();
        for b in broken.iter().chain(waypoint.encode().iter()) {
            if let Some(result) = decoder.push(*b) {
                results.push(result);
            }
        }
        assert_eq!(results.last(), Some(&Ok(waypoint)));
        assert_eq!(decoder.accepted(), 1);
    }

    #[test]
    fn test_illegal_command_frame_rejected() {
        let mut payload = LinkFrame::Command(LinkCommand::Idle).to_payload();
        payload[9] = 0b101;
        let mut frame = [0u8; LINK_FRAME_LEN];
        encode_frame(&payload, [LINK_SUFFIX_1, LINK_SUFFIX_2], &mut frame).unwrap();

        let mut decoder = LinkDecoder::new();
        assert_eq!(
            decode_all(&mut decoder, &frame),
            Some(Err(DecodeError::IllegalCommand(0b101)))
        );
        assert_eq!(decoder.rejected(), 1);
    }

    #[test]
    fn test_unknown_channel() {
        let mut payload = [0u8; LINK_PAYLOAD_LEN];
        payload[8] = 9;
        assert_eq!(
            LinkFrame::from_payload(&payload),
            Err(DecodeError::UnknownChannel(9))
        );
    }

    #[test]
    fn test_sticks_frame() {
        let frame = LinkFrame::Sticks(LinkSticks {
            roll: 1400,
            pitch: 1600,
            yaw: 1500,
            throttle: 1550,
        });
        let mut decoder = LinkDecoder::new();
        assert_eq!(decode_all(&mut decoder, &frame.encode()), Some(Ok(frame)));
        assert_eq!(decoder.accepted(), 1);
    }
}
