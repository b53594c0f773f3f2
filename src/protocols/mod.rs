//! Последовательные протоколы: GPS-микшер, Liberty-Link, телеметрия
//!
//! Все три используют один формат кадра:
//! `нагрузка ‖ XOR(нагрузка) ‖ суффикс 1 ‖ суффикс 2`,
//! многобайтовые поля в little-endian. Приемник работает скользящим окном:
//! кадром считаются байты, непосредственно предшествующие паре суффиксов.

pub mod gps;
pub mod link;
pub mod telemetry;

/// Причина отбрасывания принятого кадра
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Контрольная сумма не совпала
    BadChecksum,
    /// Неверная длина нагрузки
    InvalidLength,
    /// Неизвестный системный байт кадра Liberty-Link
    UnknownChannel(u8),
    /// Недопустимый код команды
    IllegalCommand(u8),
}

/// Ошибка формирования кадра
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// Выходной буфер меньше нагрузки плюс три служебных байта
    BufferTooSmall,
}

/// Контрольная сумма: XOR всех байт нагрузки
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Запись кадра в буфер, возвращает длину кадра
pub fn encode_frame(
    payload: &[u8],
    suffix: [u8; 2],
    out: &mut [u8],
) -> Result<usize, EncodeError> {
    let len = payload.len() + 3;
    if out.len() < len {
        return Err(EncodeError::BufferTooSmall);
    }
    out[..payload.len()].copy_from_slice(payload);
    out[payload.len()] = checksum(payload);
    out[payload.len() + 1] = suffix[0];
    out[payload.len() + 2] = suffix[1];
    Ok(len)
}

/// Приемник кадров со скользящим окном
///
/// `W` - размер нагрузки плюс байт контрольной суммы. В `window` хранятся
/// `W` байт, принятых перед `last`, `filled` считает принятые байты с
/// последнего кадра.
#[derive(Debug, Clone)]
pub struct FrameDecoder<const W: usize> {
    suffix: [u8; 2],
    window: [u8; W],
    last: u8,
    filled: usize,
    accepted: u32,
    rejected: u32,
}

impl<const W: usize> FrameDecoder<W> {
    pub const fn new(suffix: [u8; 2]) -> Self {
        Self {
            suffix,
            window: [0; W],
            last: 0,
            filled: 0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Обработка одного байта из UART
    ///
    /// Возвращает нагрузку, если байт завершил кадр с верной суммой, или
    /// ошибку, если суффикс найден, но сумма не сошлась.
    ///
    /// Суффикс может встретиться внутри нагрузки. При неверной сумме окно
    /// продолжает сдвигаться, и следующий настоящий кадр не теряется.
    pub fn push(&mut self, byte: u8) -> Option<Result<&[u8], DecodeError>> {
        let at_suffix = self.filled > W && self.last == self.suffix[0] && byte == self.suffix[1];
        if at_suffix {
            if checksum(&self.window[..W - 1]) == self.window[W - 1] {
                self.filled = 0;
                self.accepted = self.accepted.wrapping_add(1);
                return Some(Ok(&self.window[..W - 1]));
            }
            self.rejected = self.rejected.wrapping_add(1);
        }

        if self.filled > 0 {
            self.window.copy_within(1.., 0);
            self.window[W - 1] = self.last;
        }
        self.last = byte;
        self.filled = self.filled.saturating_add(1);

        if at_suffix {
            Some(Err(DecodeError::BadChecksum))
        } else {
            None
        }
    }

    /// Учет кадра, отброшенного уже после проверки суммы
    pub fn note_rejected(&mut self) {
        self.rejected = self.rejected.wrapping_add(1);
    }

    pub fn accepted(&self) -> u32 {
        self.accepted
    }

    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Сброс состояния приемника
    pub fn reset(&mut self) {
        self.filled = 0;
        self.last = 0;
    }
}

/// Чтение little-endian полей из нагрузки
pub(crate) struct PayloadReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(src) = self.bytes.get(self.position..self.position + N) {
            out.copy_from_slice(src);
        }
        self.position += N;
        out
    }

    pub(crate) fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub(crate) fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub(crate) fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }

    pub(crate) fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }
}

/// Запись little-endian полей в нагрузку
pub(crate) struct PayloadWriter<'a> {
    bytes: &'a mut [u8],
    position: usize,
}

impl<'a> PayloadWriter<'a> {
    pub(crate) fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn put(&mut self, src: &[u8]) {
        let end = self.position + src.len();
        if let Some(dst) = self.bytes.get_mut(self.position..end) {
            dst.copy_from_slice(src);
        }
        self.position = end;
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    pub(crate) fn u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    pub(crate) fn i16(&mut self, value: i16) {
        self.put(&value.to_le_bytes());
    }

    pub(crate) fn i32(&mut self, value: i32) {
        self.put(&value.to_le_bytes());
    }
}
