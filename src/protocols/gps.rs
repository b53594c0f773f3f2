//! Кадр GPS-микшера

use super::{encode_frame, DecodeError, FrameDecoder, PayloadReader, PayloadWriter};
use crate::config::hardware::serial::{GPS_PAYLOAD_LEN, GPS_SUFFIX_1, GPS_SUFFIX_2};

/// Полный размер кадра GPS
pub const GPS_FRAME_LEN: usize = GPS_PAYLOAD_LEN + 3;

/// Решение GPS приемника
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsFrame {
    /// Широта (1e-7 градуса)
    pub lat: i32,
    /// Долгота (1e-7 градуса)
    pub lon: i32,
    /// Высота над уровнем моря (м)
    pub altitude_m: i16,
    /// Курс (0.01 градуса)
    pub heading_cdeg: u16,
    /// Путевая скорость (см/с)
    pub speed_cms: u16,
    pub satellites: u8,
    /// Горизонтальный фактор точности (0.1)
    pub hdop: u8,
}

impl GpsFrame {
    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() != GPS_PAYLOAD_LEN {
            return Err(DecodeError::InvalidLength);
        }
        let mut r = PayloadReader::new(payload);
        Ok(Self {
            lat: r.i32(),
            lon: r.i32(),
            altitude_m: r.i16(),
            heading_cdeg: r.u16(),
            speed_cms: r.u16(),
            satellites: r.u8(),
            hdop: r.u8(),
        })
    }

    pub fn to_payload(&self) -> [u8; GPS_PAYLOAD_LEN] {
        let mut payload = [0u8; GPS_PAYLOAD_LEN];
        let mut w = PayloadWriter::new(&mut payload);
        w.i32(self.lat);
        w.i32(self.lon);
        w.i16(self.altitude_m);
        w.u16(self.heading_cdeg);
        w.u16(self.speed_cms);
        w.u8(self.satellites);
        w.u8(self.hdop);
        payload
    }

    /// Кадр целиком, как его отправляет GPS-микшер
    pub fn encode(&self) -> [u8; GPS_FRAME_LEN] {
        let mut frame = [0u8; GPS_FRAME_LEN];
        // Буфер точно по размеру кадра, ошибка невозможна
        let _ = encode_frame(&self.to_payload(), [GPS_SUFFIX_1, GPS_SUFFIX_2], &mut frame);
        frame
    }
}

/// Приемник кадров GPS
#[derive(Debug, Clone)]
pub struct GpsDecoder {
    frames: FrameDecoder<{ GPS_PAYLOAD_LEN + 1 }>,
}

impl Default for GpsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GpsDecoder {
    pub const fn new() -> Self {
        Self {
            frames: FrameDecoder::new([GPS_SUFFIX_1, GPS_SUFFIX_2]),
        }
    }

    /// Обработка байта, возвращает кадр после проверки суммы
    pub fn push(&mut self, byte: u8) -> Option<Result<GpsFrame, DecodeError>> {
        match self.frames.push(byte)? {
            Ok(payload) => Some(GpsFrame::from_payload(payload)),
            Err(e) => Some(Err(e)),
        }
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

    fn sample() -> GpsFrame {
        GpsFrame {
            lat: 523_456_789,
            lon: -12_345_678,
            altitude_m: 112,
            heading_cdeg: 27_050,
            speed_cms: 340,
            satellites: 9,
            hdop: 12,
        }
    }

    #[test]
    fn test_decoder_accepts_encoded_frame() {
        let mut decoder = GpsDecoder::new();
        let mut decoded = None;
        for b in [0x01u8, 0x02].iter().chain(sample().encode().iter()) {
            if let Some(result) = decoder.push(*b) {
                decoded = Some(result);
            }
        }
        assert_eq!(decoded, Some(Ok(sample())));
    }

    #[test]
    fn test_corrupted_frame_rejected() {
        let mut frame = sample().encode();
        frame[3] ^= 0x40;
        let mut decoder = GpsDecoder::new();
        let results: heapless::Vec<_, 4> = frame.iter().filter_map(|b| decoder.push(*b)).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0], Err(DecodeError::BadChecksum));
        assert_eq!(decoder.rejected(), 1);
        assert_eq!(decoder.accepted(), 0);
    }

    #[test]
    fn test_wrong_length_payload() {
        assert_eq!(GpsFrame::from_payload(&[0; 3]), Err(DecodeError::InvalidLength));
    }
}
