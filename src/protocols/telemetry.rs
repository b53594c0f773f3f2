//! Телеметрия (аппарат -> наземная станция)
//!
//! Кадр формируется из снимка состояния и отправляется порциями по
//! `BURST_BYTES` за цикл, чтобы ограничить время записи в UART.

use heapless::Vec;

use super::{encode_frame, PayloadWriter};
use crate::config::flight::telemetry::BURST_BYTES;
use crate::config::hardware::serial::{
    TELEMETRY_FRAME_LEN, TELEMETRY_PAYLOAD_LEN, TELEMETRY_SUFFIX_1, TELEMETRY_SUFFIX_2,
};

/// Снимок состояния для одного кадра телеметрии
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// Биты активных ошибок
    pub errors: u16,
    /// Номер шага навигации
    pub step: u8,
    /// Режим полета
    pub mode: u8,
    pub armed: bool,
    /// Напряжение батареи (В)
    pub battery_voltage: f32,
    /// Углы (градусы)
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    /// Высота над точкой арминга (м)
    pub altitude_m: f32,
    pub lat: i32,
    pub lon: i32,
    pub satellites: u8,
    pub waypoint_index: u8,
    /// Расстояние нижнего сонара (мм)
    pub sonar_mm: u16,
}

impl TelemetrySnapshot {
    pub fn to_payload(&self) -> [u8; TELEMETRY_PAYLOAD_LEN] {
        let mut payload = [0u8; TELEMETRY_PAYLOAD_LEN];
        let mut w = PayloadWriter::new(&mut payload);
        w.u16(self.errors);
        w.u8(self.step);
        w.u8(self.mode);
        w.u8(self.armed as u8);
        w.u8(scaled_u8(self.battery_voltage, 10.0));
        w.i16(scaled_i16(self.roll, 100.0));
        w.i16(scaled_i16(self.pitch, 100.0));
        w.u16(scaled_u16(self.yaw, 100.0));
        w.i16(scaled_i16(self.altitude_m, 10.0));
        w.i32(self.lat);
        w.i32(self.lon);
        w.u8(self.satellites);
        w.u8(self.waypoint_index);
        w.u16(self.sonar_mm);
        payload
    }

    pub fn encode(&self) -> [u8; TELEMETRY_FRAME_LEN] {
        let mut frame = [0u8; TELEMETRY_FRAME_LEN];
        // Буфер точно по размеру кадра, ошибка невозможна
        let _ = encode_frame(
            &self.to_payload(),
            [TELEMETRY_SUFFIX_1, TELEMETRY_SUFFIX_2],
            &mut frame,
        );
        frame
    }
}

// Преобразования с насыщением, `as` для float уже насыщает
fn scaled_u8(value: f32, scale: f32) -> u8 {
    libm::roundf(value * scale) as u8
}

fn scaled_i16(value: f32, scale: f32) -> i16 {
    libm::roundf(value * scale) as i16
}

fn scaled_u16(value: f32, scale: f32) -> u16 {
    libm::roundf(value * scale) as u16
}

/// Передатчик телеметрии порциями
#[derive(Debug, Clone)]
pub struct TelemetryEncoder {
    frame: [u8; TELEMETRY_FRAME_LEN],
    position: usize,
}

impl Default for TelemetryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryEncoder {
    pub const fn new() -> Self {
        Self {
            frame: [0; TELEMETRY_FRAME_LEN],
            position: TELEMETRY_FRAME_LEN,
        }
    }

    /// Очередная порция байт
    ///
    /// Новый кадр строится из `snapshot` только после отправки предыдущего,
    /// снимок внутри кадра всегда согласован.
    pub fn next_burst(&mut self, snapshot: &TelemetrySnapshot) -> Vec<u8, BURST_BYTES> {
        if self.position >= TELEMETRY_FRAME_LEN {
            self.frame = snapshot.encode();
            self.position = 0;
        }
        let end = (self.position + BURST_BYTES).min(TELEMETRY_FRAME_LEN);
        let mut burst = Vec::new();
        // Порция не длиннее BURST_BYTES, переполнение невозможно
        let _ = burst.extend_from_slice(&self.frame[self.position..end]);
        self.position = end;
        burst
    }

    /// Текущий кадр отправлен полностью
    pub fn is_idle(&self) -> bool {
        self.position >= TELEMETRY_FRAME_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::checksum;

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            errors: 0b10,
            step: 3,
            mode: 2,
            armed: true,
            battery_voltage: 11.76,
            roll: -1.5,
            pitch: 2.25,
            yaw: 270.0,
            altitude_m: 12.34,
            lat: 523_000_000,
            lon: 45_000_000,
            satellites: 8,
            waypoint_index: 1,
            sonar_mm: 0,
        }
    }

    #[test]
    fn test_payload_layout() {
        let payload = snapshot().to_payload();
        assert_eq!(u16::from_le_bytes([payload[0], payload[1]]), 0b10);
        assert_eq!(payload[2], 3);
        assert_eq!(payload[4], 1);
        assert_eq!(payload[5], 118);
        assert_eq!(i16::from_le_bytes([payload[6], payload[7]]), -150);
        assert_eq!(u16::from_le_bytes([payload[10], payload[11]]), 27_000);
        assert_eq!(i16::from_le_bytes([payload[12], payload[13]]), 123);
        assert_eq!(payload[22], 8);
    }

    #[test]
    fn test_frame_sent_in_bursts() {
        let mut encoder = TelemetryEncoder::new();
        let snap = snapshot();
        let mut sent = heapless::Vec::<u8, 64>::new();

        let bursts = TELEMETRY_FRAME_LEN.div_ceil(BURST_BYTES);
        for _ in 0..bursts {
            let burst = encoder.next_burst(&snap);
            assert!(burst.len() <= BURST_BYTES);
            sent.extend_from_slice(&burst).unwrap();
        }
        assert!(encoder.is_idle());
        assert_eq!(sent.len(), TELEMETRY_FRAME_LEN);
        assert_eq!(&sent[..], &snap.encode()[..]);

        let payload = &sent[..TELEMETRY_PAYLOAD_LEN];
        assert_eq!(sent[TELEMETRY_PAYLOAD_LEN], checksum(payload));
        assert_eq!(sent[TELEMETRY_FRAME_LEN - 2], TELEMETRY_SUFFIX_1);
        assert_eq!(sent[TELEMETRY_FRAME_LEN - 1], TELEMETRY_SUFFIX_2);
    }

    #[test]
    fn test_snapshot_latched_per_frame() {
        let mut encoder = TelemetryEncoder::new();
        let first = snapshot();
        let _ = encoder.next_burst(&first);

        // Изменение состояния посреди кадра не влияет на отправляемый кадр
        let changed = TelemetrySnapshot { step: 7, ..first };
        let second = encoder.next_burst(&changed);
        assert_eq!(&second[..], &first.encode()[4..8]);
    }
}
