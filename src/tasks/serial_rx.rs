//! Прием байт UART в прерывании и передача кадров главному циклу

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::data::{DataChannels, CHANNELS};
use crate::protocols::gps::GpsDecoder;
use crate::protocols::link::LinkDecoder;

/// Приемники обоих портов
#[derive(Debug, Clone, Default)]
pub struct SerialReceiver {
    gps: GpsDecoder,
    link: LinkDecoder,
}

impl SerialReceiver {
    pub const fn new() -> Self {
        Self {
            gps: GpsDecoder::new(),
            link: LinkDecoder::new(),
        }
    }

    /// Байт с порта GPS-микшера
    pub fn on_gps_byte(&mut self, byte: u8, channels: &DataChannels) {
        match self.gps.push(byte) {
            Some(Ok(frame)) => {
                if channels.gps_channel.try_send(frame).is_err() {
                    warn!("Очередь GPS переполнена, кадр потерян");
                }
            }
            Some(Err(e)) => debug!("Кадр GPS отброшен: {:?}", e),
            None => {}
        }
    }

    /// Байт с порта телеметрии (Liberty-Link)
    pub fn on_link_byte(&mut self, byte: u8, channels: &DataChannels) {
        match self.link.push(byte) {
            Some(Ok(frame)) => {
                if channels.link_channel.try_send(frame).is_err() {
                    warn!("Очередь Liberty-Link переполнена, кадр потерян");
                }
            }
            Some(Err(e)) => debug!("Кадр Liberty-Link отброшен: {:?}", e),
            None => {}
        }
    }

    pub fn gps_decoder(&self) -> &GpsDecoder {
        &self.gps
    }

    pub fn link_decoder(&self) -> &LinkDecoder {
        &self.link
    }
}

static RECEIVER: Mutex<CriticalSectionRawMutex, RefCell<SerialReceiver>> =
    Mutex::new(RefCell::new(SerialReceiver::new()));

/// Вызывается из прерывания UART GPS
pub fn on_gps_byte(byte: u8) {
    RECEIVER.lock(|rx| rx.borrow_mut().on_gps_byte(byte, &CHANNELS));
}

/// Вызывается из прерывания UART телеметрии
pub fn on_link_byte(byte: u8) {
    RECEIVER.lock(|rx| rx.borrow_mut().on_link_byte(byte, &CHANNELS));
}
