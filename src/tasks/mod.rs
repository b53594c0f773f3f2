//! Асинхронные задачи платы: главный цикл и прием байт UART
//!
//! Задачи не зависят от конкретного чипа: работа с периферией скрыта за
//! трейтом [`flight_task::FlightIo`], прерывания UART отдают байты в
//! [`serial_rx`].

pub mod flight_task;
pub mod serial_rx;
