//! Главный цикл 250 Гц

use embassy_time::{Duration, Instant, Ticker};

use crate::data::{CycleInputs, CycleOutputs, DataChannels, MotorOutputs, SensorInputs, StickInputs, CHANNELS};
use crate::flight::FlightController;

/// Периферия платы, нужная главному циклу
#[allow(async_fn_in_trait)]
pub trait FlightIo {
    /// Опрос IMU, барометра, компаса, сонара и АЦП батареи
    async fn read_sensors(&mut self) -> SensorInputs;

    /// Последние длительности импульсов приемника
    fn read_sticks(&mut self) -> StickInputs;

    fn write_motors(&mut self, motors: &MotorOutputs);

    /// Очередная порция телеметрии в UART
    fn send_telemetry(&mut self, bytes: &[u8]);

    /// Запуск измерения сонара
    fn trigger_sonar(&mut self);

    /// Сброс груза
    fn release_parcel(&mut self);
}

/// Сборка входов цикла: датчики, пульт и кадры из очередей
pub fn collect_inputs(
    started_at: Instant,
    sensors: SensorInputs,
    sticks: StickInputs,
    channels: &DataChannels,
) -> CycleInputs {
    let mut inputs = CycleInputs::new(started_at);
    inputs.sensors = sensors;
    inputs.sticks = sticks;
    channels.drain_into(&mut inputs);
    inputs
}

/// Передача результатов цикла в периферию
pub fn apply_outputs<I: FlightIo>(io: &mut I, outputs: &CycleOutputs) {
    io.write_motors(&outputs.motors);
    if !outputs.telemetry.is_empty() {
        io.send_telemetry(&outputs.telemetry);
    }
    if outputs.sonar_trigger {
        io.trigger_sonar();
    }
    if outputs.parcel_release {
        info!("Сброс груза");
        io.release_parcel();
    }
}

/// Бесконечный цикл управления с периодом из конфигурации
pub async fn run<I: FlightIo>(controller: &mut FlightController, io: &mut I) -> ! {
    let period = Duration::from_micros(controller.config().loop_period_us);
    let mut ticker = Ticker::every(period);
    info!("Главный цикл запущен");

    loop {
        ticker.next().await;
        let started_at = Instant::now();
        let sensors = io.read_sensors().await;
        let sticks = io.read_sticks();
        let inputs = collect_inputs(started_at, sensors, sticks, &CHANNELS);
        let outputs = controller.tick(&inputs);
        apply_outputs(io, &outputs);
    }
}
