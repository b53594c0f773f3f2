//! Стенд для сценариев: контроллер, время цикла и поток кадров

#![allow(dead_code)]

use embassy_time::Instant;
use nalgebra::Vector3;

use liberty_autopilot::navigation::{Waypoint, WaypointCommand};
use liberty_autopilot::protocols::gps::GpsFrame;
use liberty_autopilot::protocols::link::{LinkCommand, LinkFrame};
use liberty_autopilot::{
    BootReport, Calibration, Capabilities, CycleInputs, CycleOutputs, FlightConfig,
    FlightController, LinkStep,
};

pub const LAT: i32 = 523_000_000;
pub const LON: i32 = 45_000_000;
pub const PERIOD_US: u64 = 4_000;

pub struct Sim {
    pub fc: FlightController,
    pub now_us: u64,
    pub battery_voltage: f32,
    pub satellites: u8,
    /// Кадр GPS каждые `gps_every` циклов
    pub gps_every: u32,
    /// Ускорение после отрыва
    pub lifted: bool,
    /// Наземная станция шлет кадры поддержания связи
    pub link_alive: bool,
    pending: Vec<LinkFrame>,
    ticks: u32,
}

impl Sim {
    pub fn new(config: FlightConfig, capabilities: Capabilities) -> Self {
        let fc = FlightController::new(config, capabilities, Calibration::default(), BootReport::new())
            .unwrap();
        Self {
            fc,
            now_us: 0,
            battery_voltage: 11.5,
            satellites: 6,
            gps_every: 5,
            lifted: false,
            link_alive: true,
            pending: Vec::new(),
            ticks: 0,
        }
    }

    /// Конфигурация с короткими паузами для сценариев
    pub fn quick() -> Self {
        let config = FlightConfig {
            pressure_stab_ticks: 0,
            setpoint_settle_ticks: 10,
            ..FlightConfig::default()
        };
        Self::new(config, Capabilities::default().without_sonar())
    }

    pub fn send(&mut self, frame: LinkFrame) {
        self.pending.push(frame);
    }

    pub fn command(&mut self, command: LinkCommand) {
        self.send(LinkFrame::Command(command));
    }

    pub fn upload(&mut self, slot: u8, command: WaypointCommand) {
        self.send(LinkFrame::Waypoint {
            slot,
            waypoint: Waypoint {
                lat: LAT,
                lon: LON,
                command,
            },
        });
    }

    pub fn inputs(&mut self) -> CycleInputs {
        let mut inputs = CycleInputs::new(Instant::from_micros(self.now_us));
        inputs.sensors.battery_voltage = self.battery_voltage;
        if self.lifted {
            inputs.sensors.imu.accel = Vector3::new(0.0, 0.0, 1.5);
        }
        if self.ticks % self.gps_every == 0 {
            let frame = GpsFrame {
                lat: LAT,
                lon: LON,
                satellites: self.satellites,
                ..GpsFrame::default()
            };
            inputs.gps_frames.push(frame).unwrap();
        }
        if self.pending.is_empty() && self.link_alive {
            inputs.link_frames.push(LinkFrame::KeepAlive).unwrap();
        }
        for frame in self.pending.drain(..) {
            inputs.link_frames.push(frame).unwrap();
        }
        inputs
    }

    pub fn tick(&mut self) -> CycleOutputs {
        let inputs = self.inputs();
        self.run(&inputs)
    }

    /// Цикл с заданными входами и штатным шагом времени
    pub fn run(&mut self, inputs: &CycleInputs) -> CycleOutputs {
        let outputs = self.fc.tick(inputs);
        self.ticks += 1;
        self.now_us += PERIOD_US;
        outputs
    }

    pub fn step(&self) -> LinkStep {
        self.fc.link_step()
    }

    /// Циклы до выполнения условия, `None` если лимит исчерпан
    pub fn run_until(&mut self, limit: u32, mut done: impl FnMut(&Sim) -> bool) -> Option<u32> {
        for n in 0..limit {
            self.tick();
            if done(self) {
                return Some(n + 1);
            }
        }
        None
    }

    /// Взлет до шага подъема: разгон газа, затем отрыв
    pub fn launch(&mut self) {
        for _ in 0..10 {
            self.tick();
        }
        self.command(LinkCommand::AutoTakeoff);
        self.tick();
        assert_eq!(self.step(), LinkStep::Takeoff);
        assert!(self.fc.is_armed());

        for _ in 0..200 {
            self.tick();
        }
        self.lifted = true;
        let lifted = self.run_until(50, |sim| sim.step() == LinkStep::Ascent);
        assert!(lifted.is_some(), "отрыв не обнаружен");
        self.lifted = false;
    }
}
