//! Состояние полетного контроллера и один цикл управления
//!
//! Порядок цикла фиксирован: кадры, оценка состояния, проверка защиты,
//! навигация, каскад регуляторов, принудительное отключение, телеметрия.

#[allow(unused_imports)]
use num_traits::Float;

use crate::config::flight::{sonar, stick};
use crate::config::hardware::motors::PULSE_CENTER;
use crate::config::{Calibration, Capabilities, ConfigError, FlightConfig};
use crate::control::attitude::AxisCommand;
use crate::control::{AltitudeHold, CascadeInputs, ControlCascade, GpsHold};
use crate::data::{CycleInputs, CycleOutputs, FlightMode, MotorOutputs, StickInputs};
use crate::navigation::{LinkStep, NavigationContext, NavigationOutput, Navigator};
use crate::protocols::link::LinkSticks;
use crate::protocols::telemetry::{TelemetryEncoder, TelemetrySnapshot};
use crate::safety::{ArmError, BootReport, ErrorFlag, ErrorSet, FailSafe, HealthInputs};
use crate::sensors::{
    AltitudeEstimator, AttitudeEstimator, AttitudeState, PositionEstimator, SonarModel,
    VerticalAccel,
};
use crate::utils::math::{apply_deadband, throttle_expo};

/// Все состояние, которым владеет главный цикл
#[derive(Debug, Clone)]
pub struct FlightState {
    pub attitude: AttitudeEstimator,
    pub vertical_accel: VerticalAccel,
    pub altitude: AltitudeEstimator,
    pub position: PositionEstimator,
    pub sonar: SonarModel,
    pub cascade: ControlCascade,
    pub navigator: Navigator,
    pub fail_safe: FailSafe,
    pub errors: ErrorSet,
    pub telemetry: TelemetryEncoder,
    pub armed: bool,
    /// Номер цикла
    pub tick: u32,
    /// Последняя оценка ориентации
    pub last_attitude: AttitudeState,
    pub last_motors: MotorOutputs,
    /// Предыдущее положение тумблера арминга
    arm_switch: bool,
    /// Режим пульта в прошлом цикле
    mode: FlightMode,
    /// Точка удержания в режиме GPS с пульта
    rc_gps_target: Option<(f32, f32)>,
}

impl FlightState {
    fn new(config: &FlightConfig, capabilities: Capabilities, calibration: &Calibration) -> Self {
        Self {
            attitude: AttitudeEstimator::new(
                config.complementary_weight,
                config.gyro_input_weight,
                calibration,
            ),
            vertical_accel: VerticalAccel::new(),
            altitude: AltitudeEstimator::new(config, calibration.baro),
            position: PositionEstimator::new(config.gps_predict_cycles),
            sonar: SonarModel::new(config),
            cascade: ControlCascade::new(config),
            navigator: Navigator::new(config, capabilities),
            fail_safe: FailSafe::new(config, capabilities.liberty_link),
            errors: ErrorSet::new(),
            telemetry: TelemetryEncoder::new(),
            armed: false,
            tick: 0,
            last_attitude: AttitudeState::default(),
            last_motors: MotorOutputs::cutoff(),
            arm_switch: false,
            mode: FlightMode::Manual,
            rc_gps_target: None,
        }
    }
}

/// Полетный контроллер
#[derive(Debug, Clone)]
pub struct FlightController {
    config: FlightConfig,
    capabilities: Capabilities,
    boot: BootReport,
    state: FlightState,
}

impl FlightController {
    pub fn new(
        config: FlightConfig,
        capabilities: Capabilities,
        calibration: Calibration,
        boot: BootReport,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if let Some(error) = boot.first() {
            warn!("Запуск с ошибкой датчика: {:?}, арминг запрещен", error);
        }
        info!("Контроллер готов, период цикла {} мкс", config.loop_period_us);
        Ok(Self {
            state: FlightState::new(&config, capabilities, &calibration),
            config,
            capabilities,
            boot,
        })
    }

    /// Включение моторов
    ///
    /// Сбрасывает регуляторы, фиксирует давление земли и опорное ускорение.
    pub fn arm(&mut self) -> Result<(), ArmError> {
        if self.state.errors.is_terminated() {
            return Err(ArmError::Terminated);
        }
        if let Some(error) = self.boot.first() {
            return Err(error.into());
        }
        if self.state.armed {
            return Ok(());
        }
        self.state.cascade.reset();
        self.state.altitude.capture_ground();
        self.state.vertical_accel.capture_reference();
        self.state.armed = true;
        info!("Моторы включены");
        Ok(())
    }

    pub fn disarm(&mut self) {
        if self.state.armed {
            info!("Моторы выключены");
        }
        self.state.armed = false;
        self.state.cascade.reset();
    }

    /// Один цикл управления
    pub fn tick(&mut self, inputs: &CycleInputs) -> CycleOutputs {
        let dt = self.config.dt();
        self.state.tick = self.state.tick.wrapping_add(1);

        self.ingest_frames(inputs);
        self.handle_arm_switch(&inputs.sticks);

        // Оценка состояния
        let sensors = &inputs.sensors;
        let attitude = self
            .state
            .attitude
            .update(&sensors.imu, sensors.mag.as_ref(), dt);
        self.state.last_attitude = attitude;
        self.state.vertical_accel.update(&sensors.imu);
        if let Some(baro) = &sensors.baro {
            self.state.altitude.update(baro);
        }
        self.state.altitude.step_hold();
        if self.capabilities.sonar {
            if let Some(sample) = &sensors.sonar {
                self.state.sonar.update(sample);
            }
        }
        let front_spring = if self.capabilities.collision_protection() {
            self.state.sonar.front_spring()
        } else {
            0.0
        };

        #[cfg(feature = "debug-sensors")]
        debug!(
            "Крен {} тангаж {} курс {} давление {}",
            attitude.roll,
            attitude.pitch,
            attitude.yaw,
            self.state.altitude.fast_pressure()
        );

        // Проверка защиты
        let action = self.state.fail_safe.evaluate(
            &mut self.state.errors,
            &HealthInputs {
                started_at: inputs.started_at,
                battery_voltage: sensors.battery_voltage,
                gps_lost_cycles: self.state.position.lost_cycles(),
                front_spring,
            },
        );

        // Навигация
        let nav = {
            let state = &mut self.state;
            let mut ctx = NavigationContext {
                errors: &mut state.errors,
                altitude: &mut state.altitude,
                position: &state.position,
                sonar: &state.sonar,
                vertical_accel: &state.vertical_accel,
                battery_voltage: sensors.battery_voltage,
                boot_ok: self.boot.is_clear(),
                armed: state.armed,
                force_abort: action.abort,
            };
            state.navigator.step(&mut ctx)
        };
        if nav.arm {
            if let Err(error) = self.arm() {
                warn!("Арминг при взлете отклонен: {:?}", error);
            }
        }
        if nav.cut_motors {
            self.disarm();
        }

        // Каскад регуляторов
        let cascade_inputs = self.cascade_inputs(inputs, &nav, attitude, front_spring);
        let mut motors = self.state.cascade.update(&cascade_inputs).motors;

        // Аварийное отключение имеет приоритет над всем
        if action.cutoff || self.state.errors.is_terminated() {
            self.disarm();
            motors = MotorOutputs::cutoff();
        }
        self.state.last_motors = motors;

        #[cfg(feature = "debug-actuators")]
        debug!("Моторы: {:?}", motors.as_array());

        let mut outputs = CycleOutputs {
            motors,
            parcel_release: nav.parcel_release,
            sonar_trigger: self.capabilities.sonar
                && self.state.tick % sonar::REQUEST_CYCLES as u32 == 0,
            ..CycleOutputs::default()
        };
        if self.capabilities.telemetry {
            let snapshot = self.snapshot(inputs);
            outputs.telemetry = self.state.telemetry.next_burst(&snapshot);
        }
        outputs
    }

    fn ingest_frames(&mut self, inputs: &CycleInputs) {
        let state = &mut self.state;
        if inputs.gps_frames.is_empty() {
            state.position.predict();
        }
        for frame in inputs.gps_frames.iter() {
            state.position.ingest(frame, state.tick);
        }

        if !self.capabilities.liberty_link {
            return;
        }
        for frame in inputs.link_frames.iter() {
            state.fail_safe.note_link_frame();
            state.navigator.handle_frame(frame, &mut state.errors);
        }
    }

    /// Арминг по фронту тумблера при газе в нуле, дизарм по спаду
    fn handle_arm_switch(&mut self, sticks: &StickInputs) {
        let switch = sticks.arm_switch;
        if switch && !self.state.arm_switch {
            if sticks.throttle < stick::ARM_MAX_THROTTLE {
                if let Err(error) = self.arm() {
                    warn!("Арминг отклонен: {:?}", error);
                }
            } else {
                warn!("Арминг отклонен: газ не в нуле");
            }
        } else if !switch && self.state.arm_switch {
            self.disarm();
        }
        self.state.arm_switch = switch;
    }

    fn cascade_inputs(
        &mut self,
        inputs: &CycleInputs,
        nav: &NavigationOutput,
        attitude: AttitudeState,
        front_spring: f32,
    ) -> CascadeInputs {
        let rc = &inputs.sticks;
        let sticks = nav
            .sticks
            .or_else(|| self.state.navigator.link_sticks())
            .unwrap_or(LinkSticks {
                roll: rc.roll,
                pitch: rc.pitch,
                yaw: rc.yaw,
                throttle: rc.throttle,
            });

        let autonomous = nav.pressure_hold || nav.sonar_target_mm.is_some() || nav.throttle.is_some();
        let mode = if autonomous { rc.mode } else { self.update_rc_mode(rc.mode) };

        let altitude = if let Some(target_mm) = nav.sonar_target_mm {
            Some(AltitudeHold::Sonar {
                target_mm,
                distance_mm: self.state.sonar.bottom().latest() as f32,
            })
        } else if nav.throttle.is_some() {
            None
        } else if nav.pressure_hold || mode.holds_altitude() {
            if !autonomous {
                self.nudge_altitude(sticks.throttle);
            }
            Some(AltitudeHold::Pressure {
                fast: self.state.altitude.fast_pressure(),
                hold: self.state.altitude.hold_pressure(),
            })
        } else {
            None
        };

        let gps_target = if autonomous { nav.gps_target } else { self.state.rc_gps_target };
        let gps = gps_target.map(|(target_lat, target_lon)| GpsHold {
            target_lat,
            target_lon,
            fix: self.state.position.fix(),
            heading_deg: attitude.yaw,
        });

        CascadeInputs {
            command: AxisCommand {
                roll: sticks.roll as f32,
                pitch: sticks.pitch as f32,
                yaw: sticks.yaw as f32,
                throttle: nav.throttle.unwrap_or_else(|| throttle_expo(sticks.throttle)),
            },
            attitude,
            altitude,
            hover_offset: self.state.navigator.hover_offset(),
            gps,
            front_spring: self
                .capabilities
                .collision_protection()
                .then_some(front_spring),
            battery_voltage: inputs.sensors.battery_voltage,
            armed: self.state.armed,
        }
    }

    /// Смена режима пульта: при входе в удержание фиксируется текущая точка
    fn update_rc_mode(&mut self, mode: FlightMode) -> FlightMode {
        let previous = self.state.mode;
        if mode != previous {
            info!("Режим {:?} -> {:?}", previous, mode);
            if mode.holds_altitude() && !previous.holds_altitude() {
                self.state.altitude.hold_current();
            }
            self.state.rc_gps_target = None;
            let gps_ok = self.state.position.has_fix() && !self.state.errors.contains(ErrorFlag::GpsLost);
            if mode == FlightMode::GpsHold && gps_ok {
                let fix = self.state.position.fix();
                self.state.rc_gps_target = Some((fix.lat as f32, fix.lon as f32));
            }
        }
        self.state.mode = mode;
        mode
    }

    /// Стик газа вне зоны нечувствительности двигает уставку давления
    fn nudge_altitude(&mut self, throttle: u16) {
        let offset = apply_deadband(
            throttle as f32 - PULSE_CENTER as f32,
            stick::ALTITUDE_DEADBAND,
        );
        if offset != 0.0 {
            // Стик вверх - подъем, давление уменьшается
            self.state
                .altitude
                .nudge_hold(-offset * self.config.pressure_sp_factor);
        }
    }

    fn snapshot(&self, inputs: &CycleInputs) -> TelemetrySnapshot {
        let state = &self.state;
        let fix = state.position.fix();
        TelemetrySnapshot {
            errors: state.errors.bits(),
            step: state.navigator.link_step().code(),
            mode: state.mode.code(),
            armed: state.armed,
            battery_voltage: inputs.sensors.battery_voltage,
            roll: state.last_attitude.roll,
            pitch: state.last_attitude.pitch,
            yaw: state.last_attitude.yaw,
            altitude_m: state.altitude.relative_altitude_m(),
            lat: fix.lat,
            lon: fix.lon,
            satellites: fix.satellites,
            waypoint_index: state.navigator.queue().index() as u8,
            sonar_mm: state.sonar.bottom().latest(),
        }
    }

    pub fn state(&self) -> &FlightState {
        &self.state
    }

    pub fn errors(&self) -> ErrorSet {
        self.state.errors
    }

    pub fn link_step(&self) -> LinkStep {
        self.state.navigator.link_step()
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
