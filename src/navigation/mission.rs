//! Машина состояний автономного полета Liberty-Link
//!
//! Навигация не управляет моторами напрямую: она выдает уставки (газ при
//! взлете, давление, позицию, расстояние сонара, стики прямого управления),
//! которые затем проходят через общий каскад регуляторов.

#[allow(unused_imports)]
use num_traits::Float;

use super::{AbortCause, LinkStep, NavigationState, Waypoint, WaypointCommand, WaypointQueue};
use crate::config::flight::takeoff::THROTTLE_RAMP_STEP;
use crate::config::hardware::motors::{IDLE_PULSE, PULSE_CENTER};
use crate::config::{Capabilities, FlightConfig};
use crate::protocols::link::{LinkCommand, LinkFrame, LinkSticks};
use crate::safety::{ErrorFlag, ErrorSet};
use crate::sensors::{AltitudeEstimator, PositionEstimator, SonarModel, VerticalAccel};
use crate::utils::math::gps_distance_m;

/// Шаг уставки при множителе 1 (1e-7 градуса за такт)
const MOVE_UNIT: f32 = 10.0;

/// Данные, доступные навигации в одном цикле
pub struct NavigationContext<'a> {
    pub errors: &'a mut ErrorSet,
    pub altitude: &'a mut AltitudeEstimator,
    pub position: &'a PositionEstimator,
    pub sonar: &'a SonarModel,
    pub vertical_accel: &'a VerticalAccel,
    pub battery_voltage: f32,
    /// Датчики прошли проверку при старте
    pub boot_ok: bool,
    pub armed: bool,
    /// Защита требует прервать миссию (потеря связи)
    pub force_abort: bool,
}

/// Уставки навигации для каскада
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NavigationOutput {
    /// Запрос арминга при принятом автовзлете
    pub arm: bool,
    pub cut_motors: bool,
    /// Газ напрямую, в обход удержания высоты
    pub throttle: Option<f32>,
    /// Удержание высоты по барометру
    pub pressure_hold: bool,
    /// Удержание расстояния до земли по сонару (мм)
    pub sonar_target_mm: Option<f32>,
    /// Уставка позиции (1e-7 градуса)
    pub gps_target: Option<(f32, f32)>,
    /// Стики прямого управления
    pub sticks: Option<LinkSticks>,
    pub parcel_release: bool,
}

/// Навигатор Liberty-Link
#[derive(Debug, Clone)]
pub struct Navigator {
    config: FlightConfig,
    capabilities: Capabilities,
    state: NavigationState,
    queue: WaypointQueue,
    /// Команда, принятая с прошлого цикла
    pending: Option<LinkCommand>,
    link_sticks: Option<LinkSticks>,
    direct_control: bool,
    takeoff_throttle: f32,
    hover_offset: f32,
    /// Нижний сонар в момент взлета (мм)
    sonar_reference: u16,
    settle_ticks: u16,
    lat_factor: f32,
    lon_factor: f32,
    /// Уставка давления перед снижением
    cruise_pressure: f32,
    sonar_target: f32,
    /// Удержание высоты и позиции в IDLE после прерывания
    holding: bool,
    hold_position: Option<(f32, f32)>,
    terminated: bool,
}

impl Navigator {
    pub fn new(config: &FlightConfig, capabilities: Capabilities) -> Self {
        let hover_offset = match config.manual_takeoff_throttle {
            0 => 0.0,
            manual => manual as f32 - PULSE_CENTER as f32,
        };
        Self {
            config: *config,
            capabilities,
            state: NavigationState::default(),
            queue: WaypointQueue::new(),
            pending: None,
            link_sticks: None,
            direct_control: false,
            takeoff_throttle: IDLE_PULSE as f32,
            hover_offset,
            sonar_reference: 0,
            settle_ticks: 0,
            lat_factor: 0.0,
            lon_factor: 0.0,
            cruise_pressure: 0.0,
            sonar_target: 0.0,
            holding: false,
            hold_position: None,
            terminated: false,
        }
    }

    /// Обработка принятого кадра Liberty-Link
    pub fn handle_frame(&mut self, frame: &LinkFrame, errors: &mut ErrorSet) {
        match *frame {
            LinkFrame::KeepAlive => {}
            LinkFrame::Sticks(sticks) => self.link_sticks = Some(sticks),
            LinkFrame::Waypoint { slot, waypoint } => match self.queue.upload(slot, waypoint) {
                Ok(()) => info!("Точка {} загружена: {:?}", slot, waypoint.command),
                Err(e) => warn!("Точка отклонена: {:?}", e),
            },
            LinkFrame::Command(LinkCommand::FlightTermination) => {
                if !self.terminated {
                    error!("Аварийное отключение моторов");
                }
                self.terminated = true;
                errors.insert(ErrorFlag::FlightTermination);
                self.state.last_command = Some(LinkCommand::FlightTermination);
            }
            LinkFrame::Command(command) => {
                self.pending = Some(command);
                self.state.last_command = Some(command);
            }
            LinkFrame::MissionReset => {
                if self.state.step == LinkStep::Idle {
                    self.queue.reset();
                    info!("Миссия сброшена");
                } else {
                    warn!("Сброс миссии в полете отклонен");
                }
            }
        }
    }

    /// Один такт машины состояний
    pub fn step(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        if self.terminated || ctx.errors.is_terminated() {
            self.terminated = true;
            self.pending = None;
            self.holding = false;
            self.direct_control = false;
            self.state.step = LinkStep::Idle;
            return NavigationOutput {
                cut_motors: true,
                ..NavigationOutput::default()
            };
        }

        if !ctx.armed {
            self.holding = false;
            if !matches!(self.state.step, LinkStep::Idle | LinkStep::AfterSonar) {
                info!("Моторы выключены, миссия остановлена");
                self.enter(LinkStep::Idle);
            }
        }

        let command = self.pending.take();
        if self.state.step != LinkStep::Idle {
            if let Some(cause) = self.abort_cause(ctx, command) {
                return self.abort(ctx, cause);
            }
        }

        match self.state.step {
            LinkStep::Idle => self.idle(ctx, command),
            LinkStep::Takeoff => self.takeoff(ctx),
            LinkStep::Ascent => {
                if ctx.altitude.hold_reached() {
                    self.enter(LinkStep::WaypointCalc);
                }
                self.cruise_output()
            }
            LinkStep::WaypointCalc => self.waypoint_calc(ctx),
            LinkStep::GpsWaypoint => self.gps_waypoint(ctx),
            LinkStep::GpsSetpoint => self.gps_setpoint(ctx, command),
            LinkStep::Descent => self.descent(ctx),
            LinkStep::SonarFinal => self.sonar_final(ctx),
            LinkStep::AfterSonar => self.after_sonar(ctx),
        }
    }

    fn abort_cause(&self, ctx: &NavigationContext, command: Option<LinkCommand>) -> Option<AbortCause> {
        if command == Some(LinkCommand::Idle) {
            Some(AbortCause::Command)
        } else if ctx.force_abort {
            Some(AbortCause::LinkLost)
        } else if ctx.errors.contains(ErrorFlag::GpsLost) {
            Some(AbortCause::GpsLost)
        } else if ctx.position.satellites() < self.config.min_satellites {
            Some(AbortCause::Satellites)
        } else {
            None
        }
    }

    /// Прерывание: подъем уставки и переход в IDLE
    ///
    /// На взлете аппарат еще на земле, моторы отключаются.
    fn abort(&mut self, ctx: &mut NavigationContext, cause: AbortCause) -> NavigationOutput {
        warn!("Прерывание миссии на шаге {:?}: {:?}", self.state.step, cause);
        let on_ground = self.state.step == LinkStep::Takeoff;

        ctx.altitude.shift_hold_target(-self.config.abort_pressure_ascend);
        self.state.ascend_offset += self.config.abort_pressure_ascend;
        self.state.target = None;
        self.direct_control = false;
        self.enter(LinkStep::Idle);

        if on_ground {
            self.holding = false;
            return NavigationOutput {
                cut_motors: true,
                ..NavigationOutput::default()
            };
        }

        self.start_holding(ctx);
        self.holding_output()
    }

    fn idle(&mut self, ctx: &mut NavigationContext, command: Option<LinkCommand>) -> NavigationOutput {
        match command {
            Some(LinkCommand::AutoTakeoff) => return self.try_takeoff(ctx),
            Some(LinkCommand::DirectControl | LinkCommand::DirectControlLand) => {
                self.direct_control = true;
            }
            _ => {}
        }

        let mut output = if self.holding {
            self.holding_output()
        } else {
            NavigationOutput::default()
        };
        if self.direct_control {
            output.sticks = self.link_sticks;
        }
        output
    }

    /// Предполетная проверка и запуск взлета
    fn try_takeoff(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        let satellites = ctx.position.satellites();
        let rejected = if !ctx.boot_ok {
            Some("ошибка старта")
        } else if ctx.armed {
            Some("моторы уже включены")
        } else if !ctx.position.has_fix() || satellites < self.config.min_satellites {
            Some("мало спутников")
        } else if ctx.battery_voltage < self.config.min_takeoff_voltage {
            Some("низкое напряжение")
        } else {
            None
        };

        if let Some(reason) = rejected {
            warn!("Взлет отклонен: {}", reason);
            ctx.errors.insert(ErrorFlag::ManualTakeoffRejected);
            return NavigationOutput::default();
        }

        if self.capabilities.takeoff_by_sonar() {
            if !ctx.sonar.bottom().has_echo() {
                warn!("Взлет отклонен: нет эха нижнего сонара");
                ctx.errors.insert(ErrorFlag::SonarTakeoff);
                return NavigationOutput::default();
            }
            self.sonar_reference = ctx.sonar.bottom().latest();
        }

        for flag in [
            ErrorFlag::ManualTakeoffRejected,
            ErrorFlag::TakeoffNotDetected,
            ErrorFlag::TakeoffNotCalculated,
            ErrorFlag::SonarTakeoff,
        ] {
            ctx.errors.remove(flag);
        }

        let fix = ctx.position.fix();
        self.state.setpoint_lat = fix.lat as f32;
        self.state.setpoint_lon = fix.lon as f32;
        self.state.ascend_offset = 0.0;
        self.takeoff_throttle = IDLE_PULSE as f32;
        self.holding = false;
        self.direct_control = false;
        self.enter(LinkStep::Takeoff);

        NavigationOutput {
            arm: true,
            throttle: Some(self.takeoff_throttle),
            ..NavigationOutput::default()
        }
    }

    /// Разгон газа до отрыва
    fn takeoff(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        if self.config.manual_takeoff_throttle != 0 {
            return self.lift_off(ctx);
        }

        let by_accel = ctx.vertical_accel.excess() > self.config.takeoff_acc_threshold_g;
        let by_sonar = self.capabilities.takeoff_by_sonar()
            && ctx.sonar.bottom_rise(self.sonar_reference)
                > self.config.takeoff_sonar_increment_mm as i32;

        if by_accel || by_sonar {
            if self.takeoff_throttle < self.config.takeoff_throttle_floor {
                error!("Газ отрыва {} неправдоподобен", self.takeoff_throttle);
                ctx.errors.insert(ErrorFlag::TakeoffNotCalculated);
                return self.fail_takeoff();
            }
            self.hover_offset = self.takeoff_throttle - PULSE_CENTER as f32;
            info!("Отрыв при газе {}", self.takeoff_throttle);
            return self.lift_off(ctx);
        }

        self.takeoff_throttle += THROTTLE_RAMP_STEP;
        if self.takeoff_throttle >= self.config.takeoff_throttle_ceiling {
            error!("Отрыв не обнаружен");
            ctx.errors.insert(ErrorFlag::TakeoffNotDetected);
            return self.fail_takeoff();
        }

        NavigationOutput {
            throttle: Some(self.takeoff_throttle),
            ..NavigationOutput::default()
        }
    }

    fn fail_takeoff(&mut self) -> NavigationOutput {
        self.enter(LinkStep::Idle);
        self.holding = false;
        NavigationOutput {
            cut_motors: true,
            ..NavigationOutput::default()
        }
    }

    /// Уставка высоты взлета и подъем для полета по точкам
    fn lift_off(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        let ground = ctx
            .altitude
            .ground_pressure()
            .unwrap_or_else(|| ctx.altitude.hold_pressure());
        ctx.altitude
            .set_hold_target(ground - self.config.pressure_takeoff - self.config.pressure_ascend);
        self.state.ascend_offset = self.config.pressure_ascend;
        self.enter(LinkStep::Ascent);
        self.cruise_output()
    }

    fn waypoint_calc(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        // После снижения ждем возврата на высоту полета
        if !ctx.altitude.hold_reached() {
            return self.cruise_output();
        }

        self.reset_waypoint_state();
        match self.queue.next_active() {
            None => {
                info!("Маршрут завершен");
                self.state.target = None;
                self.enter(LinkStep::Idle);
                self.holding = true;
                self.hold_position = Some((self.state.setpoint_lat, self.state.setpoint_lon));
                self.holding_output()
            }
            Some(waypoint) => {
                info!("Точка {}: {:?}", self.queue.index(), waypoint.command);
                self.state.target = Some(waypoint);
                if waypoint.command.holds_gps() {
                    self.plan_leg(&waypoint);
                    self.enter(LinkStep::GpsWaypoint);
                } else {
                    self.enter(LinkStep::GpsSetpoint);
                }
                self.cruise_output()
            }
        }
    }

    /// Направление движения уставки: большая ось получает множитель 1
    fn plan_leg(&mut self, waypoint: &Waypoint) {
        let d_lat = waypoint.lat as f32 - self.state.setpoint_lat;
        let d_lon = waypoint.lon as f32 - self.state.setpoint_lon;
        let span = d_lat.abs().max(d_lon.abs());
        if span > 0.0 {
            self.lat_factor = d_lat / span;
            self.lon_factor = d_lon / span;
        } else {
            self.lat_factor = 0.0;
            self.lon_factor = 0.0;
        }
    }

    /// Множитель скорости уставки: минимум далеко, максимум рядом
    fn move_factor(&self, distance_m: f32) -> f32 {
        let far = self.config.waypoint_far_distance_m;
        let (min, max) = (self.config.waypoint_min_factor, self.config.waypoint_max_factor);
        if distance_m >= far {
            min
        } else {
            max - (max - min) * distance_m / far
        }
    }

    fn gps_waypoint(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        let Some(target) = self.state.target else {
            self.enter(LinkStep::WaypointCalc);
            return self.cruise_output();
        };

        let remaining = gps_distance_m(
            libm::roundf(self.state.setpoint_lat) as i32,
            libm::roundf(self.state.setpoint_lon) as i32,
            target.lat,
            target.lon,
        );
        let step = self.move_factor(remaining) * MOVE_UNIT;
        self.state.setpoint_lat = approach(self.state.setpoint_lat, target.lat as f32, step * self.lat_factor);
        self.state.setpoint_lon = approach(self.state.setpoint_lon, target.lon as f32, step * self.lon_factor);

        let fix = ctx.position.fix();
        if gps_distance_m(fix.lat, fix.lon, target.lat, target.lon) < self.config.setpoint_distance_m {
            self.state.setpoint_lat = target.lat as f32;
            self.state.setpoint_lon = target.lon as f32;
            self.enter(LinkStep::GpsSetpoint);
        }
        self.cruise_output()
    }

    fn gps_setpoint(&mut self, ctx: &mut NavigationContext, command: Option<LinkCommand>) -> NavigationOutput {
        let Some(target) = self.state.target else {
            self.enter(LinkStep::WaypointCalc);
            return self.cruise_output();
        };

        self.settle_ticks = self.settle_ticks.saturating_add(1);
        let settled = self.settle_ticks >= self.config.setpoint_settle_ticks;
        let output = self.waypoint_output(&target);

        match target.command {
            WaypointCommand::Skip | WaypointCommand::Fly if settled => {
                self.enter(LinkStep::AfterSonar);
            }
            WaypointCommand::Descend | WaypointCommand::Parcel | WaypointCommand::Land if settled => {
                self.start_descent(ctx);
            }
            waypoint
                if waypoint.descends_on_command()
                    && matches!(
                        command,
                        Some(LinkCommand::AutoLand | LinkCommand::DirectControlLand)
                    ) =>
            {
                self.start_descent(ctx);
            }
            WaypointCommand::DirectNoDescent | WaypointCommand::DirectNoGpsNoDescent
                if command == Some(LinkCommand::AutoTakeoff) =>
            {
                // Оператор продолжает маршрут
                self.enter(LinkStep::AfterSonar);
            }
            _ => {}
        }
        output
    }

    fn start_descent(&mut self, ctx: &mut NavigationContext) {
        self.cruise_pressure = ctx.altitude.hold_target();
        self.enter(LinkStep::Descent);
    }

    fn descent(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        let Some(target) = self.state.target else {
            self.enter(LinkStep::WaypointCalc);
            return self.cruise_output();
        };
        let mut output = self.waypoint_output(&target);

        ctx.altitude.shift_hold_target(self.config.waypoint_altitude_term);
        let at_ground = match ctx.altitude.ground_pressure() {
            Some(ground) if ctx.altitude.hold_target() >= ground => {
                ctx.altitude.set_hold_target(ground);
                ctx.altitude.hold_reached()
            }
            _ => false,
        };

        if self.capabilities.landing_by_sonar() {
            let bottom = ctx.sonar.bottom();
            if bottom.stably_below(self.config.sonar_mtof_mm) {
                self.sonar_target = if target.command.cuts_motors() {
                    0.0
                } else {
                    bottom.latest() as f32
                };
                self.enter(LinkStep::SonarFinal);
            }
        } else if at_ground {
            output.cut_motors = target.command.cuts_motors();
            self.enter(LinkStep::AfterSonar);
        }
        output
    }

    fn sonar_final(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        let Some(target) = self.state.target else {
            self.enter(LinkStep::WaypointCalc);
            return self.cruise_output();
        };
        let mut output = self.waypoint_output(&target);
        output.pressure_hold = false;
        output.sonar_target_mm = Some(self.sonar_target);

        if ctx.sonar.bottom().stably_below(self.config.sonar_mtof_mm) {
            self.settle_ticks = self.settle_ticks.saturating_add(1);
        } else {
            self.settle_ticks = 0;
        }

        if self.settle_ticks >= self.config.sonar_settle_ticks {
            output.cut_motors = target.command.cuts_motors();
            self.enter(LinkStep::AfterSonar);
        }
        output
    }

    fn after_sonar(&mut self, ctx: &mut NavigationContext) -> NavigationOutput {
        let command = self.state.target.map(|t| t.command).unwrap_or_default();
        self.queue.advance();
        self.state.target = None;
        self.reset_waypoint_state();

        if command.cuts_motors() {
            info!("Посадка завершена");
            self.holding = false;
            self.enter(LinkStep::Idle);
            return NavigationOutput {
                cut_motors: true,
                ..NavigationOutput::default()
            };
        }

        if command.descends() {
            ctx.altitude.set_hold_target(self.cruise_pressure);
        }
        self.enter(LinkStep::WaypointCalc);

        NavigationOutput {
            parcel_release: command.releases_parcel(),
            ..self.cruise_output()
        }
    }

    fn reset_waypoint_state(&mut self) {
        self.settle_ticks = 0;
        self.lat_factor = 0.0;
        self.lon_factor = 0.0;
        self.sonar_target = 0.0;
    }

    fn start_holding(&mut self, ctx: &NavigationContext) {
        self.holding = true;
        self.hold_position = if ctx.position.has_fix() && !ctx.errors.contains(ErrorFlag::GpsLost) {
            let fix = ctx.position.fix();
            Some((fix.lat as f32, fix.lon as f32))
        } else {
            None
        };
    }

    fn holding_output(&self) -> NavigationOutput {
        NavigationOutput {
            pressure_hold: true,
            gps_target: self.hold_position,
            ..NavigationOutput::default()
        }
    }

    fn cruise_output(&self) -> NavigationOutput {
        NavigationOutput {
            pressure_hold: true,
            gps_target: Some((self.state.setpoint_lat, self.state.setpoint_lon)),
            ..NavigationOutput::default()
        }
    }

    /// Уставки в точке с учетом ее команды
    fn waypoint_output(&self, target: &Waypoint) -> NavigationOutput {
        let mut output = self.cruise_output();
        if !target.command.holds_gps() {
            output.gps_target = None;
        }
        if target.command.direct_control() {
            output.sticks = self.link_sticks;
        }
        output
    }

    fn enter(&mut self, step: LinkStep) {
        if self.state.step != step {
            info!("Шаг {:?} -> {:?}", self.state.step, step);
        }
        self.state.step = step;
        self.settle_ticks = 0;
    }

    pub fn link_step(&self) -> LinkStep {
        self.state.step
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn queue(&self) -> &WaypointQueue {
        &self.queue
    }

    /// Газ висения относительно центра стика
    pub fn hover_offset(&self) -> f32 {
        self.hover_offset
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Прямое управление с Liberty-Link активно
    pub fn link_sticks(&self) -> Option<LinkSticks> {
        if self.direct_control {
            self.link_sticks
        } else {
            None
        }
    }
}

/// Сдвиг на `step` к цели без перелета
fn approach(value: f32, target: f32, step: f32) -> f32 {
    if (target - value).abs() <= step.abs() {
        target
    } else {
        value + step
    }
}

// Тесты для отладки на хосте
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaroCoefficients;
    use crate::data::{ImuSample, SonarSample};
    use crate::protocols::gps::GpsFrame;
    use nalgebra::Vector3;

    const LAT: i32 = 523_000_000;
    const LON: i32 = 45_000_000;

    struct Rig {
        nav: Navigator,
        errors: ErrorSet,
        altitude: AltitudeEstimator,
        position: PositionEstimator,
        sonar: SonarModel,
        accel: VerticalAccel,
        armed: bool,
        satellites: u8,
        bottom_mm: u16,
        tick: u32,
    }

    impl Rig {
        fn new(capabilities: Capabilities) -> Self {
            let config = FlightConfig {
                pressure_stab_ticks: 0,
                ..FlightConfig::default()
            };
            let mut altitude = AltitudeEstimator::new(&config, BaroCoefficients::default());
            altitude.capture_ground();
            let mut accel = VerticalAccel::new();
            for _ in 0..30 {
                accel.update(&ImuSample::default());
            }
            accel.capture_reference();

            let mut rig = Self {
                nav: Navigator::new(&config, capabilities),
                errors: ErrorSet::new(),
                altitude,
                position: PositionEstimator::new(config.gps_predict_cycles),
                sonar: SonarModel::new(&config),
                accel,
                armed: false,
                satellites: 6,
                bottom_mm: 0,
                tick: 0,
            };
            rig.feed_gps();
            rig
        }

        fn feed_gps(&mut self) {
            let frame = GpsFrame {
                lat: LAT,
                lon: LON,
                satellites: self.satellites,
                ..GpsFrame::default()
            };
            self.position.ingest(&frame, self.tick);
        }

        fn step(&mut self) -> NavigationOutput {
            self.tick += 1;
            self.feed_gps();
            self.altitude.step_hold();
            self.sonar.update(&SonarSample {
                bottom_mm: self.bottom_mm,
                front_mm: 0,
            });
            let mut ctx = NavigationContext {
                errors: &mut self.errors,
                altitude: &mut self.altitude,
                position: &self.position,
                sonar: &self.sonar,
                vertical_accel: &self.accel,
                battery_voltage: 11.5,
                boot_ok: true,
                armed: self.armed,
                force_abort: false,
            };
            let output = self.nav.step(&mut ctx);
            if output.arm {
                self.armed = true;
            }
            if output.cut_motors {
                self.armed = false;
            }
            output
        }

        fn send(&mut self, frame: LinkFrame) {
            self.nav.handle_frame(&frame, &mut self.errors);
        }

        fn command(&mut self, command: LinkCommand) {
            self.send(LinkFrame::Command(command));
        }

        fn upload(&mut self, slot: u8, command: WaypointCommand) {
            self.upload_at(slot, LAT, LON, command);
        }

        fn upload_at(&mut self, slot: u8, lat: i32, lon: i32, command: WaypointCommand) {
            self.send(LinkFrame::Waypoint {
                slot,
                waypoint: Waypoint::new(lat, lon, command),
            });
        }

        fn lift(&mut self) {
            let sample = ImuSample {
                accel: Vector3::new(0.0, 0.0, 1.5),
                ..ImuSample::default()
            };
            for _ in 0..30 {
                self.accel.update(&sample);
            }
        }

        /// Взлет с разгоном газа до 1400
        fn launch(&mut self, command: WaypointCommand) {
            self.launch_to(LAT, LON, command);
        }

        fn launch_to(&mut self, lat: i32, lon: i32, command: WaypointCommand) {
            self.upload_at(0, lat, lon, command);
            self.command(LinkCommand::AutoTakeoff);
            assert!(self.step().arm);
            for _ in 0..200 {
                self.step();
            }
            self.lift();
        }

        fn run_until(&mut self, target: LinkStep, limit: usize) -> bool {
            for _ in 0..limit {
                if self.nav.link_step() == target {
                    return true;
                }
                self.step();
            }
            self.nav.link_step() == target
        }
    }

    #[test]
    fn test_takeoff_rejected_without_satellites() {
        let mut rig = Rig::new(Capabilities::default());
        rig.satellites = 4;
        rig.feed_gps();
        rig.upload(0, WaypointCommand::Fly);
        rig.command(LinkCommand::AutoTakeoff);
        let output = rig.step();
        assert!(!output.arm);
        assert_eq!(rig.nav.link_step(), LinkStep::Idle);
        assert!(rig.errors.contains(ErrorFlag::ManualTakeoffRejected));
    }

    #[test]
    fn test_fly_mission_ends_in_idle() {
        let mut rig = Rig::new(Capabilities::default());
        rig.launch(WaypointCommand::Fly);

        rig.step();
        assert_eq!(rig.nav.link_step(), LinkStep::Ascent);
        assert!((rig.nav.hover_offset() + 100.0).abs() < 1e-3);
        assert!(rig.run_until(LinkStep::WaypointCalc, 1_000));
        assert!(rig.run_until(LinkStep::GpsSetpoint, 10));
        assert!(rig.run_until(LinkStep::AfterSonar, 300));
        assert!(rig.run_until(LinkStep::Idle, 10));

        assert!(rig.nav.queue().is_exhausted());
        let output = rig.step();
        assert!(output.pressure_hold);
        assert!(!output.cut_motors);
    }

    #[test]
    fn test_takeoff_ceiling_cuts_motors() {
        let mut rig = Rig::new(Capabilities::default());
        rig.upload(0, WaypointCommand::Fly);
        rig.command(LinkCommand::AutoTakeoff);
        rig.step();

        let mut cut = false;
        for _ in 0..600 {
            if rig.step().cut_motors {
                cut = true;
                break;
            }
        }
        assert!(cut);
        assert!(!rig.armed);
        assert_eq!(rig.nav.link_step(), LinkStep::Idle);
        assert!(rig.errors.contains(ErrorFlag::TakeoffNotDetected));
    }

    #[test]
    fn test_abort_from_every_step() {
        let steps = [
            LinkStep::Takeoff,
            LinkStep::Ascent,
            LinkStep::WaypointCalc,
            LinkStep::GpsWaypoint,
            LinkStep::GpsSetpoint,
            LinkStep::AfterSonar,
            LinkStep::Descent,
            LinkStep::SonarFinal,
        ];
        for step in steps {
            let mut rig = Rig::new(Capabilities::default());
            match step {
                // Точка в 550 м, подход длится много тактов
                LinkStep::GpsWaypoint => rig.launch_to(LAT + 50_000, LON, WaypointCommand::Fly),
                LinkStep::AfterSonar => rig.launch(WaypointCommand::Fly),
                _ => rig.launch(WaypointCommand::Land),
            }
            if step == LinkStep::Takeoff {
                // Отрыв еще не обнаружен
                rig.accel.capture_reference();
            }
            if step == LinkStep::SonarFinal {
                rig.bottom_mm = 300;
            }
            assert!(rig.run_until(step, 2_000));
            if step == LinkStep::GpsWaypoint {
                for _ in 0..5 {
                    rig.step();
                }
                assert_eq!(rig.nav.link_step(), LinkStep::GpsWaypoint);
            }

            let target = rig.altitude.hold_target();
            rig.command(LinkCommand::Idle);
            let output = rig.step();
            assert_eq!(rig.nav.link_step(), LinkStep::Idle);
            assert!((rig.altitude.hold_target() - (target - 20.0)).abs() < 1e-3);
            assert_eq!(output.cut_motors, step == LinkStep::Takeoff);
        }
    }

    #[test]
    fn test_direct_descent_waits_for_land_command() {
        let mut rig = Rig::new(Capabilities::default());
        rig.launch(WaypointCommand::DirectDescent);
        assert!(rig.run_until(LinkStep::GpsSetpoint, 2_000));
        for _ in 0..300 {
            rig.step();
        }
        assert_eq!(rig.nav.link_step(), LinkStep::GpsSetpoint);

        rig.command(LinkCommand::AutoLand);
        rig.step();
        assert_eq!(rig.nav.link_step(), LinkStep::Descent);
    }

    #[test]
    fn test_satellite_loss_aborts() {
        let mut rig = Rig::new(Capabilities::default());
        rig.launch(WaypointCommand::Fly);
        assert!(rig.run_until(LinkStep::Ascent, 5));
        rig.satellites = 3;
        let output = rig.step();
        assert_eq!(rig.nav.link_step(), LinkStep::Idle);
        assert!(output.pressure_hold);
    }

    #[test]
    fn test_land_with_sonar_cuts_after_settle() {
        let mut rig = Rig::new(Capabilities::default());
        rig.launch(WaypointCommand::Land);
        rig.bottom_mm = 300;
        assert!(rig.run_until(LinkStep::SonarFinal, 2_000));

        let output = rig.step();
        assert_eq!(output.sonar_target_mm, Some(0.0));
        assert!(!output.cut_motors);

        let mut cut = false;
        for _ in 0..130 {
            if rig.step().cut_motors {
                cut = true;
                break;
            }
        }
        assert!(cut);
        assert_eq!(rig.nav.link_step(), LinkStep::AfterSonar);
        rig.step();
        assert_eq!(rig.nav.link_step(), LinkStep::Idle);
        assert!(rig.nav.queue().is_exhausted());
    }

    #[test]
    fn test_termination_latches() {
        let mut rig = Rig::new(Capabilities::default());
        rig.launch(WaypointCommand::Fly);
        rig.command(LinkCommand::FlightTermination);
        assert!(rig.step().cut_motors);
        assert_eq!(rig.nav.link_step(), LinkStep::Idle);

        rig.command(LinkCommand::AutoTakeoff);
        let output = rig.step();
        assert!(output.cut_motors);
        assert!(!output.arm);
        assert!(rig.nav.is_terminated());
        assert!(rig.errors.is_terminated());
    }

    #[test]
    fn test_sonar_takeoff_needs_echo() {
        let caps = Capabilities {
            sonar_takeoff_detection: true,
            ..Capabilities::default()
        };
        let mut rig = Rig::new(caps);
        rig.upload(0, WaypointCommand::Fly);
        rig.command(LinkCommand::AutoTakeoff);
        assert!(!rig.step().arm);
        assert!(rig.errors.contains(ErrorFlag::SonarTakeoff));

        // Отрыв по росту расстояния нижнего сонара
        rig.bottom_mm = 40;
        rig.step();
        rig.command(LinkCommand::AutoTakeoff);
        assert!(rig.step().arm);
        assert!(!rig.errors.contains(ErrorFlag::SonarTakeoff));
        for _ in 0..160 {
            rig.step();
        }
        rig.bottom_mm = 200;
        rig.step();
        assert_eq!(rig.nav.link_step(), LinkStep::Ascent);
    }

    #[test]
    fn test_mission_reset_only_in_idle() {
        let mut rig = Rig::new(Capabilities::default());
        rig.upload(0, WaypointCommand::Fly);
        rig.upload(1, WaypointCommand::Land);
        assert_eq!(rig.nav.queue().len(), 2);
        rig.send(LinkFrame::MissionReset);
        assert!(rig.nav.queue().is_empty());
    }

    #[test]
    fn test_move_factor_range() {
        let nav = Navigator::new(&FlightConfig::default(), Capabilities::default());
        assert!((nav.move_factor(500.0) - 0.015).abs() < 1e-6);
        assert!((nav.move_factor(0.0) - 0.05).abs() < 1e-6);
        assert!(nav.move_factor(50.0) > 0.015 && nav.move_factor(50.0) < 0.05);
        assert_eq!(approach(0.0, 3.0, 5.0), 3.0);
        assert_eq!(approach(0.0, 30.0, 5.0), 5.0);
    }
}
