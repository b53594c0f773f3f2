pub mod altitude;
pub mod fusion;
pub mod position;
pub mod sonar;

pub use altitude::AltitudeEstimator;
pub use fusion::{AttitudeEstimator, AttitudeState, VerticalAccel};
pub use position::{GpsErrorWindow, PositionEstimator, PositionFix};
pub use sonar::SonarModel;
