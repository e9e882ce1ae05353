//! `facetrack-kernel` – shared control state and the position stepper.
//!
//! # Modules
//!
//! - [`control_state`] – [`ControlState`][control_state::ControlState]: the
//!   tracking/nod flags and the bounded target position, shared by every
//!   task as an `Arc`.
//! - [`smoother`] – [`PositionSmoother`][smoother::PositionSmoother]: the
//!   deadzone + fine/course stepper that turns raw face reports into target
//!   corrections.

pub mod control_state;
pub mod smoother;

pub use control_state::ControlState;
pub use smoother::{Band, PositionSmoother, SmootherConfig, classify};
