//! Enforce-versus-observe policy.
//!
//! [`PolicyMode::decide`] turns an [`InspectionOutcome`](crate::core::InspectionOutcome)
//! into a [`Disposition`]: forward the request or reject it with a status.
//! Alert mode only relaxes confirmed detections; a scan that could not
//! complete is rejected in both modes.

mod action;
mod mode;

pub use action::Disposition;
pub use mode::PolicyMode;
