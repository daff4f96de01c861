//! Backend bridge: UI command queue, worker dispatch, and notification intake.

pub mod commands;
pub mod runtime;
