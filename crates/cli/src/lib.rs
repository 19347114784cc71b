//! Operator console for a cutout editing session.

pub mod command;
