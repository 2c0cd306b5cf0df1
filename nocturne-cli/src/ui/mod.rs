//! # UI Module
//!
//! Text rendering for the terminal shell.

pub mod cent_meter;
pub mod main_display;
