pub mod calibrate;
pub mod config;
pub mod equilibrate;
