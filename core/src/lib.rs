pub mod calibration;
pub mod db;
pub mod log_import;
pub mod models;
pub mod service;
