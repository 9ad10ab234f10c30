mod calibrate;
mod food;
mod helpers;
mod import;
mod target;
mod user;
mod weight;

pub(crate) use calibrate::{cmd_calibrate, cmd_calibrate_all, cmd_calibration_history};
pub(crate) use food::{cmd_food_delete, cmd_food_history, cmd_food_log, cmd_food_summary};
pub(crate) use helpers::resolve_user;
pub(crate) use import::cmd_import_logs;
pub(crate) use target::{cmd_target_set, cmd_target_show};
pub(crate) use user::{cmd_user_add, cmd_user_delete, cmd_user_list, cmd_user_switch};
pub(crate) use weight::{cmd_weight_delete, cmd_weight_history, cmd_weight_log};
