pub mod date_utils;

pub use date_utils::{current_time_millis, current_time_secs};
