pub mod logger;
pub mod terminal_control;
pub mod time_utils;
