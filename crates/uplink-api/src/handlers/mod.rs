pub mod business;
pub mod progress_ws;
pub mod uploads;
