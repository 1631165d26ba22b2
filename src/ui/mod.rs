/// Screens and custom widgets

pub mod login;
pub mod capture;
pub mod scan_region;
