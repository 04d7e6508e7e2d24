pub mod dummy;
pub mod exit;
pub mod gpio;
