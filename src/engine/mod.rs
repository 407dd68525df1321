pub mod controller;
pub mod duty;
pub mod sweep;
