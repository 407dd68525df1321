pub mod driver;
pub mod rescue;
pub mod returns;
