pub mod dataset;
pub mod error;
pub mod ids;
pub mod policy;
pub mod ports;
pub mod table;
pub mod validation;
