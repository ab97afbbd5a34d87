pub mod dto;
pub mod fixtures;
