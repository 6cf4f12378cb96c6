pub mod input;
pub mod upload;
