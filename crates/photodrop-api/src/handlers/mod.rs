pub mod photos;
pub mod upload;
