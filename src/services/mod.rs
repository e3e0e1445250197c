pub mod media;
pub mod upload;
pub mod validation;
