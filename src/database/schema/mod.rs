pub mod image;
pub mod instance;
