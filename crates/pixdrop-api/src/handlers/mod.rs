pub mod images;
pub mod limits;
pub mod process;
pub mod upload;
