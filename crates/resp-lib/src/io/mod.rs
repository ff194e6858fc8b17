pub mod oxyview;
pub mod summary;
