pub mod mo2;
pub mod quality;
pub mod regression;
