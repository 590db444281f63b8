pub mod generation;
pub mod pages;
pub mod tracks;
