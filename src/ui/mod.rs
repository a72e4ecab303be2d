/// User interface components
pub mod anchored;
pub mod detail;
pub mod fullscreen;
pub mod gallery;
pub mod search_bar;
