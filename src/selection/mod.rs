/// Selection, navigation and the animations between grid and detail views
pub mod controller;
pub mod route;
pub mod transition;
