/// Masonry layout: column packing, offscreen measurement of the selected
/// frame, and the engine that ties both together.
pub mod debounce;
pub mod engine;
pub mod frame;
pub mod geometry;
pub mod measure;
pub mod packer;
