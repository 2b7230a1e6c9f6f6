pub mod light_uniform;
pub mod overlay_renderer;
pub mod render_model;
pub mod renderer;
pub mod texture;
