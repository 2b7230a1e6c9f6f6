use std::path::PathBuf;

use anyhow::Result;

mod asset_loader;
mod camera;
mod config;
mod controls;
mod engine;
mod frame_loop;
mod model;
mod overlay;
mod rendering;
mod scene_graph;
mod viewer;
mod viewport;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    pollster::block_on(window::run(config))?;

    Ok(())
}
