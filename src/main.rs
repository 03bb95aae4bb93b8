#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod assets;
mod audio;
mod config;
mod model_download;
mod pipeline;
mod render;
mod scene;
mod show;
mod types;
mod ui;

use anyhow::Result;
use gpui::Application;

use crate::config::ShowConfig;

fn main() -> Result<()> {
    env_logger::init();

    let config = ShowConfig::from_env();

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
