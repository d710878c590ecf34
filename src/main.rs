// Copyright 2025 The Hagelradar Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Desktop viewer for the hagelradar.be hail probability feed.

mod config;
mod locate;
mod map;
mod ui;

use std::time::Duration;

use eframe::egui;
use hagel_client::{Client, ClientConfig};
use log::{info, warn};

use crate::config::AppConfig;
use crate::locate::LocateControl;
use crate::map::TileManager;
use crate::ui::map_view::INITIAL_CENTER;
use crate::ui::{LegendControl, MapView};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<(), eframe::Error> {
    env_logger::init();
    info!("Starting Hagelradar Desktop...");

    if let Ok(path) = AppConfig::get_config_path() {
        info!("Config file: {}", path.display());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 750.0])
            .with_title("hagelradar.be"),
        ..Default::default()
    };

    eframe::run_native(
        "hagelradar.be",
        options,
        Box::new(|cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::light());
            Ok(Box::new(HagelApp::new()))
        }),
    )
}

struct HagelApp {
    client: Client,
    config: AppConfig,
    map_view: MapView,
    tile_manager: TileManager,
    locate: LocateControl,
    show_info: bool,
}

impl HagelApp {
    fn new() -> Self {
        let config = AppConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        });

        // Poll loop starts immediately; the first layers appear once the
        // feed answers
        let client = Client::spawn(ClientConfig::default());

        Self {
            map_view: MapView::new(INITIAL_CENTER, config.default_zoom),
            tile_manager: TileManager::new(),
            locate: LocateControl::new(),
            show_info: false,
            client,
            config,
        }
    }
}

impl eframe::App for HagelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Poll results arrive in the background; repaint on a heartbeat so
        // they show up without user input
        ctx.request_repaint_after(Duration::from_millis(500));

        let snapshot = self.client.snapshot();

        egui::TopBottomPanel::top("navbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("hagelradar.be").strong().size(16.0));

                if !snapshot.last_updated.is_empty() {
                    ui.add_space(12.0);
                    ui.label(&snapshot.last_updated);
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Info").clicked() {
                        self.show_info = !self.show_info;
                    }
                    ui.checkbox(&mut self.config.show_observations, "meldingen");
                });
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.map_view.ui(
                    ui,
                    &snapshot,
                    &self.tile_manager,
                    self.config.show_observations,
                    self.config.overlay_opacity,
                    &self.client.poll_status(),
                );
            });

        LegendControl::new(&snapshot).show(ctx);

        if self.show_info {
            ui::info::show(ctx, &mut self.show_info);
        }

        if let Some((lat, lon)) = self.locate.ui(ctx) {
            self.map_view.center_on(lat, lon);
        }
    }
}

impl Drop for HagelApp {
    fn drop(&mut self) {
        self.config.default_zoom = self.map_view.zoom();
        if let Err(e) = self.config.save() {
            warn!("Failed to save config: {}", e);
        }
    }
}
