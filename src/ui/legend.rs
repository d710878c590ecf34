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

//! Map legend showing the hail probability colors and the observation marker.
//!
//! The legend is rebuilt from the current overlay snapshot every frame, so it
//! always matches the layers actually on screen.

use egui::{Align2, Color32, CornerRadius, RichText, Sense, Stroke};
use hagel_client::{OverlaySnapshot, OBSERVATION_COLOR};

/// Floating legend panel anchored to the top-right of the map.
#[derive(Debug)]
pub struct LegendControl<'a> {
    entries: Vec<((u8, u8, u8), &'a str)>,
}

impl<'a> LegendControl<'a> {
    #[must_use]
    pub fn new(snapshot: &'a OverlaySnapshot) -> Self {
        Self {
            entries: hagel_client::visible_entries(snapshot),
        }
    }

    pub fn show(&self, ctx: &egui::Context) {
        egui::Window::new("legend")
            .anchor(Align2::RIGHT_TOP, egui::vec2(-10.0, 46.0))
            .title_bar(false)
            .resizable(false)
            .interactable(false)
            .show(ctx, |ui| {
                ui.label(RichText::new("kans op hagel").strong());

                for ((r, g, b), label) in &self.entries {
                    ui.horizontal(|ui| {
                        let (rect, _) = ui
                            .allocate_exact_size(egui::vec2(18.0, 12.0), Sense::hover());
                        ui.painter().rect_filled(
                            rect,
                            CornerRadius::same(2),
                            Color32::from_rgb(*r, *g, *b),
                        );
                        ui.label(*label);
                    });
                }

                ui.horizontal(|ui| {
                    let (rect, _) =
                        ui.allocate_exact_size(egui::vec2(18.0, 12.0), Sense::hover());
                    let (r, g, b) = OBSERVATION_COLOR;
                    ui.painter().circle_stroke(
                        rect.center(),
                        5.0,
                        Stroke::new(2.0, Color32::from_rgb(r, g, b)),
                    );
                    ui.label("melding");
                });
            });
    }
}
