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

//! About window with credits, disclaimer, and data sources.

use egui::Align2;

pub fn show(ctx: &egui::Context, open: &mut bool) {
    egui::Window::new("hagelradar.be")
        .open(open)
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.set_max_width(340.0);

            ui.hyperlink_to("PieterPrvst", "https://twitter.com/PieterPrvst");

            ui.add_space(8.0);
            ui.label(
                "hagelradar.be kan in geen geval aansprakelijk gesteld worden voor \
                 eventuele schade en rechtstreekse of onrechtstreekse gevolgen die uit \
                 het gebruik van de aangeboden informatie zou kunnen voortvloeien.",
            );

            ui.add_space(8.0);
            ui.horizontal_wrapped(|ui| {
                ui.spacing_mut().item_spacing.x = 0.0;
                ui.label("Data van ");
                ui.hyperlink_to("KMI", "https://www.meteo.be/");
                ui.label(" en ");
                ui.hyperlink_to("KNMI", "https://www.knmi.nl/");
                ui.label(".");
            });
        });
}
