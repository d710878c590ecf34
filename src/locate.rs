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

//! "Go to my location" control backed by IP geolocation.
//!
//! Lookups go through ipapi.co with ip-api.com as fallback; neither needs an
//! API key. The request runs on a worker thread so the UI stays responsive.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use egui::Align2;
use log::{info, warn};

#[derive(Debug)]
pub struct LocateControl {
    result: Arc<Mutex<Option<(f64, f64)>>>,
    busy: Arc<Mutex<bool>>,
}

impl Default for LocateControl {
    fn default() -> Self {
        Self::new()
    }
}

impl LocateControl {
    #[must_use]
    pub fn new() -> Self {
        Self {
            result: Arc::new(Mutex::new(None)),
            busy: Arc::new(Mutex::new(false)),
        }
    }

    /// Draw the control and hand back a fix once a lookup completes.
    pub fn ui(&mut self, ctx: &egui::Context) -> Option<(f64, f64)> {
        let busy = *self.busy.lock().unwrap();

        egui::Window::new("locate")
            .anchor(Align2::LEFT_TOP, egui::vec2(10.0, 46.0))
            .title_bar(false)
            .resizable(false)
            .show(ctx, |ui| {
                if ui
                    .add_enabled(!busy, egui::Button::new("◎"))
                    .on_hover_text("Ga naar mijn locatie")
                    .clicked()
                {
                    self.request(ctx.clone());
                }
            });

        self.result.lock().unwrap().take()
    }

    fn request(&self, ctx: egui::Context) {
        *self.busy.lock().unwrap() = true;

        let result = self.result.clone();
        let busy = self.busy.clone();

        std::thread::spawn(move || {
            let fix = fetch_ip_location();
            *result.lock().unwrap() = fix;
            *busy.lock().unwrap() = false;
            ctx.request_repaint();
        });
    }
}

/// IP-based geolocation: try ipapi.co first, fall back to ip-api.com.
fn fetch_ip_location() -> Option<(f64, f64)> {
    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build geolocation client: {}", e);
            return None;
        }
    };

    if let Some(fix) = query_geo_service(&client, "https://ipapi.co/json/", "latitude", "longitude")
    {
        return Some(fix);
    }

    // ip-api.com keeps the free tier on plain http and uses short key names
    if let Some(fix) = query_geo_service(&client, "http://ip-api.com/json/", "lat", "lon") {
        return Some(fix);
    }

    warn!("Failed to fetch location from all sources");
    None
}

fn query_geo_service(
    client: &reqwest::blocking::Client,
    url: &str,
    lat_key: &str,
    lon_key: &str,
) -> Option<(f64, f64)> {
    let text = client.get(url).send().ok()?.text().ok()?;
    let value: serde_json::Value = serde_json::from_str(&text).ok()?;

    let lat = value.get(lat_key).and_then(serde_json::Value::as_f64)?;
    let lon = value.get(lon_key).and_then(serde_json::Value::as_f64)?;

    info!("Location found via {}: {}, {}", url, lat, lon);
    Some((lat, lon))
}
