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

//! Carto basemap tiles with an on-disk cache.
//!
//! Tiles download on worker threads and land in the user cache directory;
//! cached files older than a week are swept at startup.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use egui::{ColorImage, TextureHandle};
use log::{debug, error, warn};
use sha2::{Digest, Sha256};

pub const TILE_SIZE: u32 = 256;
const CACHE_DURATION_DAYS: u64 = 7;

/// Attribution line for the basemap, drawn on the map surface.
pub const ATTRIBUTION: &str = "© OpenStreetMap contributors";

/// Web Mercator projection utilities
#[derive(Debug)]
pub struct WebMercator;

impl WebMercator {
    /// Convert latitude to a fractional tile Y coordinate at `zoom`
    #[must_use]
    pub fn lat_to_y(lat: f64, zoom: u8) -> f64 {
        let lat_rad = lat.to_radians();
        let n = 2_f64.powi(i32::from(zoom));
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * n
    }

    /// Convert longitude to a fractional tile X coordinate at `zoom`
    #[must_use]
    pub fn lon_to_x(lon: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        ((lon + 180.0) / 360.0) * n
    }

    /// Convert a fractional tile Y coordinate back to latitude
    #[must_use]
    pub fn tile_to_lat(y: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        let lat_rad = ((std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh()).atan();
        lat_rad.to_degrees()
    }

    /// Convert a fractional tile X coordinate back to longitude
    #[must_use]
    pub fn tile_to_lon(x: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        x / n * 360.0 - 180.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    #[must_use]
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Get the tile URL from Carto CDN
    #[must_use]
    pub fn url(&self) -> String {
        let subdomain = ['a', 'b', 'c', 'd'][((self.x + self.y) % 4) as usize];
        format!(
            "https://{}.basemaps.cartocdn.com/light_all/{}/{}/{}.png",
            subdomain, self.zoom, self.x, self.y
        )
    }

    /// Get cache filename based on hash of URL
    fn cache_filename(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url().as_bytes());
        let hash = hasher.finalize();
        format!("{:x}", hash)
    }
}

enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

/// Loads, caches, and hands out basemap tile textures.
pub struct TileManager {
    cache_dir: PathBuf,
    tiles: Arc<Mutex<HashMap<TileCoord, TileState>>>,
    download_queue: Arc<Mutex<Vec<TileCoord>>>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl Default for TileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TileManager {
    #[must_use]
    pub fn new() -> Self {
        let cache_dir = Self::get_cache_dir();

        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create tile cache directory: {}", e);
        }

        Self::cleanup_old_tiles(&cache_dir);

        Self {
            cache_dir,
            tiles: Arc::new(Mutex::new(HashMap::new())),
            download_queue: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn get_cache_dir() -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        path.push("hagelradar-desktop");
        path.push("tiles");
        path
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);

        if let Ok(entries) = fs::read_dir(cache_dir) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    if let Ok(modified) = metadata.modified() {
                        if let Ok(age) = now.duration_since(modified) {
                            if age > max_age {
                                let _ = fs::remove_file(entry.path());
                                debug!("Removed old tile cache entry: {:?}", entry.path());
                            }
                        }
                    }
                }
            }
        }
    }

    /// Get tile from cache or queue for download
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        let mut tiles = self.tiles.lock().unwrap();

        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => None,
            None => {
                let cache_path = self.cache_dir.join(format!("{}.png", coord.cache_filename()));

                if cache_path.exists() {
                    match load_tile_from_disk(&cache_path, ctx, coord) {
                        Ok(texture) => {
                            tiles.insert(coord, TileState::Loaded(texture.clone()));
                            Some(texture)
                        }
                        Err(e) => {
                            warn!("Failed to load cached tile: {}", e);
                            tiles.insert(coord, TileState::Loading);
                            self.queue_download(coord, ctx.clone());
                            None
                        }
                    }
                } else {
                    tiles.insert(coord, TileState::Loading);
                    self.queue_download(coord, ctx.clone());
                    None
                }
            }
        }
    }

    fn queue_download(&self, coord: TileCoord, ctx: egui::Context) {
        let mut queue = self.download_queue.lock().unwrap();
        if !queue.contains(&coord) {
            queue.push(coord);

            let tiles = self.tiles.clone();
            let cache_dir = self.cache_dir.clone();

            std::thread::spawn(move || {
                download_tile(coord, &tiles, &cache_dir, &ctx);
            });
        }
    }

    /// Get all tiles needed for a viewport, with their pixel offsets from
    /// the viewport center
    pub fn get_visible_tiles(
        &self,
        center_lat: f64,
        center_lon: f64,
        zoom: u8,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Vec<(TileCoord, f32, f32)> {
        let mut tiles = Vec::new();

        let center_tile_x = WebMercator::lon_to_x(center_lon, zoom);
        let center_tile_y = WebMercator::lat_to_y(center_lat, zoom);

        let tiles_wide = (viewport_width / TILE_SIZE as f32).ceil() as i32 + 2;
        let tiles_high = (viewport_height / TILE_SIZE as f32).ceil() as i32 + 2;

        let start_x = center_tile_x.floor() as i32 - tiles_wide / 2;
        let start_y = center_tile_y.floor() as i32 - tiles_high / 2;

        let max_tile = 2_i32.pow(u32::from(zoom));

        for dy in 0..tiles_high {
            for dx in 0..tiles_wide {
                let tile_x = start_x + dx;
                let tile_y = start_y + dy;

                // Longitude wraps, latitude does not
                let wrapped_x = ((tile_x % max_tile) + max_tile) % max_tile;

                if tile_y >= 0 && tile_y < max_tile {
                    let coord = TileCoord::new(wrapped_x as u32, tile_y as u32, zoom);

                    let offset_x = (f64::from(tile_x) - center_tile_x) * f64::from(TILE_SIZE);
                    let offset_y = (f64::from(tile_y) - center_tile_y) * f64::from(TILE_SIZE);

                    tiles.push((coord, offset_x as f32, offset_y as f32));
                }
            }
        }

        tiles
    }

    pub fn has_loading_tiles(&self) -> bool {
        let tiles = self.tiles.lock().unwrap();
        tiles.values().any(|state| matches!(state, TileState::Loading))
    }

    pub fn get_error_count(&self) -> usize {
        let tiles = self.tiles.lock().unwrap();
        tiles.values().filter(|state| matches!(state, TileState::Failed)).count()
    }
}

fn load_tile_from_disk(
    path: &Path,
    ctx: &egui::Context,
    coord: TileCoord,
) -> Result<TextureHandle, String> {
    let img_data = fs::read(path).map_err(|e| e.to_string())?;
    texture_from_png(&img_data, ctx, coord).map_err(|e| e.to_string())
}

fn texture_from_png(
    bytes: &[u8],
    ctx: &egui::Context,
    coord: TileCoord,
) -> Result<TextureHandle, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = ColorImage::from_rgba_unmultiplied(size, &rgba.into_raw());

    Ok(ctx.load_texture(
        format!("tile_{}_{}_{}", coord.zoom, coord.x, coord.y),
        color_image,
        Default::default(),
    ))
}

fn download_tile(
    coord: TileCoord,
    tiles: &Arc<Mutex<HashMap<TileCoord, TileState>>>,
    cache_dir: &Path,
    ctx: &egui::Context,
) {
    let url = coord.url();
    debug!("Downloading tile: {}", url);

    let result = reqwest::blocking::get(&url)
        .map_err(|e| format!("fetch failed: {}", e))
        .and_then(|response| {
            if response.status().is_success() {
                response.bytes().map_err(|e| format!("read failed: {}", e))
            } else {
                Err(format!("HTTP {}", response.status()))
            }
        });

    match result {
        Ok(bytes) => {
            let cache_path = cache_dir.join(format!("{}.png", coord.cache_filename()));
            if let Err(e) = fs::write(&cache_path, &bytes) {
                warn!("Failed to save tile to cache: {}", e);
            }

            match texture_from_png(&bytes, ctx, coord) {
                Ok(texture) => {
                    let mut tiles_lock = tiles.lock().unwrap();
                    tiles_lock.insert(coord, TileState::Loaded(texture));
                    ctx.request_repaint();
                }
                Err(e) => {
                    error!("Failed to decode tile image: {}", e);
                    let mut tiles_lock = tiles.lock().unwrap();
                    tiles_lock.insert(coord, TileState::Failed);
                }
            }
        }
        Err(e) => {
            error!("Failed to download tile {}: {}", url, e);
            let mut tiles_lock = tiles.lock().unwrap();
            tiles_lock.insert(coord, TileState::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_roundtrip() {
        let lat = 50.3;
        let lon = 4.5;
        let zoom = 8;
        let x = WebMercator::lon_to_x(lon, zoom);
        let y = WebMercator::lat_to_y(lat, zoom);
        assert!((WebMercator::tile_to_lon(x, zoom) - lon).abs() < 1e-9);
        assert!((WebMercator::tile_to_lat(y, zoom) - lat).abs() < 1e-9);
    }

    #[test]
    fn test_tile_url_subdomain_balancing() {
        let a = TileCoord::new(0, 0, 8);
        let b = TileCoord::new(1, 0, 8);
        assert!(a.url().starts_with("https://a.basemaps.cartocdn.com/light_all/8/"));
        assert!(b.url().starts_with("https://b.basemaps.cartocdn.com/light_all/8/"));
    }

    #[test]
    fn test_visible_tiles_cover_viewport() {
        let manager = TileManager {
            cache_dir: PathBuf::new(),
            tiles: Arc::new(Mutex::new(HashMap::new())),
            download_queue: Arc::new(Mutex::new(Vec::new())),
        };
        let tiles = manager.get_visible_tiles(50.3, 4.5, 8, 800.0, 600.0);
        // Enough tiles for an 800x600 viewport plus overscan
        assert!(tiles.len() >= 12);
        assert!(tiles.iter().all(|(coord, _, _)| coord.zoom == 8));
    }
}
