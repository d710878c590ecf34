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

//! Interactive map: basemap tiles, hail probability polygons, observation
//! markers, and click popups, all drawn on a single painter.

use egui::epaint::{Mesh, Vertex, WHITE_UV};
use egui::{Align2, Color32, CornerRadius, FontId, Pos2, Sense, Stroke};
use hagel_client::{
    layer_color, probability_percent, OverlaySnapshot, PollStatus, OBSERVATION_COLOR,
};
use log::debug;

use crate::map::{TileManager, WebMercator, ATTRIBUTION, TILE_SIZE};

/// Startup map center, roughly the middle of Belgium.
pub const INITIAL_CENTER: (f64, f64) = (50.3, 4.5);

pub const MIN_ZOOM: f32 = 5.0;
pub const MAX_ZOOM: f32 = 12.0;

const MARKER_RADIUS: f32 = 10.0;
const MARKER_HIT_RADIUS: f32 = 12.0;

/// A popup opened by clicking the map. Anchored to a geographic position so
/// it stays with the map while panning and zooming.
#[derive(Debug)]
enum Popup {
    Probability {
        lat: f64,
        lon: f64,
        percent: u8,
    },
    Observation {
        lat: f64,
        lon: f64,
        timestamp: String,
        description: String,
    },
}

struct MarkerHit {
    pos: Pos2,
    lat: f64,
    lon: f64,
    timestamp: String,
    description: String,
}

#[derive(Debug)]
pub struct MapView {
    center_lat: f64,
    center_lon: f64,
    zoom: f32, // Float for smoother pinch-zoom
    popup: Option<Popup>,
    seen_version: u64,
    dismissed_notice: Option<String>,
}

impl MapView {
    #[must_use]
    pub fn new(center: (f64, f64), zoom: f32) -> Self {
        Self {
            center_lat: center.0,
            center_lon: center.1,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            popup: None,
            seen_version: 0,
            dismissed_notice: None,
        }
    }

    /// Layer groups are rebuilt for every snapshot version; a popup bound to
    /// the old layers closes with them.
    fn sync_version(&mut self, version: u64) {
        if version != self.seen_version {
            self.seen_version = version;
            self.popup = None;
        }
    }

    /// Re-center the map, keeping the current zoom level.
    pub fn center_on(&mut self, lat: f64, lon: f64) {
        debug!("Centering map on {:.4}, {:.4}", lat, lon);
        self.center_lat = lat.clamp(-85.0, 85.0);
        self.center_lon = lon;
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[allow(clippy::too_many_lines, reason = "single painter pass over the map")]
    pub fn ui(
        &mut self,
        ui: &mut egui::Ui,
        snapshot: &OverlaySnapshot,
        tiles: &TileManager,
        show_observations: bool,
        overlay_opacity: f32,
        poll_status: &PollStatus,
    ) {
        self.sync_version(snapshot.version);

        let (response, painter) =
            ui.allocate_painter(ui.available_size(), Sense::click_and_drag());

        let rect = response.rect;
        let center = rect.center();

        // Draw background
        painter.rect_filled(rect, CornerRadius::ZERO, Color32::from_rgb(221, 221, 221));

        // Handle pinch-zoom and scroll-wheel zoom
        if response.hovered() {
            let (zoom_delta, scroll_y) = ui
                .ctx()
                .input(|i| (i.zoom_delta(), i.smooth_scroll_delta.y));

            let mut zoom_change = 0.0;
            if (zoom_delta - 1.0).abs() > 0.001 {
                // zoom_delta > 1.0 means zoom in, < 1.0 means zoom out
                zoom_change += zoom_delta.log2();
            }
            zoom_change += scroll_y * 0.002;

            if zoom_change != 0.0 {
                self.zoom = (self.zoom + zoom_change).clamp(MIN_ZOOM, MAX_ZOOM);
            }
        }

        let tile_pixel_size = TILE_SIZE as f32;

        // Round zoom level for tile fetching
        let tile_zoom = self.zoom.round() as u8;

        // Render map tiles
        let visible_tiles = tiles.get_visible_tiles(
            self.center_lat,
            self.center_lon,
            tile_zoom,
            rect.width(),
            rect.height(),
        );

        for (coord, offset_x, offset_y) in visible_tiles {
            if let Some(texture) = tiles.get_tile(coord, ui.ctx()) {
                let tile_pos = egui::pos2(center.x + offset_x, center.y + offset_y);
                let tile_rect = egui::Rect::from_min_size(
                    tile_pos,
                    egui::vec2(tile_pixel_size, tile_pixel_size),
                );

                painter.image(
                    texture.id(),
                    tile_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
        }

        // Handle dragging with Web Mercator
        if response.dragged() {
            let delta = response.drag_delta();

            // Convert pixel movement to lat/lon change at current zoom
            let scale = 2.0_f64.powf(f64::from(self.zoom));
            let lat_per_pixel = 180.0 / (f64::from(tile_pixel_size) * scale);
            let lon_per_pixel = 360.0 / (f64::from(tile_pixel_size) * scale);

            let cos_lat = self.center_lat.to_radians().cos();

            self.center_lat += f64::from(delta.y) * lat_per_pixel;
            self.center_lon -= f64::from(delta.x) * lon_per_pixel / cos_lat.max(0.1);

            // Clamp latitude to valid range
            self.center_lat = self.center_lat.clamp(-85.0, 85.0);
        }

        // Convert lat/lon to screen coordinates using Web Mercator
        let center_lat = self.center_lat;
        let center_lon = self.center_lon;
        let to_screen = move |lat: f64, lon: f64| -> Pos2 {
            let tile_x = WebMercator::lon_to_x(lon, tile_zoom);
            let tile_y = WebMercator::lat_to_y(lat, tile_zoom);

            let center_tile_x = WebMercator::lon_to_x(center_lon, tile_zoom);
            let center_tile_y = WebMercator::lat_to_y(center_lat, tile_zoom);

            let pixel_x = (tile_x - center_tile_x) * f64::from(tile_pixel_size);
            let pixel_y = (tile_y - center_tile_y) * f64::from(tile_pixel_size);

            egui::pos2(center.x + pixel_x as f32, center.y + pixel_y as f32)
        };
        let from_screen = move |pos: Pos2| -> (f64, f64) {
            let center_tile_x = WebMercator::lon_to_x(center_lon, tile_zoom);
            let center_tile_y = WebMercator::lat_to_y(center_lat, tile_zoom);

            let tile_x = center_tile_x + f64::from(pos.x - center.x) / f64::from(tile_pixel_size);
            let tile_y = center_tile_y + f64::from(pos.y - center.y) / f64::from(tile_pixel_size);

            (
                WebMercator::tile_to_lat(tile_y, tile_zoom),
                WebMercator::tile_to_lon(tile_x, tile_zoom),
            )
        };

        // Probability layers, oldest first so the newest paints on top. All
        // rings go into one mesh; they are triangulated because radar
        // contours are usually concave.
        let fill_alpha = (overlay_opacity.clamp(0.0, 1.0) * 255.0) as u8;
        let mut overlay_mesh = Mesh::default();
        let mut hit_polygons: Vec<(Vec<Pos2>, u8)> = Vec::new();

        for (index, map) in snapshot.maps.iter().enumerate() {
            let (r, g, b) = layer_color(index);
            let fill = Color32::from_rgba_unmultiplied(r, g, b, fill_alpha);

            for feature in &map.geo.features {
                let Some(value) = feature.properties.value else {
                    continue;
                };

                for ring in feature.geometry.outer_rings() {
                    let mut points: Vec<Pos2> = ring
                        .iter()
                        .map(|&[lon, lat]| to_screen(lat, lon))
                        .collect();
                    // GeoJSON rings repeat the first coordinate at the end
                    if points.len() > 1 && points.first() == points.last() {
                        points.pop();
                    }
                    if points.len() < 3 {
                        continue;
                    }

                    let mut bounds = egui::Rect::NOTHING;
                    for point in &points {
                        bounds.extend_with(*point);
                    }
                    if !rect.intersects(bounds) {
                        continue;
                    }

                    let base = overlay_mesh.vertices.len() as u32;
                    overlay_mesh
                        .vertices
                        .extend(points.iter().map(|&pos| Vertex {
                            pos,
                            uv: WHITE_UV,
                            color: fill,
                        }));
                    for [i0, i1, i2] in triangulate_ring(&points) {
                        overlay_mesh
                            .indices
                            .extend_from_slice(&[base + i0, base + i1, base + i2]);
                    }
                    hit_polygons.push((points, value));
                }
            }
        }

        if !overlay_mesh.indices.is_empty() {
            painter.add(egui::Shape::mesh(overlay_mesh));
        }

        // Ground observation markers
        let mut hit_markers: Vec<MarkerHit> = Vec::new();
        if show_observations {
            let (r, g, b) = OBSERVATION_COLOR;
            let ring_color = Color32::from_rgba_unmultiplied(r, g, b, 128);

            for feature in &snapshot.observations.features {
                let Some([lon, lat]) = feature.geometry.point() else {
                    continue;
                };

                let pos = to_screen(lat, lon);
                if !rect.contains(pos) {
                    continue;
                }

                painter.circle_stroke(pos, MARKER_RADIUS, Stroke::new(2.0, ring_color));
                hit_markers.push(MarkerHit {
                    pos,
                    lat,
                    lon,
                    timestamp: feature.properties.timestamp.clone().unwrap_or_default(),
                    description: feature
                        .properties
                        .obs_intensity_description
                        .clone()
                        .unwrap_or_default(),
                });
            }
        }

        // Attribution (required by Carto)
        painter.text(
            rect.right_bottom() + egui::vec2(-10.0, -10.0),
            Align2::RIGHT_BOTTOM,
            ATTRIBUTION,
            FontId::proportional(10.0),
            Color32::from_black_alpha(180),
        );

        // Status notice at the top, dismissable by clicking it
        let notice: Option<(String, Color32)> = if let PollStatus::Failed(_) = poll_status {
            Some((
                "laatste update mislukt".to_owned(),
                Color32::from_rgb(220, 50, 50),
            ))
        } else if tiles.get_error_count() > 0 {
            Some((
                format!("{} tiles konden niet geladen worden", tiles.get_error_count()),
                Color32::from_rgb(220, 50, 50),
            ))
        } else if tiles.has_loading_tiles() {
            Some(("tiles laden...".to_owned(), Color32::from_rgb(255, 200, 100)))
        } else {
            None
        };

        let mut notice_rect = None;
        match &notice {
            Some((message, bg_color))
                if self.dismissed_notice.as_deref() != Some(message.as_str()) =>
            {
                let notice_pos = rect.center_top() + egui::vec2(0.0, 20.0);
                let galley = painter.layout_no_wrap(
                    message.clone(),
                    FontId::proportional(12.0),
                    Color32::WHITE,
                );

                let padding = egui::vec2(12.0, 6.0);
                let bubble_rect =
                    egui::Rect::from_center_size(notice_pos, galley.size() + padding * 2.0);

                painter.rect_filled(bubble_rect, CornerRadius::same(5), *bg_color);
                painter.text(
                    notice_pos,
                    Align2::CENTER_CENTER,
                    message,
                    FontId::proportional(12.0),
                    Color32::WHITE,
                );
                notice_rect = Some(bubble_rect);
            }
            Some(_) => {}
            None => self.dismissed_notice = None,
        }

        // Click handling: notice first, then markers, then the newest layer
        if response.clicked() {
            if let Some(click) = response.interact_pointer_pos() {
                if notice_rect.is_some_and(|bubble| bubble.contains(click)) {
                    if let Some((message, _)) = notice {
                        self.dismissed_notice = Some(message);
                    }
                } else if let Some(marker) = hit_markers
                    .iter()
                    .filter(|m| m.pos.distance(click) <= MARKER_HIT_RADIUS)
                    .min_by(|a, b| {
                        a.pos.distance(click).total_cmp(&b.pos.distance(click))
                    })
                {
                    self.popup = Some(Popup::Observation {
                        lat: marker.lat,
                        lon: marker.lon,
                        timestamp: marker.timestamp.clone(),
                        description: marker.description.clone(),
                    });
                } else if let Some((_, value)) = hit_polygons
                    .iter()
                    .rev()
                    .find(|(points, _)| point_in_polygon(click, points))
                {
                    let (lat, lon) = from_screen(click);
                    self.popup = Some(Popup::Probability {
                        lat,
                        lon,
                        percent: probability_percent(*value),
                    });
                } else {
                    self.popup = None;
                }
            }
        }

        // Popup, drawn last so it sits on top of everything
        if let Some(popup) = &self.popup {
            let (anchor_lat, anchor_lon, text) = match popup {
                Popup::Probability { lat, lon, percent } => {
                    (*lat, *lon, format!("Kans op hagel: {percent}%"))
                }
                Popup::Observation {
                    lat,
                    lon,
                    timestamp,
                    description,
                } => {
                    let mut lines = Vec::new();
                    if !timestamp.is_empty() {
                        lines.push(timestamp.as_str());
                    }
                    if !description.is_empty() {
                        lines.push(description.as_str());
                    }
                    (*lat, *lon, lines.join("\n"))
                }
            };

            let anchor = to_screen(anchor_lat, anchor_lon);
            if !text.is_empty() && rect.contains(anchor) {
                let text_pos = anchor + egui::vec2(0.0, -14.0);

                // Create a text galley to measure the text size
                let galley = painter.layout_no_wrap(
                    text.clone(),
                    FontId::proportional(12.0),
                    Color32::WHITE,
                );

                let padding = egui::vec2(6.0, 4.0);
                let text_rect = egui::Rect::from_min_size(
                    text_pos - egui::vec2(galley.size().x / 2.0, galley.size().y),
                    galley.size(),
                );

                painter.rect_filled(
                    text_rect.expand2(padding),
                    CornerRadius::same(2),
                    Color32::from_rgba_unmultiplied(0, 0, 0, 180),
                );
                painter.text(
                    text_pos,
                    Align2::CENTER_BOTTOM,
                    text,
                    FontId::proportional(12.0),
                    Color32::WHITE,
                );
            }
        }
    }
}

/// Ear-clipping triangulation of a simple polygon ring, returning index
/// triples into `ring`. Works for the concave outlines radar contours have;
/// self-intersecting input falls back to a fan so this always terminates.
fn triangulate_ring(ring: &[Pos2]) -> Vec<[u32; 3]> {
    if ring.len() < 3 {
        return Vec::new();
    }

    let mut order: Vec<u32> = (0..ring.len() as u32).collect();
    let signed_area: f32 = (0..ring.len())
        .map(|i| {
            let a = ring[i];
            let b = ring[(i + 1) % ring.len()];
            a.x * b.y - b.x * a.y
        })
        .sum();
    if signed_area < 0.0 {
        order.reverse();
    }

    let mut triangles = Vec::with_capacity(ring.len() - 2);
    while order.len() > 3 {
        let m = order.len();
        let mut clipped = false;
        for i in 0..m {
            let prev = order[(i + m - 1) % m];
            let curr = order[i];
            let next = order[(i + 1) % m];
            let (a, b, c) = (
                ring[prev as usize],
                ring[curr as usize],
                ring[next as usize],
            );
            if cross(a, b, c) <= 0.0 {
                // Reflex or collinear corner, not an ear
                continue;
            }
            let blocked = order.iter().any(|&j| {
                if j == prev || j == curr || j == next {
                    return false;
                }
                let p = ring[j as usize];
                // Duplicated coordinates sit on the corner, they block nothing
                if p == a || p == b || p == c {
                    return false;
                }
                point_in_triangle(p, a, b, c)
            });
            if blocked {
                continue;
            }
            triangles.push([prev, curr, next]);
            order.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            // Self-intersecting or collapsed ring; fan the remainder instead
            // of spinning forever
            for w in 1..order.len() - 1 {
                triangles.push([order[0], order[w], order[w + 1]]);
            }
            return triangles;
        }
    }
    triangles.push([order[0], order[1], order[2]]);
    triangles
}

fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn point_in_triangle(p: Pos2, a: Pos2, b: Pos2, c: Pos2) -> bool {
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    (d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0) || (d1 <= 0.0 && d2 <= 0.0 && d3 <= 0.0)
}

/// Even-odd ray cast against a polygon ring in screen space.
fn point_in_polygon(point: Pos2, ring: &[Pos2]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let t = (point.y - a.y) / (b.y - a.y);
            if point.x < a.x + t * (b.x - a.x) {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    fn square() -> Vec<Pos2> {
        vec![
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(0.0, 10.0),
        ]
    }

    /// U-shaped ring; the notch between the arms is outside.
    fn u_shape() -> Vec<Pos2> {
        vec![
            pos2(0.0, 0.0),
            pos2(10.0, 0.0),
            pos2(10.0, 10.0),
            pos2(7.0, 10.0),
            pos2(7.0, 3.0),
            pos2(3.0, 3.0),
            pos2(3.0, 10.0),
            pos2(0.0, 10.0),
        ]
    }

    fn covered(triangles: &[[u32; 3]], ring: &[Pos2], p: Pos2) -> bool {
        triangles.iter().any(|&[a, b, c]| {
            point_in_triangle(p, ring[a as usize], ring[b as usize], ring[c as usize])
        })
    }

    #[test]
    fn test_point_inside_square() {
        assert!(point_in_polygon(pos2(5.0, 5.0), &square()));
    }

    #[test]
    fn test_point_outside_square() {
        assert!(!point_in_polygon(pos2(15.0, 5.0), &square()));
        assert!(!point_in_polygon(pos2(5.0, -1.0), &square()));
    }

    #[test]
    fn test_point_in_concave_notch() {
        let ring = u_shape();
        assert!(!point_in_polygon(pos2(5.0, 8.0), &ring));
        assert!(point_in_polygon(pos2(1.5, 8.0), &ring));
        assert!(point_in_polygon(pos2(5.0, 1.5), &ring));
    }

    #[test]
    fn test_degenerate_ring_never_contains() {
        assert!(!point_in_polygon(pos2(1.0, 1.0), &[]));
        assert!(!point_in_polygon(
            pos2(1.0, 1.0),
            &[pos2(0.0, 0.0), pos2(2.0, 2.0)]
        ));
    }

    #[test]
    fn test_triangulate_square() {
        let ring = square();
        let triangles = triangulate_ring(&ring);
        assert_eq!(triangles.len(), 2);
        assert!(covered(&triangles, &ring, pos2(5.0, 5.0)));
        assert!(!covered(&triangles, &ring, pos2(15.0, 5.0)));
    }

    #[test]
    fn test_triangulate_concave_ring_leaves_notch_open() {
        let ring = u_shape();
        let triangles = triangulate_ring(&ring);
        assert_eq!(triangles.len(), ring.len() - 2);
        // Both arms and the bridge are filled, the notch is not
        assert!(covered(&triangles, &ring, pos2(1.5, 8.0)));
        assert!(covered(&triangles, &ring, pos2(8.5, 8.0)));
        assert!(covered(&triangles, &ring, pos2(5.0, 1.5)));
        assert!(!covered(&triangles, &ring, pos2(5.0, 8.0)));
    }

    #[test]
    fn test_triangulate_clockwise_ring() {
        let mut ring = u_shape();
        ring.reverse();
        let triangles = triangulate_ring(&ring);
        assert_eq!(triangles.len(), ring.len() - 2);
        assert!(covered(&triangles, &ring, pos2(1.5, 8.0)));
        assert!(!covered(&triangles, &ring, pos2(5.0, 8.0)));
    }

    #[test]
    fn test_triangulate_tolerates_closing_duplicate() {
        let mut ring = square();
        ring.push(ring[0]);
        let triangles = triangulate_ring(&ring);
        assert!(covered(&triangles, &ring, pos2(5.0, 5.0)));
        assert!(!covered(&triangles, &ring, pos2(15.0, 5.0)));
    }

    #[test]
    fn test_triangulate_degenerate_ring() {
        assert!(triangulate_ring(&[]).is_empty());
        assert!(triangulate_ring(&[pos2(0.0, 0.0), pos2(2.0, 2.0)]).is_empty());
    }

    #[test]
    fn test_popup_closes_when_snapshot_version_changes() {
        let mut view = MapView::new(INITIAL_CENTER, 8.0);
        view.sync_version(1);
        view.popup = Some(Popup::Probability {
            lat: 50.3,
            lon: 4.5,
            percent: 40,
        });

        // Same version keeps the popup, a new one closes it
        view.sync_version(1);
        assert!(view.popup.is_some());
        view.sync_version(2);
        assert!(view.popup.is_none());
    }

    #[test]
    fn test_new_clamps_zoom_to_range() {
        let view = MapView::new(INITIAL_CENTER, 99.0);
        assert!((view.zoom() - MAX_ZOOM).abs() < f32::EPSILON);

        let view = MapView::new(INITIAL_CENTER, 1.0);
        assert!((view.zoom() - MIN_ZOOM).abs() < f32::EPSILON);
    }

    #[test]
    fn test_center_on_keeps_zoom() {
        let mut view = MapView::new(INITIAL_CENTER, 8.0);
        view.center_on(51.0, 3.7);
        assert!((view.zoom() - 8.0).abs() < f32::EPSILON);
        assert!((view.center_lat - 51.0).abs() < f64::EPSILON);
        assert!((view.center_lon - 3.7).abs() < f64::EPSILON);
    }
}
