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

//! Published overlay state.
//!
//! Each successful poll replaces the whole snapshot: the ordered probability
//! layers, their short time labels, the last-updated line, and the
//! observation collection, under a version counter that tells views to
//! rebuild their layer groups instead of patching them. Readers share the
//! snapshot through an `Arc`, so a frame always sees one consistent poll
//! result.

use std::sync::Arc;

use crate::feed::Snapshot;
use crate::timestamp;

pub use crate::feed::{FeatureCollection, ProbabilityMap};

/// Layer colors from oldest to newest; the newest layer draws darkest.
pub const PALETTE: [(u8, u8, u8); 9] = [
    (0xff, 0xf7, 0xf3),
    (0xfd, 0xe0, 0xdd),
    (0xfc, 0xc5, 0xc0),
    (0xfa, 0x9f, 0xb5),
    (0xf7, 0x68, 0xa1),
    (0xdd, 0x34, 0x97),
    (0xae, 0x01, 0x7e),
    (0x7a, 0x01, 0x77),
    (0x49, 0x00, 0x6a),
];

/// Ring color of observation markers and their legend row.
pub const OBSERVATION_COLOR: (u8, u8, u8) = (0xfc, 0xad, 0x03);

/// One complete poll result as the views consume it.
///
/// `labels` lines up one to one with `maps`; `version` is 0 only for the
/// initial empty snapshot published before the first poll lands.
#[derive(Debug, Clone, Default)]
pub struct OverlaySnapshot {
    /// Probability layers, oldest first.
    pub maps: Vec<ProbabilityMap>,
    /// Short time label per layer, same order as `maps`.
    pub labels: Vec<String>,
    /// Long-format time of the newest layer, empty when there are no layers.
    pub last_updated: String,
    pub observations: FeatureCollection,
    pub version: u64,
}

/// Holder of the current snapshot, written by the poll loop and read by the
/// views.
#[derive(Debug, Default)]
pub struct OverlayState {
    current: Arc<OverlaySnapshot>,
    version: u64,
    last_seq: Option<u64>,
}

impl OverlayState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the snapshot decoded by poll `seq`.
    ///
    /// Builds the label set and last-updated line, bumps the version, and
    /// swaps the snapshot in wholesale. Returns false and leaves the state
    /// untouched when a poll with a higher sequence number already
    /// published, so a slow stale response never wins over a newer one.
    pub fn apply(&mut self, seq: u64, snapshot: Snapshot) -> bool {
        if let Some(last) = self.last_seq {
            if seq <= last {
                return false;
            }
        }
        self.last_seq = Some(seq);
        self.version += 1;

        let labels = snapshot
            .maps
            .iter()
            .map(|map| timestamp::format_short(map.instant))
            .collect();
        let last_updated = snapshot
            .maps
            .last()
            .map(|map| timestamp::format_long(map.instant))
            .unwrap_or_default();

        self.current = Arc::new(OverlaySnapshot {
            maps: snapshot.maps,
            labels,
            last_updated,
            observations: snapshot.observations,
            version: self.version,
        });
        true
    }

    /// The current snapshot; clone of an `Arc`, cheap to take per frame.
    #[must_use]
    pub fn snapshot(&self) -> Arc<OverlaySnapshot> {
        Arc::clone(&self.current)
    }
}

/// Fill color for the probability layer at `index`, oldest first.
///
/// Indexes past the palette clamp to the newest color; the feed decoder
/// already bounds layer counts to the palette length.
#[must_use]
pub fn layer_color(index: usize) -> (u8, u8, u8) {
    PALETTE[index.min(PALETTE.len() - 1)]
}

/// Legend rows for a snapshot: the newest palette colors paired with the
/// layer labels, oldest label first.
///
/// With fewer layers than palette entries the lightest colors drop out, so
/// the legend always ends on the darkest, most recent color.
#[must_use]
pub fn visible_entries(snapshot: &OverlaySnapshot) -> Vec<((u8, u8, u8), &str)> {
    let n = snapshot.labels.len().min(PALETTE.len());
    PALETTE[PALETTE.len() - n..]
        .iter()
        .copied()
        .zip(snapshot.labels.iter().map(String::as_str))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{Snapshot, MAX_LAYERS};

    fn snapshot_with_tokens(tokens: &[&str]) -> Snapshot {
        Snapshot {
            maps: tokens
                .iter()
                .map(|token| ProbabilityMap {
                    timestamp: (*token).to_string(),
                    instant: timestamp::parse(token).unwrap(),
                    geo: FeatureCollection::default(),
                })
                .collect(),
            observations: FeatureCollection::default(),
        }
    }

    #[test]
    fn test_palette_matches_layer_limit() {
        assert_eq!(PALETTE.len(), MAX_LAYERS);
    }

    #[test]
    fn test_apply_builds_aligned_labels() {
        let mut state = OverlayState::new();
        assert!(state.apply(
            1,
            snapshot_with_tokens(&[
                "radar_202403151410",
                "radar_202403151420",
                "radar_202403151430",
            ])
        ));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.maps.len(), snapshot.labels.len());
        assert_eq!(snapshot.labels, vec!["14:10", "14:20", "14:30"]);
    }

    #[test]
    fn test_apply_last_updated_from_newest_layer() {
        let mut state = OverlayState::new();
        state.apply(
            1,
            snapshot_with_tokens(&["radar_202403151420", "radar_202403151430"]),
        );
        assert_eq!(state.snapshot().last_updated, "vrijdag 15/3 14:30");
    }

    #[test]
    fn test_apply_empty_snapshot() {
        let mut state = OverlayState::new();
        assert!(state.apply(1, snapshot_with_tokens(&[])));
        let snapshot = state.snapshot();
        assert!(snapshot.maps.is_empty());
        assert!(snapshot.labels.is_empty());
        assert_eq!(snapshot.last_updated, "");
        assert_eq!(snapshot.version, 1);
    }

    #[test]
    fn test_apply_increments_version() {
        let mut state = OverlayState::new();
        assert_eq!(state.snapshot().version, 0);
        state.apply(1, snapshot_with_tokens(&["radar_202403151420"]));
        assert_eq!(state.snapshot().version, 1);
        state.apply(2, snapshot_with_tokens(&["radar_202403151430"]));
        assert_eq!(state.snapshot().version, 2);
    }

    #[test]
    fn test_apply_discards_stale_sequence() {
        let mut state = OverlayState::new();
        // Poll 2 resolved before the slower poll 1
        assert!(state.apply(2, snapshot_with_tokens(&["radar_202403151430"])));
        assert!(!state.apply(1, snapshot_with_tokens(&["radar_202403151420"])));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.last_updated, "vrijdag 15/3 14:30");
        assert_eq!(snapshot.version, 1);
    }

    #[test]
    fn test_apply_discards_duplicate_sequence() {
        let mut state = OverlayState::new();
        assert!(state.apply(1, snapshot_with_tokens(&["radar_202403151420"])));
        assert!(!state.apply(1, snapshot_with_tokens(&["radar_202403151430"])));
        assert_eq!(state.snapshot().version, 1);
    }

    #[test]
    fn test_rejected_poll_keeps_prior_snapshot() {
        let mut state = OverlayState::new();
        state.apply(1, snapshot_with_tokens(&["radar_202403151420"]));

        // The next poll carries one undecodable timestamp, so the whole
        // document is rejected and nothing reaches apply
        let body = r#"{ "maps": [
            { "timestamp": "radar_202403151430", "geo": { "type": "FeatureCollection", "features": [] } },
            { "timestamp": "radar_202403151440", "geo": { "type": "FeatureCollection", "features": [] } },
            { "timestamp": "radar_latest", "geo": { "type": "FeatureCollection", "features": [] } } ] }"#;
        assert!(crate::feed::decode_snapshot(body).is_err());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.labels, vec!["14:20"]);
        assert_eq!(snapshot.last_updated, "vrijdag 15/3 14:20");
    }

    #[test]
    fn test_layer_color_is_positional() {
        assert_eq!(layer_color(0), PALETTE[0]);
        assert_eq!(layer_color(8), PALETTE[8]);
    }

    #[test]
    fn test_layer_color_clamps_past_palette() {
        assert_eq!(layer_color(12), PALETTE[8]);
    }

    #[test]
    fn test_visible_entries_back_slices_palette() {
        let mut state = OverlayState::new();
        state.apply(
            1,
            snapshot_with_tokens(&[
                "radar_202403151410",
                "radar_202403151420",
                "radar_202403151430",
            ]),
        );
        let snapshot = state.snapshot();
        let entries = visible_entries(&snapshot);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (PALETTE[6], "14:10"));
        assert_eq!(entries[1], (PALETTE[7], "14:20"));
        assert_eq!(entries[2], (PALETTE[8], "14:30"));
    }

    #[test]
    fn test_visible_entries_with_full_palette() {
        let tokens: Vec<String> = (0..9)
            .map(|i| format!("radar_2024031514{:02}", i))
            .collect();
        let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let mut state = OverlayState::new();
        state.apply(1, snapshot_with_tokens(&token_refs));
        let snapshot = state.snapshot();
        let entries = visible_entries(&snapshot);
        assert_eq!(entries.len(), 9);
        assert_eq!(entries[0].0, PALETTE[0]);
        assert_eq!(entries[8].0, PALETTE[8]);
    }

    #[test]
    fn test_layer_fill_and_legend_colors_for_partial_set() {
        // With three layers the fills use the light end of the palette while
        // the legend shows the dark end; this mirrors the site as deployed.
        let mut state = OverlayState::new();
        state.apply(
            1,
            snapshot_with_tokens(&[
                "radar_202403151410",
                "radar_202403151420",
                "radar_202403151430",
            ]),
        );
        let snapshot = state.snapshot();
        assert_eq!(layer_color(0), PALETTE[0]);
        assert_eq!(visible_entries(&snapshot)[0].0, PALETTE[6]);
    }

    #[test]
    fn test_visible_entries_empty_snapshot() {
        let snapshot = OverlaySnapshot::default();
        assert!(visible_entries(&snapshot).is_empty());
    }
}
