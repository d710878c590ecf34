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

//! Feed document model and decoder.
//!
//! The remote feed is a single JSON document:
//!
//! ```text
//! { "maps": [ { "timestamp": "<token>", "geo": <FeatureCollection> }, ... ],
//!   "observations"?: <FeatureCollection>,
//!   "alerts"?: <FeatureCollection> }
//! ```
//!
//! Decoding is all-or-nothing: any bad timestamp, out-of-range probability
//! value, or shape mismatch rejects the whole document so a partial layer
//! set is never published. Observation markers arrive under `observations`
//! or, on older documents, `alerts`; the decoder resolves that to one
//! canonical collection so nothing downstream has to branch on it.

use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;
use thiserror::Error;

use crate::timestamp::{self, TimestampError};

/// Where the snapshot document lives.
pub const FEED_URL: &str = "https://hagelradar.s3.eu-central-1.amazonaws.com/output.json";

/// Upper bound on probability layers per snapshot, matching the palette.
pub const MAX_LAYERS: usize = 9;

/// Errors from fetching or decoding the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("feed returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed feed: {0}")]
    Malformed(String),

    #[error("malformed feed timestamp: {0}")]
    Timestamp(#[from] TimestampError),
}

/// GeoJSON feature collection, reduced to the fields the feed uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

/// One GeoJSON feature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    #[serde(default)]
    pub properties: FeatureProperties,
}

/// The geometry shapes the feed carries: polygons for probability areas,
/// points for ground observations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        /// Position as `[lon, lat]`.
        coordinates: [f64; 2],
    },
    Polygon {
        /// Rings of `[lon, lat]` positions; the first ring is the outline.
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
}

impl Geometry {
    /// Outline rings of a polygonal geometry; empty for points.
    #[must_use]
    pub fn outer_rings(&self) -> Vec<&[[f64; 2]]> {
        match self {
            Self::Point { .. } => Vec::new(),
            Self::Polygon { coordinates } => {
                coordinates.first().map(Vec::as_slice).into_iter().collect()
            }
            Self::MultiPolygon { coordinates } => coordinates
                .iter()
                .filter_map(|polygon| polygon.first())
                .map(Vec::as_slice)
                .collect(),
        }
    }

    /// The `[lon, lat]` position of a point geometry.
    #[must_use]
    pub fn point(&self) -> Option<[f64; 2]> {
        match self {
            Self::Point { coordinates } => Some(*coordinates),
            _ => None,
        }
    }
}

/// Feature properties; probability features carry `value`, observation
/// features carry `timestamp` and `obs_intensity_description`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeatureProperties {
    /// Hail probability scaled to 0..=255.
    pub value: Option<u8>,
    /// Pre-formatted observation time, shown verbatim in popups.
    pub timestamp: Option<String>,
    pub obs_intensity_description: Option<String>,
}

/// One decoded probability layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    /// The raw feed token, kept as the layer's identity.
    pub timestamp: String,
    /// Validity time decoded from the token.
    pub instant: DateTime<Utc>,
    pub geo: FeatureCollection,
}

/// One full poll result: ordered probability layers (oldest first) plus the
/// canonical observation collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub maps: Vec<ProbabilityMap>,
    pub observations: FeatureCollection,
}

/// Wire shape of the document.
#[derive(Debug, Deserialize)]
struct FeedDocument {
    maps: Vec<RawMapEntry>,
    #[serde(default)]
    observations: Option<FeatureCollection>,
    #[serde(default)]
    alerts: Option<FeatureCollection>,
}

#[derive(Debug, Deserialize)]
struct RawMapEntry {
    timestamp: String,
    geo: FeatureCollection,
}

/// Decode a feed document body into a validated snapshot.
///
/// Rejects the whole document when `maps` is missing or not a sequence, any
/// map timestamp fails to decode, or any probability feature lacks a value
/// in 0..=255. Documents with more than [`MAX_LAYERS`] maps keep only the
/// newest layers.
pub fn decode_snapshot(body: &str) -> Result<Snapshot, FeedError> {
    let doc: FeedDocument =
        serde_json::from_str(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    let mut maps = Vec::with_capacity(doc.maps.len());
    for entry in doc.maps {
        let instant = timestamp::parse(&entry.timestamp)?;
        for feature in &entry.geo.features {
            if feature.properties.value.is_none() {
                return Err(FeedError::Malformed(format!(
                    "probability feature without value in layer {}",
                    entry.timestamp
                )));
            }
        }
        maps.push(ProbabilityMap {
            timestamp: entry.timestamp,
            instant,
            geo: entry.geo,
        });
    }

    if maps.len() > MAX_LAYERS {
        warn!(
            "feed carries {} probability layers, keeping the newest {}",
            maps.len(),
            MAX_LAYERS
        );
        maps.drain(..maps.len() - MAX_LAYERS);
    }

    let observations = doc.observations.or(doc.alerts).unwrap_or_default();

    Ok(Snapshot { maps, observations })
}

/// Fetch and decode the current snapshot document.
pub async fn fetch_snapshot(client: &reqwest::Client, url: &str) -> Result<Snapshot, FeedError> {
    let response = client.get(url).send().await?;
    if response.status() != reqwest::StatusCode::OK {
        return Err(FeedError::Status(response.status()));
    }
    let body = response.text().await?;
    decode_snapshot(&body)
}

/// Probability value scaled to a whole percentage, as shown in popups.
#[must_use]
pub fn probability_percent(value: u8) -> u8 {
    ((f64::from(value) / 255.0) * 100.0).round() as u8
}
