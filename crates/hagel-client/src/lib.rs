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

//! Client library for the hagelradar.be hail probability feed.
//!
//! The feed is one JSON document republished every few minutes: an ordered
//! series of probability layers plus live ground observations. This library
//! splits the work into layers that can be used independently or composed:
//!
//! - **Timestamp codec**: decoding the compact `YYYYMMDDHHmm` tokens and
//!   formatting Dutch-Belgian display labels
//! - **Feed layer**: the typed document model and all-or-nothing decoding
//! - **Overlay layer**: the published snapshot the map views consume, with
//!   wholesale replace semantics and a remount version counter
//!
//! # Quick Start
//!
//! Use the [`Client`] type to keep a snapshot fresh in the background:
//!
//! ```no_run
//! use hagel_client::{Client, ClientConfig};
//!
//! let client = Client::spawn(ClientConfig::default());
//! let snapshot = client.snapshot();
//! println!("{} layers, updated {}", snapshot.maps.len(), snapshot.last_updated);
//! ```
//!
//! # Decoding Without Polling
//!
//! The feed layer works on plain strings:
//!
//! ```
//! use hagel_client::feed;
//!
//! let snapshot = feed::decode_snapshot(r#"{ "maps": [] }"#).unwrap();
//! assert!(snapshot.maps.is_empty());
//! ```

pub mod feed;
pub mod overlay;
pub mod timestamp;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub use feed::{
    decode_snapshot, fetch_snapshot, probability_percent, Feature, FeatureCollection,
    FeatureProperties, FeedError, Geometry, ProbabilityMap, Snapshot, FEED_URL, MAX_LAYERS,
};
pub use overlay::{
    layer_color, visible_entries, OverlaySnapshot, OverlayState, OBSERVATION_COLOR, PALETTE,
};
pub use timestamp::TimestampError;

/// Configuration for the polling client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Feed document URL.
    pub url: String,
    /// Time between polls; the first poll fires immediately.
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: FEED_URL.to_string(),
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Health of the most recent completed poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PollStatus {
    /// No poll has completed yet.
    #[default]
    Pending,
    /// The last completed poll decoded cleanly.
    Ok,
    /// The last completed poll failed with this error.
    Failed(String),
}

/// Polling client that keeps an [`OverlayState`] fresh.
///
/// The client owns a background thread with its own single-threaded tokio
/// runtime. A recurring task polls the feed, first immediately and then on
/// the configured interval; each completed poll replaces the published
/// snapshot wholesale. Polls carry a sequence number so a slow response
/// that resolves after a newer one is discarded instead of clobbering it.
/// Dropping the client cancels the poll task.
pub struct Client {
    state: Arc<Mutex<OverlayState>>,
    status: Arc<Mutex<PollStatus>>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Spawn the polling loop with the given configuration.
    #[must_use]
    pub fn spawn(config: ClientConfig) -> Self {
        let state = Arc::new(Mutex::new(OverlayState::new()));
        let status = Arc::new(Mutex::new(PollStatus::Pending));
        let cancel_token = CancellationToken::new();

        let task_state = Arc::clone(&state);
        let task_status = Arc::clone(&status);
        let task_cancel = cancel_token.clone();

        std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start feed runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(poll_loop(config, task_state, task_status, task_cancel));
        });

        Self {
            state,
            status,
            cancel_token,
        }
    }

    /// The current overlay snapshot; an `Arc` clone, cheap to take per frame.
    #[must_use]
    pub fn snapshot(&self) -> Arc<OverlaySnapshot> {
        self.state
            .lock()
            .map(|state| state.snapshot())
            .unwrap_or_default()
    }

    /// Health of the most recent completed poll.
    #[must_use]
    pub fn poll_status(&self) -> PollStatus {
        self.status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    /// Stop polling.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn poll_loop(
    config: ClientConfig,
    state: Arc<Mutex<OverlayState>>,
    status: Arc<Mutex<PollStatus>>,
    cancel_token: CancellationToken,
) {
    let http = match reqwest::Client::builder().build() {
        Ok(http) => http,
        Err(e) => {
            error!("Failed to build feed HTTP client: {}", e);
            return;
        }
    };

    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Feed polling cancelled");
                return;
            }
            _ = interval.tick() => {
                seq += 1;
                let http = http.clone();
                let url = config.url.clone();
                let state = Arc::clone(&state);
                let status = Arc::clone(&status);

                // Polls are allowed to overlap; the sequence number settles
                // who wins when they do
                tokio::spawn(async move {
                    match feed::fetch_snapshot(&http, &url).await {
                        Ok(snapshot) => {
                            let layers = snapshot.maps.len();
                            if let Ok(mut state) = state.lock() {
                                if state.apply(seq, snapshot) {
                                    info!("Poll {} published {} layers", seq, layers);
                                } else {
                                    info!("Poll {} discarded as stale", seq);
                                }
                            }
                            if let Ok(mut status) = status.lock() {
                                *status = PollStatus::Ok;
                            }
                        }
                        Err(e) => {
                            warn!("Poll {} failed: {}", seq, e);
                            if let Ok(mut status) = status.lock() {
                                *status = PollStatus::Failed(e.to_string());
                            }
                        }
                    }
                });
            }
        }
    }
}
