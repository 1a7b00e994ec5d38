//! Per-city hotel ranking and leadership change detection.
//!
//! The engine runs as its own task. Each cycle it clones the hotels out of
//! the store under a read lock, scores and sorts them per city, publishes the
//! sorted lists into the [`RankingIndex`], and announces every city whose
//! leading hotel changed since the previous cycle.

use crate::notifier::Notifier;
use crate::store::Store;
use dashmap::{DashMap, DashSet};
use log::{debug, info};
use shared::{current_timestamp, Hotel};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

const RATING_WEIGHT: f64 = 0.6;
const REVIEWS_WEIGHT: f64 = 0.05;
const ACTUALITY_WEIGHT: f64 = 0.35;

/// Ranking score of `hotel` at time `now` (ms since the epoch).
pub fn score(hotel: &Hotel, now: u64) -> f64 {
    let rating = 0.4 * hotel.rate + 0.15 * hotel.ratings.sum();
    let reviews = (hotel.reviews as f64 + 1.0).log10();
    let actuality = match hotel.avg_review_date {
        None => 0.0,
        Some(avg) => {
            let days = now.saturating_sub(avg) / MS_PER_DAY;
            (-0.01 * days as f64).exp()
        }
    };

    RATING_WEIGHT * rating + REVIEWS_WEIGHT * reviews + ACTUALITY_WEIGHT * actuality
}

/// Sorts by descending score, then ascending id.
pub fn rank(hotels: Vec<Hotel>, now: u64) -> Vec<Hotel> {
    let mut scored: Vec<(f64, Hotel)> = hotels.into_iter().map(|h| (score(&h, now), h)).collect();
    scored.sort_by(|(a_score, a), (b_score, b)| match b_score.total_cmp(a_score) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
    scored.into_iter().map(|(_, h)| h).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderChange {
    /// City as spelled by the new leader.
    pub city: String,
    pub hotel_id: u32,
    pub hotel_name: String,
}

/// Concurrent city → ranking map shared between the engine and the dispatcher.
///
/// Published lists are never mutated, only replaced.
#[derive(Debug, Default)]
pub struct RankingIndex {
    cities: DashSet<String>,
    rankings: DashMap<String, Arc<Vec<Hotel>>>,
}

impl RankingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the known cities, lowercasing them.
    pub fn with_cities<I: IntoIterator<Item = String>>(cities: I) -> Self {
        let index = Self::new();
        for city in cities {
            index.cities.insert(city.to_lowercase());
        }
        index
    }

    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = self.cities.iter().map(|c| c.key().clone()).collect();
        cities.sort();
        cities
    }

    pub fn get(&self, city: &str) -> Option<Arc<Vec<Hotel>>> {
        self.rankings
            .get(&city.to_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Replaces the ranking of `city` and returns the previous one.
    /// An empty ranking removes the city.
    pub fn publish(&self, city: &str, ranking: Vec<Hotel>) -> Option<Arc<Vec<Hotel>>> {
        if ranking.is_empty() {
            self.rankings.remove(city).map(|(_, previous)| previous)
        } else {
            self.rankings.insert(city.to_string(), Arc::new(ranking))
        }
    }

    pub fn leader(&self, city: &str) -> Option<Hotel> {
        self.get(city).and_then(|ranking| ranking.first().cloned())
    }
}

pub struct RankingEngine {
    store: Arc<RwLock<Store>>,
    index: Arc<RankingIndex>,
    notifier: Notifier,
}

impl RankingEngine {
    pub fn new(store: Arc<RwLock<Store>>, index: Arc<RankingIndex>, notifier: Notifier) -> Self {
        Self {
            store,
            index,
            notifier,
        }
    }

    pub fn index(&self) -> &Arc<RankingIndex> {
        &self.index
    }

    /// Ranks `hotels` for every known city and publishes the results.
    pub fn recompute_from(&self, hotels: &[Hotel], now: u64) -> Vec<LeaderChange> {
        let mut changes = Vec::new();

        for city in self.index.cities() {
            let in_city: Vec<Hotel> = hotels.iter().filter(|h| h.is_in(&city)).cloned().collect();
            let ranking = rank(in_city, now);
            let new_leader = ranking.first().map(|h| (h.id, h.name.clone(), h.city.clone()));

            let previous = self.index.publish(&city, ranking);
            let old_leader = previous.as_ref().and_then(|r| r.first()).map(|h| h.id);

            if let (Some(old_id), Some((new_id, name, display_city))) = (old_leader, new_leader) {
                if old_id != new_id {
                    changes.push(LeaderChange {
                        city: display_city,
                        hotel_id: new_id,
                        hotel_name: name,
                    });
                }
            }
        }

        changes
    }

    /// One recomputation cycle against the current store contents.
    pub async fn cycle(&self) -> Vec<LeaderChange> {
        let hotels = {
            let store = self.store.read().await;
            store.hotels().to_vec()
        };

        let changes = self.recompute_from(&hotels, current_timestamp());
        debug!(
            "Ranking cycle over {} hotels, {} leader changes",
            hotels.len(),
            changes.len()
        );

        for change in &changes {
            info!(
                "New leader in {}: {} (id {})",
                change.city, change.hotel_name, change.hotel_id
            );
            self.notifier.announce(change).await;
        }
        changes
    }

    /// Runs a cycle every `period` until `shutdown` flips to true.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the startup cycle already ran.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Ranking task stopped");
    }
}
