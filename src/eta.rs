//! ETA model (C2): cached travel-time estimation with a traffic-by-hour
//! multiplier, an online per-rider speed model, and configurable service
//! times.
//!
//! The bounded LRU cache mirrors the teacher's global
//! `spatial::get_distance_cache` (an `lru::LruCache` behind a lock), adapted
//! here to a per-engine, non-global cache keyed on (origin, destination,
//! departure minute) as spec.md §3 requires, with lazy age-based eviction
//! rather than pure LRU capacity eviction.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::EtaConfig;
use crate::geo::{distance_km, travel_time_minutes};
use crate::model::Location;

const AVG_SPEED_KMH: f64 = 25.0;
const MAX_CACHE_ENTRIES: usize = 50_000;

/// Round a decimal-degree coordinate to 4 decimal places for cache keying.
fn round4(value: f64) -> i64 {
    (value * 10_000.0).round() as i64
}

type CacheKey = (i64, i64, i64, i64, i64);

fn cache_key(origin: Location, destination: Location, departure_minute: i64) -> CacheKey {
    (
        round4(origin.lat),
        round4(origin.lng),
        round4(destination.lat),
        round4(destination.lng),
        departure_minute,
    )
}

/// Result of one ETA estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaEstimate {
    pub estimated_duration_minutes: f64,
    pub confidence: f64,
    pub base_time_minutes: f64,
    pub traffic_multiplier: f64,
    pub rider_speed_multiplier: f64,
    pub service_time_minutes: f64,
}

/// One leg of a chained route ETA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteLeg {
    pub from_index: usize,
    pub to_index: usize,
    pub estimate: EtaEstimate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteEtaResult {
    pub total_duration_minutes: f64,
    pub legs: Vec<RouteLeg>,
}

/// Online per-rider speed model. Created lazily on first use; never removed
/// during the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct RiderEtaModel {
    pub rider_id: String,
    pub speed_multiplier: f64,
    pub familiar_zones: std::collections::HashSet<String>,
    pub training_datapoints: u64,
    pub last_updated: i64,
}

/// Telemetry snapshot of the ETA model's internal caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtaCacheStats {
    pub cached_estimates: usize,
    pub rider_models: usize,
}

struct CacheEntry {
    estimate: EtaEstimate,
    inserted_at_ms: i64,
}

/// Per-(origin, destination, minute) ETA estimator with a bounded, lazily
/// evicted cache and an online per-rider speed model.
pub struct EtaModel {
    config: EtaConfig,
    cache: LruCache<CacheKey, CacheEntry>,
    rider_models: HashMap<String, RiderEtaModel>,
    rng: StdRng,
}

impl EtaModel {
    pub fn new(config: EtaConfig) -> Self {
        Self::with_seed(config, None)
    }

    pub fn with_seed(config: EtaConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            cache: LruCache::new(NonZeroUsize::new(MAX_CACHE_ENTRIES).unwrap()),
            rider_models: HashMap::new(),
            rng,
        }
    }

    fn traffic_multiplier(&self, now_ms: i64) -> f64 {
        let hour = ((now_ms / 3_600_000).rem_euclid(24)) as u32;
        if (8..10).contains(&hour) || (17..19).contains(&hour) {
            1.5
        } else if !(6..22).contains(&hour) {
            1.1
        } else {
            1.0
        }
    }

    fn rider_speed_multiplier(&mut self, rider_id: &str, now_ms: i64) -> f64 {
        if let Some(model) = self.rider_models.get(rider_id) {
            return model.speed_multiplier;
        }
        let speed_multiplier = self.rng.gen_range(0.8..=1.2);
        self.rider_models.insert(
            rider_id.to_string(),
            RiderEtaModel {
                rider_id: rider_id.to_string(),
                speed_multiplier,
                familiar_zones: std::collections::HashSet::new(),
                training_datapoints: 0,
                last_updated: now_ms,
            },
        );
        speed_multiplier
    }

    fn service_time_minutes(&self, building_type: Option<&str>) -> f64 {
        building_type
            .and_then(|kind| self.config.service_time_defaults.get(kind))
            .copied()
            .unwrap_or(0.0)
    }

    /// Estimate ETA from `origin` to `destination`, departing at `now_ms`
    /// (unix millis). `rider_id` applies the rider's online speed
    /// multiplier; `building_type` applies a configured service time.
    pub fn estimate_eta(
        &mut self,
        origin: Location,
        destination: Location,
        now_ms: i64,
        rider_id: Option<&str>,
        building_type: Option<&str>,
    ) -> EtaEstimate {
        let departure_minute = now_ms.div_euclid(60_000);
        let key = cache_key(origin, destination, departure_minute);

        if let Some(entry) = self.cache.get(&key) {
            let age_minutes = (now_ms - entry.inserted_at_ms) as f64 / 60_000.0;
            if age_minutes < self.config.eta_cache_minutes {
                return entry.estimate;
            }
        }

        let base_time_minutes = travel_time_minutes(origin, destination, AVG_SPEED_KMH, 1.0) as f64;
        let traffic_multiplier = self.traffic_multiplier(now_ms);
        let rider_speed_multiplier = match rider_id {
            Some(id) => self.rider_speed_multiplier(id, now_ms),
            None => 1.0,
        };
        let service_time_minutes = self.service_time_minutes(building_type);

        let travel_time = (base_time_minutes * traffic_multiplier * rider_speed_multiplier).round();
        let estimated_duration_minutes = travel_time + service_time_minutes;
        let confidence = self.rng.gen_range(0.75..=0.95);

        let estimate = EtaEstimate {
            estimated_duration_minutes,
            confidence,
            base_time_minutes,
            traffic_multiplier,
            rider_speed_multiplier,
            service_time_minutes,
        };

        self.cache.put(
            key,
            CacheEntry {
                estimate,
                inserted_at_ms: now_ms,
            },
        );

        estimate
    }

    /// Chain pairwise ETA estimates through an ordered list of locations,
    /// advancing the clock by each leg's duration.
    pub fn estimate_route_eta(
        &mut self,
        locations: &[Location],
        start_time_ms: i64,
        rider_id: Option<&str>,
    ) -> RouteEtaResult {
        let mut clock = start_time_ms;
        let mut total = 0.0;
        let mut legs = Vec::new();
        for window in locations.windows(2) {
            let (from, to) = (window[0], window[1]);
            let estimate = self.estimate_eta(from, to, clock, rider_id, None);
            clock += (estimate.estimated_duration_minutes * 60_000.0).round() as i64;
            total += estimate.estimated_duration_minutes;
            legs.push(RouteLeg {
                from_index: legs.len(),
                to_index: legs.len() + 1,
                estimate,
            });
        }
        RouteEtaResult {
            total_duration_minutes: total,
            legs,
        }
    }

    /// Apply an EWMA update to a rider's speed model from an observed trip.
    pub fn update_rider_model(
        &mut self,
        rider_id: &str,
        actual_duration_minutes: f64,
        estimated_duration_minutes: f64,
        zone: &str,
        now_ms: i64,
    ) {
        let model = self
            .rider_models
            .entry(rider_id.to_string())
            .or_insert_with(|| RiderEtaModel {
                rider_id: rider_id.to_string(),
                speed_multiplier: 1.0,
                familiar_zones: std::collections::HashSet::new(),
                training_datapoints: 0,
                last_updated: now_ms,
            });
        let observed_ratio = estimated_duration_minutes / actual_duration_minutes.max(1.0);
        model.speed_multiplier = 0.9 * model.speed_multiplier + 0.1 * observed_ratio;
        model.familiar_zones.insert(zone.to_string());
        model.training_datapoints += 1;
        model.last_updated = now_ms;
    }

    /// Remove cache entries older than `eta_cache_minutes`.
    pub fn clear_expired_cache(&mut self, now_ms: i64) {
        let ttl = self.config.eta_cache_minutes;
        let expired: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|(_, entry)| (now_ms - entry.inserted_at_ms) as f64 / 60_000.0 >= ttl)
            .map(|(key, _)| *key)
            .collect();
        for key in expired {
            self.cache.pop(&key);
        }
    }

    pub fn cache_stats(&self) -> EtaCacheStats {
        EtaCacheStats {
            cached_estimates: self.cache.len(),
            rider_models: self.rider_models.len(),
        }
    }

    pub fn rider_model(&self, rider_id: &str) -> Option<&RiderEtaModel> {
        self.rider_models.get(rider_id)
    }
}

/// Haversine straight-line distance shorthand used by callers that need both
/// distance and ETA for the same pair (candidate generation, scoring).
pub fn straight_line_km(a: Location, b: Location) -> f64 {
    distance_km(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> EtaModel {
        EtaModel::with_seed(EtaConfig::default(), Some(7))
    }

    #[test]
    fn equal_endpoints_yield_zero_travel_plus_service_time() {
        let mut m = model();
        let loc = Location::new(12.9716, 77.5946);
        let estimate = m.estimate_eta(loc, loc, 0, None, Some("restaurant_pickup"));
        assert_eq!(estimate.base_time_minutes, 0.0);
        assert_eq!(estimate.estimated_duration_minutes, 5.0);
    }

    #[test]
    fn cache_returns_same_estimate_within_ttl() {
        let mut m = model();
        let a = Location::new(12.9716, 77.5946);
        let b = Location::new(12.99, 77.6);
        let first = m.estimate_eta(a, b, 1_000, Some("r1"), None);
        let second = m.estimate_eta(a, b, 1_000 + 60_000, Some("r1"), None);
        assert_eq!(first.estimated_duration_minutes, second.estimated_duration_minutes);
    }

    #[test]
    fn clear_expired_cache_evicts_old_entries() {
        let mut m = model();
        let a = Location::new(12.9716, 77.5946);
        let b = Location::new(12.99, 77.6);
        m.estimate_eta(a, b, 0, None, None);
        assert_eq!(m.cache_stats().cached_estimates, 1);
        m.clear_expired_cache(10 * 60_000);
        assert_eq!(m.cache_stats().cached_estimates, 0);
    }

    #[test]
    fn rider_speed_multiplier_is_stable_after_first_use() {
        let mut m = model();
        let a = Location::new(12.9716, 77.5946);
        let b = Location::new(12.99, 77.6);
        let first = m.estimate_eta(a, b, 0, Some("r1"), None).rider_speed_multiplier;
        let second = m.estimate_eta(a, b, 120_000 * 10, Some("r1"), None).rider_speed_multiplier;
        assert_eq!(first, second);
        assert!((0.8..=1.2).contains(&first));
    }

    #[test]
    fn update_rider_model_applies_ewma() {
        let mut m = model();
        m.estimate_eta(
            Location::new(0.0, 0.0),
            Location::new(0.0, 0.0),
            0,
            Some("r1"),
            None,
        );
        let before = m.rider_model("r1").unwrap().speed_multiplier;
        m.update_rider_model("r1", 20.0, 10.0, "zone_0_0", 1_000);
        let after = m.rider_model("r1").unwrap().speed_multiplier;
        assert_ne!(before, after);
        assert_eq!(m.rider_model("r1").unwrap().training_datapoints, 1);
    }

    #[test]
    fn confidence_is_bounded() {
        let mut m = model();
        let estimate = m.estimate_eta(Location::new(0.0, 0.0), Location::new(1.0, 1.0), 0, None, None);
        assert!((0.75..=0.95).contains(&estimate.confidence));
    }
}
