//! User profiles keyed by cookie or device id.
//!
//! Unknown users get a synthetic profile, cached under the id they were
//! looked up with.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

const AGE_GROUPS: &[&str] = &["18-24", "25-34", "35-44", "45-54", "55-64", "65+"];
const GENDERS: &[&str] = &["male", "female", "other", "unknown"];
const INTERESTS: &[&str] = &[
    "technology",
    "travel",
    "fashion",
    "sports",
    "food",
    "gaming",
    "automotive",
    "finance",
    "health",
    "education",
    "entertainment",
    "home",
    "beauty",
    "business",
    "family",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age_group: String,
    pub gender: String,
    pub income: u32,

    pub is_target_audience: bool,
    /// In [0.1, 1.0].
    pub purchasing_power: f64,
    /// In [0.1, 1.0].
    pub engagement_level: f64,

    pub days_since_last_visit: u32,
    pub days_since_last_interest: u32,
    pub has_previous_conversion: bool,
    pub interests: Vec<String>,

    pub total_clicks: u32,
    pub total_conversions: u32,
    pub total_pageviews: u32,
    pub last_click_at: Option<DateTime<Utc>>,
    pub last_conversion_at: Option<DateTime<Utc>>,
    pub last_pageview_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn synthetic<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let interest_count = rng.gen_range(1..=5);
        let interests = (0..interest_count)
            .filter_map(|_| INTERESTS.choose(rng))
            .map(|s| s.to_string())
            .collect();

        Self {
            age_group: pick(AGE_GROUPS, rng),
            gender: pick(GENDERS, rng),
            income: 20_000 + rng.gen_range(0..18) * 10_000,
            is_target_audience: rng.gen_bool(0.5),
            purchasing_power: 0.1 + rng.gen::<f64>() * 0.9,
            engagement_level: 0.1 + rng.gen::<f64>() * 0.9,
            days_since_last_visit: rng.gen_range(0..30),
            days_since_last_interest: rng.gen_range(0..60),
            has_previous_conversion: rng.gen_bool(0.3),
            interests,
            total_clicks: 0,
            total_conversions: 0,
            total_pageviews: 0,
            last_click_at: None,
            last_conversion_at: None,
            last_pageview_at: None,
        }
    }
}

fn pick<R: Rng + ?Sized>(options: &[&str], rng: &mut R) -> String {
    options.choose(rng).copied().unwrap_or("unknown").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserEvent {
    Click,
    Conversion,
    Pageview,
}

/// Thread-safe profile cache.
#[derive(Debug, Clone, Default)]
pub struct UserProfileStore {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl UserProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up by cookie, then device; otherwise create, cache, and return a
    /// synthetic profile. Without any id the profile is not cached.
    pub fn get_or_create<R: Rng + ?Sized>(
        &self,
        cookie_id: Option<&str>,
        device_id: Option<&str>,
        rng: &mut R,
    ) -> UserProfile {
        let cookie_id = cookie_id.filter(|id| !id.is_empty());
        let device_id = device_id.filter(|id| !id.is_empty());

        {
            let profiles = self.profiles.read().unwrap();
            for id in [cookie_id, device_id].into_iter().flatten() {
                if let Some(profile) = profiles.get(id) {
                    return profile.clone();
                }
            }
        }

        let profile = UserProfile::synthetic(rng);
        if let Some(key) = cookie_id.or(device_id) {
            self.profiles
                .write()
                .unwrap()
                .insert(key.to_string(), profile.clone());
        }
        profile
    }

    pub fn get(&self, id: &str) -> Option<UserProfile> {
        self.profiles.read().unwrap().get(id).cloned()
    }

    /// Apply `change` to the user's profile and store the result.
    pub fn update<R: Rng + ?Sized>(
        &self,
        cookie_id: Option<&str>,
        device_id: Option<&str>,
        rng: &mut R,
        change: impl FnOnce(&mut UserProfile),
    ) -> UserProfile {
        let mut profile = self.get_or_create(cookie_id, device_id, rng);
        change(&mut profile);
        if let Some(key) = cookie_id
            .filter(|id| !id.is_empty())
            .or(device_id.filter(|id| !id.is_empty()))
        {
            self.profiles
                .write()
                .unwrap()
                .insert(key.to_string(), profile.clone());
        }
        profile
    }

    pub fn track_event<R: Rng + ?Sized>(
        &self,
        cookie_id: Option<&str>,
        device_id: Option<&str>,
        event: UserEvent,
        rng: &mut R,
    ) -> UserProfile {
        let now = Utc::now();
        self.update(cookie_id, device_id, rng, |profile| match event {
            UserEvent::Click => {
                profile.last_click_at = Some(now);
                profile.total_clicks += 1;
            }
            UserEvent::Conversion => {
                profile.last_conversion_at = Some(now);
                profile.total_conversions += 1;
                profile.has_previous_conversion = true;
            }
            UserEvent::Pageview => {
                profile.last_pageview_at = Some(now);
                profile.total_pageviews += 1;
                profile.days_since_last_visit = 0;
            }
        })
    }

    pub fn len(&self) -> usize {
        self.profiles.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_cookie_lookup_wins_over_device() {
        let store = UserProfileStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let by_cookie = store.get_or_create(Some("c1"), Some("d1"), &mut rng);
        // Same cookie with a new device returns the cached profile.
        assert_eq!(store.get_or_create(Some("c1"), Some("d2"), &mut rng), by_cookie);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_anonymous_profiles_are_not_cached() {
        let store = UserProfileStore::new();
        let mut rng = StdRng::seed_from_u64(2);
        store.get_or_create(None, Some(""), &mut rng);
        assert!(store.is_empty());
    }

    #[test]
    fn test_track_event_counts() {
        let store = UserProfileStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        store.track_event(None, Some("d1"), UserEvent::Pageview, &mut rng);
        store.track_event(None, Some("d1"), UserEvent::Click, &mut rng);
        let profile = store.track_event(None, Some("d1"), UserEvent::Click, &mut rng);
        assert_eq!(profile.total_pageviews, 1);
        assert_eq!(profile.total_clicks, 2);
        assert_eq!(profile.days_since_last_visit, 0);
        assert!(profile.last_click_at.is_some());
        assert_eq!(store.get("d1"), Some(profile));
    }

    #[test]
    fn test_synthetic_profile_ranges() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..100 {
            let p = UserProfile::synthetic(&mut rng);
            assert!((0.1..=1.0).contains(&p.purchasing_power));
            assert!((0.1..=1.0).contains(&p.engagement_level));
            assert!((1..=5).contains(&p.interests.len()));
            assert!((20_000..=190_000).contains(&p.income));
        }
    }
}
