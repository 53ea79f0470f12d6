/// Unicorn behaviour profiles.
///
/// A profile is always present on a unicorn; unknown names are rejected
/// when the level is built, never patched up at runtime.

use std::collections::BTreeMap;

use super::rng::SimRng;

/// What a unicorn does while the player is invincible.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FleeResponse {
    Flee,
    Chase, // ignores invincibility
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnicornProfile {
    pub name: String,
    pub speed_multiplier: f32,
    pub speed_variance: f32,    // fraction of base speed, resampled every tick
    pub turn_delay_chance: f32,
    pub chase_bias: f32,
    pub random_bias: f32,
    pub flee_response: FleeResponse,
}

impl UnicornProfile {
    pub fn classic() -> Self {
        UnicornProfile {
            name: "classic".into(),
            speed_multiplier: 1.0,
            speed_variance: 0.05,
            turn_delay_chance: 0.1,
            chase_bias: 0.85,
            random_bias: 0.1,
            flee_response: FleeResponse::Flee,
        }
    }

    pub fn drunky() -> Self {
        UnicornProfile {
            name: "drunky".into(),
            speed_multiplier: 0.9,
            speed_variance: 0.2,
            turn_delay_chance: 0.35,
            chase_bias: 0.5,
            random_bias: 0.35,
            flee_response: FleeResponse::Flee,
        }
    }

    pub fn stalker() -> Self {
        UnicornProfile {
            name: "stalker".into(),
            speed_multiplier: 0.95,
            speed_variance: 0.02,
            turn_delay_chance: 0.0,
            chase_bias: 1.0,
            random_bias: 0.0,
            flee_response: FleeResponse::Chase,
        }
    }

    /// Speed for this tick: `base * multiplier`, jittered by up to
    /// `variance` of itself either way.
    pub fn sample_speed(&self, base: f32, rng: &mut SimRng) -> f32 {
        let nominal = base * self.speed_multiplier;
        let spread = nominal * self.speed_variance;
        nominal + rng.range_f32(-spread, spread)
    }
}

/// Named profiles: the built-ins plus any from configuration.
#[derive(Clone, Debug)]
pub struct ProfileBook {
    profiles: BTreeMap<String, UnicornProfile>,
}

impl ProfileBook {
    pub fn builtin() -> Self {
        let mut profiles = BTreeMap::new();
        for p in [UnicornProfile::classic(), UnicornProfile::drunky(), UnicornProfile::stalker()] {
            profiles.insert(p.name.clone(), p);
        }
        ProfileBook { profiles }
    }

    /// Built-ins, with same-named entries replaced by `overrides`.
    pub fn with_overrides(overrides: &[UnicornProfile]) -> Self {
        let mut book = Self::builtin();
        for p in overrides {
            book.profiles.insert(p.name.clone(), p.clone());
        }
        book
    }

    pub fn get(&self, name: &str) -> Option<&UnicornProfile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_present() {
        let book = ProfileBook::builtin();
        assert!(book.get("classic").is_some());
        assert!(book.get("drunky").is_some());
        assert!(book.get("nobody").is_none());
    }

    #[test]
    fn overrides_replace_by_name() {
        let mut fast = UnicornProfile::classic();
        fast.speed_multiplier = 2.0;
        let book = ProfileBook::with_overrides(&[fast]);
        assert_eq!(book.get("classic").unwrap().speed_multiplier, 2.0);
        assert_eq!(book.names().count(), 3);
    }

    #[test]
    fn sampled_speed_stays_in_band() {
        let profile = UnicornProfile::drunky();
        let mut rng = SimRng::seeded(7);
        for _ in 0..500 {
            let s = profile.sample_speed(100.0, &mut rng);
            // 90 +/- 18
            assert!((72.0..=108.0).contains(&s), "speed {s}");
        }
    }
}
