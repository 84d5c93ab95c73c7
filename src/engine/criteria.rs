use crate::error::EngineError;
use crate::models::Listing;
use std::env;
use std::time::Duration;

/// User-adjustable thresholds driving the filter and the poll rhythm.
/// Mutable at any time through the scheduler handle; changes take effect
/// on the next cycle, never retroactively.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    pub min_rooms: f32,
    pub min_area: f32,
    pub max_rent: f32,
    pub poll_interval: Duration,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            min_rooms: 2.0,
            min_area: 40.0,
            max_rent: 900.0,
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl Criteria {
    /// Load criteria from the environment, falling back to defaults for
    /// unset variables. Invalid values are rejected, not silently fixed.
    pub fn from_env() -> Result<Self, EngineError> {
        let defaults = Self::default();
        let criteria = Self {
            min_rooms: env_number("FLATWATCH_MIN_ROOMS", defaults.min_rooms)?,
            min_area: env_number("FLATWATCH_MIN_AREA", defaults.min_area)?,
            max_rent: env_number("FLATWATCH_MAX_RENT", defaults.max_rent)?,
            poll_interval: Duration::from_secs(env_number(
                "FLATWATCH_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )?),
        };
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.min_rooms.is_finite() || self.min_rooms < 0.0 {
            return Err(EngineError::InvalidCriteria(format!(
                "min_rooms must be a non-negative number, got {}",
                self.min_rooms
            )));
        }
        if !self.min_area.is_finite() || self.min_area < 0.0 {
            return Err(EngineError::InvalidCriteria(format!(
                "min_area must be a non-negative number, got {}",
                self.min_area
            )));
        }
        if !self.max_rent.is_finite() || self.max_rent < 0.0 {
            return Err(EngineError::InvalidCriteria(format!(
                "max_rent must be a non-negative number, got {}",
                self.max_rent
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(EngineError::InvalidCriteria(
                "poll_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// A listing matches iff it satisfies every threshold.
    pub fn matches(&self, listing: &Listing) -> bool {
        listing.rooms >= self.min_rooms
            && listing.area_sqm >= self.min_area
            && listing.rent <= self.max_rent
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T, EngineError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| EngineError::InvalidCriteria(format!("{key}={raw} is not a number"))),
        Err(_) => Ok(default),
    }
}
