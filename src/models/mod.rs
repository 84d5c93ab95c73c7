use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Landlord/provider that produced a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Provider {
    Saga,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Saga => "SAGA",
        }
    }
}

/// One normalized apartment offer.
///
/// `link` is the stable identity used to recognize the same offer across
/// polling cycles; adapters must not emit two listings with the same link
/// in one batch. `is_new` and `index` are presentation fields stamped by
/// the change detector, not by the adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub link: String,
    pub title: String,
    pub street: String,
    pub rooms: f32,
    pub area_sqm: f32,
    pub rent: f32,
    /// User-facing application link (Immomio for SAGA offers).
    pub external_link: String,
    /// Provider-internal detail path.
    pub internal_link: String,
    pub provider: Provider,
    pub fetched_at: DateTime<Utc>,
    pub is_new: bool,
    pub index: usize,
}

/// Listings that passed the filter this cycle, in display order:
/// newly seen offers first, each with a dense 0-based index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub listings: Vec<Listing>,
    pub new_count: usize,
}

/// Events the engine emits to its collaborators (presentation, notifications).
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A polling cycle completed and the accepted batch was updated.
    CycleCompleted {
        result: CycleResult,
        completed_at: DateTime<Utc>,
    },
    /// Every configured source failed this cycle; prior state is untouched.
    CycleFailed {
        reason: String,
        failed_at: DateTime<Utc>,
    },
    /// A completed cycle surfaced new offers matching the current criteria.
    NewMatches { count: usize },
    /// The filtered view was recomputed after a criteria change, outside
    /// the regular cycle rhythm.
    ViewUpdated { result: CycleResult },
}
