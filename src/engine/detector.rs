use crate::engine::criteria::Criteria;
use crate::models::Listing;
use std::collections::HashSet;

/// Result of diffing one cycle against the previous accepted batch.
/// `accepted` is both the display sequence for this cycle and the diff
/// baseline for the next one.
#[derive(Debug, Clone)]
pub struct DiffOutcome {
    pub accepted: Vec<Listing>,
    pub new_count: usize,
}

/// Compare the current filtered batch against the previous accepted batch.
///
/// A listing is new iff its identity link is absent from the full previous
/// batch. New listings go to the front in fetch order with `is_new` set;
/// previously known listings still matching the current criteria are
/// carried over behind them in their prior order, with `is_new` cleared.
/// Indices are reassigned dense and 0-based over the final order.
///
/// With no baseline (first cycle after a start), the whole batch becomes
/// the baseline and nothing is reported as new, so a fresh start never
/// triggers a notification storm.
pub fn diff(current: Vec<Listing>, baseline: Option<&[Listing]>, criteria: &Criteria) -> DiffOutcome {
    let Some(previous) = baseline else {
        let accepted = reindex(
            current
                .into_iter()
                .map(|mut listing| {
                    listing.is_new = false;
                    listing
                })
                .collect(),
        );
        return DiffOutcome {
            accepted,
            new_count: 0,
        };
    };

    let known: HashSet<&str> = previous.iter().map(|l| l.link.as_str()).collect();

    let mut accepted: Vec<Listing> = current
        .into_iter()
        .filter(|listing| !known.contains(listing.link.as_str()))
        .map(|mut listing| {
            listing.is_new = true;
            listing
        })
        .collect();
    let new_count = accepted.len();

    accepted.extend(previous.iter().filter(|l| criteria.matches(l)).map(|l| {
        let mut carried = l.clone();
        carried.is_new = false;
        carried
    }));

    DiffOutcome {
        accepted: reindex(accepted),
        new_count,
    }
}

pub(crate) fn reindex(mut listings: Vec<Listing>) -> Vec<Listing> {
    for (index, listing) in listings.iter_mut().enumerate() {
        listing.index = index;
    }
    listings
}
