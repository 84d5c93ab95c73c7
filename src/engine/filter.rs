use crate::engine::criteria::Criteria;
use crate::models::Listing;

/// Keep only listings satisfying every threshold. Pure and
/// order-preserving; evaluated fresh each cycle against the criteria
/// current at that moment.
pub fn apply(batch: Vec<Listing>, criteria: &Criteria) -> Vec<Listing> {
    batch
        .into_iter()
        .filter(|listing| criteria.matches(listing))
        .collect()
}
