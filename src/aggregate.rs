use crate::envelope::Envelope;

/// Merge two single-page feeds into one view ordered by `created_at`, newest first.
///
/// Articles with equal timestamps keep their input order (all of `first` before
/// `second`); articles without a timestamp go last. Pagination, rate-limit and
/// subscription metadata come from `first` only, `second`'s is dropped.
pub fn merge_feeds(first: Envelope, second: Envelope) -> Envelope {
    let mut merged = first;
    merged.data.extend(second.data);
    merged
        .data
        .sort_by(|a, b| b.created_at().cmp(a.created_at()));
    merged
}
