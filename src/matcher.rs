use tracing::debug;

use crate::catalog::Catalog;
use crate::error::ScanError;
use crate::fingerprint::Fingerprint;
use crate::models::MatchResult;

/// Nearest catalog entry by Hamming distance.
///
/// Scans in catalog order and only replaces the current best on a strictly
/// smaller distance, so the first of several equally distant records wins.
/// No threshold is applied: callers decide whether the distance is
/// acceptable (see [`MatchResult::is_within`]).
pub fn best_match(query: &Fingerprint, catalog: &Catalog) -> Result<MatchResult, ScanError> {
    let mut best: Option<(&str, u32)> = None;
    for record in catalog.lookup_all() {
        let d = query.distance(&record.fingerprint);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((&record.card_id, d)),
        }
    }

    let (card_id, distance) = best.ok_or(ScanError::CatalogUnavailable)?;
    debug!(%query, card_id, distance, "best match");
    Ok(MatchResult {
        card_id: card_id.to_string(),
        distance,
    })
}

/// The `k` nearest catalog entries, closest first; equal distances keep
/// catalog order
pub fn rank(query: &Fingerprint, catalog: &Catalog, k: usize) -> Result<Vec<MatchResult>, ScanError> {
    if catalog.is_empty() {
        return Err(ScanError::CatalogUnavailable);
    }

    let mut scored: Vec<(u32, usize)> = catalog
        .lookup_all()
        .iter()
        .enumerate()
        .map(|(i, r)| (query.distance(&r.fingerprint), i))
        .collect();
    // stable, so ties stay in catalog order
    scored.sort_by_key(|&(d, _)| d);

    let records = catalog.lookup_all();
    Ok(scored
        .into_iter()
        .take(k)
        .map(|(distance, i)| MatchResult {
            card_id: records[i].card_id.clone(),
            distance,
        })
        .collect())
}
