//! Turning an abstract step-link into a ranked, deterministic list of
//! concrete candidate links the search may attempt, with a process-wide
//! cache keyed by the link's own structural identity.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::arrow::{Foot, Portion};
use crate::step_graph::{GraphLink, LinkCell, StepType};

/// An ordered `StepType -> StepType` replacement table: for each step-type
/// that might be substituted, the ordered (most to least preferred) list
/// of alternatives a fallback expansion is allowed to try.
#[derive(Debug, Clone, Default)]
pub struct ReplacementTable {
    replacements: HashMap<StepType, Vec<StepType>>,
}

impl ReplacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: StepType, ordered_alternatives: Vec<StepType>) {
        self.replacements.insert(from, ordered_alternatives);
    }

    fn alternatives(&self, step_type: StepType) -> &[StepType] {
        self.replacements
            .get(&step_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

static CACHE: Lazy<RwLock<HashMap<GraphLink, Vec<GraphLink>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The expansion of a single [`GraphLink`] into every concrete link the
/// search may attempt, most preferred first, with the cache that backs
/// repeated lookups of the same link.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackTable;

impl FallbackTable {
    pub fn new() -> Self {
        Self
    }

    /// Populate the process-wide cache for every link in `links` against
    /// `replacements`. Meant to be called once per replacement table
    /// before any search runs, but safe to call more than once; later
    /// calls only fill entries still missing (single-writer discipline,
    /// not a forced re-derivation).
    pub fn prime_cache(&self, links: &[GraphLink], replacements: &ReplacementTable) {
        let mut missing = Vec::new();
        {
            let cache = CACHE.read().expect("fallback cache poisoned");
            for link in links {
                if !cache.contains_key(link) {
                    missing.push(*link);
                }
            }
        }
        if missing.is_empty() {
            return;
        }
        let mut cache = CACHE.write().expect("fallback cache poisoned");
        for link in missing {
            cache
                .entry(link)
                .or_insert_with(|| expand(&link, replacements));
        }
        log::info!("primed fallback cache with {} links", cache.len());
    }

    /// The ranked expansion of `link`. Reads the cache if already primed
    /// for this exact link; otherwise computes and inserts it, so a lookup
    /// is always correct even without a prior `prime_cache` call (the cache
    /// is an optimization, not a precondition).
    pub fn expand(&self, link: &GraphLink, replacements: &ReplacementTable) -> Vec<GraphLink> {
        if let Some(hit) = CACHE.read().expect("fallback cache poisoned").get(link) {
            return hit.clone();
        }
        let expanded = expand(link, replacements);
        CACHE
            .write()
            .expect("fallback cache poisoned")
            .entry(*link)
            .or_insert_with(|| expanded.clone());
        expanded
    }
}

/// Build the ranked expansion list for `link`: itself first, then every
/// link reachable by substituting one or more cells' step-types from
/// `replacements`, each substitution batch kept only if bracket
/// consistency still holds, finished with a trailing blank link.
fn expand(link: &GraphLink, replacements: &ReplacementTable) -> Vec<GraphLink> {
    if link.is_blank() {
        return vec![GraphLink::BLANK];
    }

    let mut out = vec![*link];
    let mut seen = std::collections::HashSet::new();
    seen.insert(*link);

    // Per-cell candidate sets: the cell's own step-type first, then each
    // configured alternative, so the cartesian walk below visits "no
    // substitutions" before any substitution and orders siblings by how
    // many/how preferred their substitutions are — the most-preferred
    // link falls out of iteration order rather than an explicit sort.
    let mut live_cells = Vec::new();
    for &foot in &Foot::ALL {
        for &portion in &Portion::ALL {
            let cell = link.cell(foot, portion);
            if cell.valid {
                let mut candidates = vec![cell.step_type];
                candidates.extend(
                    replacements
                        .alternatives(cell.step_type)
                        .iter()
                        .copied()
                        .filter(|t| *t != cell.step_type),
                );
                live_cells.push((foot, portion, candidates));
            }
        }
    }

    // Enumerate the cartesian product of per-cell candidates (skipping the
    // all-original combination, already pushed as `link` itself),
    // rejecting any combination that breaks bracket consistency.
    let counts: Vec<usize> = live_cells.iter().map(|(_, _, c)| c.len()).collect();
    let total: usize = counts.iter().product();
    for combo_idx in 0..total {
        let mut rem = combo_idx;
        let mut picks = Vec::with_capacity(live_cells.len());
        for &count in &counts {
            picks.push(rem % count);
            rem /= count;
        }
        if picks.iter().all(|&p| p == 0) {
            continue;
        }
        let mut candidate = *link;
        for (&(foot, portion, ref types), &pick) in live_cells.iter().zip(picks.iter()) {
            let mut cell = candidate.cell(foot, portion);
            cell.step_type = types[pick];
            candidate.set_cell(foot, portion, cell);
        }
        if !candidate.is_structurally_valid() {
            continue;
        }
        if seen.insert(candidate) {
            out.push(candidate);
        }
    }

    out.push(GraphLink::BLANK);
    out
}

/// Used by callers that need to check whether a cell survived as valid
/// after a fallback substitution, e.g. the cost model's "individually
/// dropped arrow" fallback-cost term.
pub fn dropped_cells(original: &GraphLink, candidate: &GraphLink) -> usize {
    let mut dropped = 0;
    for &foot in &Foot::ALL {
        for &portion in &Portion::ALL {
            let o: LinkCell = original.cell(foot, portion);
            let c = candidate.cell(foot, portion);
            if o.valid && !c.valid {
                dropped += 1;
            }
        }
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step_graph::FootAction;

    fn tap_link(foot: Foot, step_type: StepType) -> GraphLink {
        let mut link = GraphLink::BLANK;
        link.set_cell(
            foot,
            Portion::Heel,
            LinkCell {
                step_type,
                action: FootAction::Tap,
                valid: true,
                stretch: false,
            },
        );
        link
    }

    #[test]
    fn original_link_is_first_and_blank_is_last() {
        let link = tap_link(Foot::Left, StepType::NewArrow);
        let table = ReplacementTable::new();
        let expansion = expand(&link, &table);
        assert_eq!(expansion.first(), Some(&link));
        assert_eq!(expansion.last(), Some(&GraphLink::BLANK));
    }

    #[test]
    fn substitution_produces_additional_candidates() {
        let link = tap_link(Foot::Left, StepType::NewArrow);
        let mut table = ReplacementTable::new();
        table.insert(StepType::NewArrow, vec![StepType::CrossoverFront]);
        let expansion = expand(&link, &table);
        assert!(expansion.len() >= 3);
        assert!(expansion
            .iter()
            .any(|l| l.cell(Foot::Left, Portion::Heel).step_type == StepType::CrossoverFront));
    }

    #[test]
    fn blank_link_expands_to_itself_only() {
        let table = ReplacementTable::new();
        let expansion = expand(&GraphLink::BLANK, &table);
        assert_eq!(expansion, vec![GraphLink::BLANK]);
    }

    #[test]
    fn cache_round_trips_through_prime_and_expand() {
        let link = tap_link(Foot::Right, StepType::SameArrow);
        let table = ReplacementTable::new();
        let fallback = FallbackTable::new();
        fallback.prime_cache(&[link], &table);
        let expanded = fallback.expand(&link, &table);
        assert_eq!(expanded.first(), Some(&link));
    }
}
