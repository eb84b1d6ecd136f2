//! Deduplicator: collapses near-identical classified units into pearls.
//!
//! Units are bucketed by a normalized content prefix, then compared pairwise
//! inside each bucket with a Levenshtein ratio. Buckets are compared in
//! parallel; the merge itself (union-find over unit indices) is sequential,
//! so the result does not depend on scheduling. Every input unit ends up in
//! exactly one canonical unit, discards included.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, instrument};

use keypearls_shared::{Attribution, CanonicalUnit, ClassifiedUnit, DedupConfig};

use crate::text;

#[instrument(skip_all, fields(units = units.len()))]
pub fn deduplicate(units: Vec<ClassifiedUnit>, cfg: &DedupConfig) -> Vec<CanonicalUnit> {
    let normalized: Vec<String> = units
        .par_iter()
        .map(|u| text::normalize_key(&u.candidate().snippet))
        .collect();

    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, norm) in normalized.iter().enumerate() {
        buckets.entry(bucket_key(norm, cfg.prefix_chars)).or_default().push(idx);
    }
    let buckets: Vec<Vec<usize>> = buckets.into_values().filter(|b| b.len() > 1).collect();

    // Local phase: similar pairs within each bucket.
    let edges: Vec<(usize, usize)> = buckets
        .par_iter()
        .flat_map_iter(|bucket| similar_pairs(bucket, &normalized, cfg.similarity))
        .collect();

    // Merge phase.
    let mut sets = DisjointSet::new(units.len());
    for &(a, b) in &edges {
        sets.union(a, b);
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for idx in 0..units.len() {
        groups.entry(sets.find(idx)).or_default().push(idx);
    }
    // Order pearls by their earliest member so output follows input order.
    let mut groups: Vec<Vec<usize>> = groups.into_values().collect();
    groups.sort_by_key(|g| g[0]);

    debug!(
        buckets = buckets.len(),
        merges = edges.len(),
        canonical = groups.len(),
        "deduplication complete"
    );

    groups
        .into_iter()
        .map(|members| merge_group(&units, &members))
        .collect()
}

/// First `prefix_chars` characters of the normalized content.
pub fn bucket_key(normalized: &str, prefix_chars: usize) -> String {
    normalized.chars().take(prefix_chars).collect()
}

fn similar_pairs(bucket: &[usize], normalized: &[String], threshold: f64) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, &a) in bucket.iter().enumerate() {
        for &b in &bucket[i + 1..] {
            if similarity(&normalized[a], &normalized[b]) >= threshold {
                pairs.push((a, b));
            }
        }
    }
    pairs
}

/// `1 - distance / longer_length`, over characters. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / longest as f64
}

/// Levenshtein distance with a two-row table.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let n = b_chars.len();

    if a_chars.is_empty() {
        return n;
    }
    if n == 0 {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];

    for (i, &a_ch) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &b_ch) in b_chars.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Representative: richest vehicle provenance, then earliest in input order.
fn merge_group(units: &[ClassifiedUnit], members: &[usize]) -> CanonicalUnit {
    let rep_idx = members
        .iter()
        .copied()
        .min_by_key(|&idx| (std::cmp::Reverse(provenance_richness(&units[idx])), idx))
        .unwrap_or(members[0]);
    let rep = &units[rep_idx];
    let candidate = rep.candidate();

    let mut tags: Vec<String> = Vec::new();
    for &idx in members {
        for tag in &units[idx].candidate().tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    }

    CanonicalUnit {
        id: format!("pearl-{}", text::short_hash(&[rep.id()])),
        representative_id: rep.id().to_string(),
        content: candidate.snippet.clone(),
        snippet: candidate.snippet.clone(),
        paragraph: candidate.paragraph.clone(),
        heading: candidate.heading.clone(),
        category: candidate.category,
        semantic_type: rep.semantic_type,
        target_section: rep.target_section.clone(),
        score: rep.scored.score,
        tier: rep.scored.tier,
        flags: rep.scored.flags,
        tags,
        needs_vehicle_attribution: rep.needs_vehicle_attribution,
        needs_summarization: rep.needs_summarization,
        absorbed_ids: members.iter().map(|&i| units[i].id().to_string()).collect(),
        sources: members
            .iter()
            .map(|&i| units[i].candidate().source.clone())
            .collect(),
        attribution: Attribution::default(),
        repair: None,
    }
}

fn provenance_richness(unit: &ClassifiedUnit) -> usize {
    let candidate = unit.candidate();
    let vehicle_tags = candidate
        .tags
        .iter()
        .filter(|t| t.starts_with("vehicle:"))
        .count();
    usize::from(candidate.source.vehicle.richness()) + vehicle_tags
}

// ---------------------------------------------------------------------------
// Union-find
// ---------------------------------------------------------------------------

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{candidate, scored};
    use keypearls_shared::{SemanticType, Tier};
    use pretty_assertions::assert_eq;

    fn classified(doc: &str, ordinal: usize, text: &str, tier: Tier) -> ClassifiedUnit {
        ClassifiedUnit {
            scored: scored(candidate(doc, ordinal, text), 40.0, tier),
            semantic_type: SemanticType::Warning,
            target_section: "warnings".into(),
            needs_vehicle_attribution: false,
            needs_summarization: false,
        }
    }

    #[test]
    fn edit_distance_basic() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("vin", "vin"), 0);
        assert_eq!(edit_distance("clé", "cle"), 1);
    }

    #[test]
    fn similarity_ratio() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "abce"), 0.75);
    }

    #[test]
    fn identical_snippets_merge_across_documents() {
        let units = vec![
            classified("ordering", 1, "Always verify the VIN before ordering a replacement key.", Tier::Marginal),
            classified("shop", 1, "Always verify the VIN before ordering a replacement key.", Tier::Marginal),
            classified("shop", 2, "Keep the working key in the shop until programming is complete.", Tier::Marginal),
        ];
        let pearls = deduplicate(units, &DedupConfig::default());

        assert_eq!(pearls.len(), 2);
        assert_eq!(pearls[0].absorbed_ids, vec!["ordering#1", "shop#1"]);
        assert_eq!(pearls[0].representative_id, "ordering#1");
        assert_eq!(pearls[0].sources.len(), 2);
        assert!(pearls[0].id.starts_with("pearl-"));
        assert_eq!(pearls[1].absorbed_ids, vec!["shop#2"]);
    }

    #[test]
    fn near_duplicates_merge_and_distinct_units_do_not() {
        let units = vec![
            classified("a", 0, "Hold the new fob against the start button until the dash confirms.", Tier::Marginal),
            classified("b", 0, "Hold the new fob against the start button until the dash confirms it.", Tier::Marginal),
            classified("c", 0, "Hold the new fob against the start button for ten seconds, then remove the old one.", Tier::Marginal),
        ];
        let pearls = deduplicate(units, &DedupConfig::default());
        assert_eq!(pearls.len(), 2);
        assert_eq!(pearls[0].absorbed_ids, vec!["a#0", "b#0"]);
    }

    #[test]
    fn representative_prefers_richer_provenance() {
        let plain = classified("generic", 0, "Always verify the VIN before ordering a replacement key.", Tier::Marginal);
        let mut rich = classified("tacoma", 4, "Always verify the VIN before ordering a replacement key.", Tier::Marginal);
        rich.scored.candidate.source.vehicle.make = Some("Toyota".into());
        rich.scored.candidate.tags.push("vehicle:2020:toyota".into());

        let pearls = deduplicate(vec![plain, rich], &DedupConfig::default());
        assert_eq!(pearls.len(), 1);
        assert_eq!(pearls[0].representative_id, "tacoma#4");
        assert_eq!(pearls[0].tags, vec!["vehicle:2020:toyota"]);
        // Member order still follows input order.
        assert_eq!(pearls[0].absorbed_ids, vec!["generic#0", "tacoma#4"]);
    }

    #[test]
    fn every_unit_lands_in_exactly_one_pearl() {
        let units: Vec<ClassifiedUnit> = [
            "Insert the working key and press start twice.",
            "Insert the working key and press  START twice.",
            "Not possible without the dealer tool.",
            "Replace the fob battery before retrying the procedure.",
            "Insert the working key and press start twice.",
        ]
        .iter()
        .enumerate()
        .map(|(i, t)| classified("doc", i, t, if i == 2 { Tier::Discard } else { Tier::Marginal }))
        .collect();
        let ids: Vec<String> = units.iter().map(|u| u.id().to_string()).collect();

        let pearls = deduplicate(units, &DedupConfig::default());
        let mut absorbed: Vec<String> = pearls.iter().flat_map(|p| p.absorbed_ids.clone()).collect();
        absorbed.sort();
        let mut expected = ids;
        expected.sort();
        assert_eq!(absorbed, expected);
        assert_eq!(pearls.len(), 3);
        assert!(pearls.iter().any(|p| p.tier == Tier::Discard));
    }

    #[test]
    fn different_prefixes_never_compare() {
        let cfg = DedupConfig {
            prefix_chars: 5,
            similarity: 0.5,
        };
        let units = vec![
            classified("a", 0, "Press start twice to enter programming.", Tier::Marginal),
            classified("b", 0, "Hold start twice to enter programming.", Tier::Marginal),
        ];
        assert_eq!(deduplicate(units, &cfg).len(), 2);
    }
}
