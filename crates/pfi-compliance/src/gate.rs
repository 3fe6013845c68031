//! Compliance gate: screens a party against the sanctions roster.
//!
//! ## Design Principles
//!
//! - **Fail-closed**: no roster loaded means an error, never a silent "clear"
//! - **Pure**: screening reads one snapshot and holds no state of its own
//! - **Threshold is a parameter**: callers choose how strict a hit is
//!
//! ## Hit Rule
//!
//! Candidates are the entries whose name fuzzy-matches the query. When a
//! country is supplied, candidates are narrowed to entries whose country also
//! fuzzy-matches. A candidate is a hit when, under [`MatchPolicy::Either`],
//! its name score **or** its country score reaches `min_score`; under
//! [`MatchPolicy::Both`] the name must reach it and, if a country was
//! supplied, so must the country.

use std::sync::Arc;

use pfi_types::{MatchPolicy, PfiError, Result, SanctionsEntry};

use crate::{RosterSnapshot, SanctionsRoster, fuzzy};

/// A roster entry the query matched, with its scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningHit {
    pub entry: SanctionsEntry,
    pub name_score: u8,
    /// `None` when no country was supplied.
    pub country_score: Option<u8>,
}

/// Screens names against the process-wide roster.
#[derive(Debug, Clone)]
pub struct ComplianceGate {
    roster: Arc<SanctionsRoster>,
    policy: MatchPolicy,
}

impl ComplianceGate {
    #[must_use]
    pub fn new(roster: Arc<SanctionsRoster>, policy: MatchPolicy) -> Self {
        Self { roster, policy }
    }

    #[must_use]
    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    #[must_use]
    pub fn roster(&self) -> &Arc<SanctionsRoster> {
        &self.roster
    }

    /// Returns `true` if any roster entry is a hit.
    ///
    /// # Errors
    /// Returns [`PfiError::RosterUnavailable`] if no roster has been loaded.
    pub fn screen(&self, name: &str, country: Option<&str>, min_score: u8) -> Result<bool> {
        Ok(!self.hits(name, country, min_score)?.is_empty())
    }

    /// Every hit, for logging and audit.
    ///
    /// # Errors
    /// Returns [`PfiError::RosterUnavailable`] if no roster has been loaded.
    pub fn hits(
        &self,
        name: &str,
        country: Option<&str>,
        min_score: u8,
    ) -> Result<Vec<ScreeningHit>> {
        let snapshot = self
            .roster
            .current_snapshot()
            .ok_or_else(|| PfiError::RosterUnavailable {
                reason: "sanctions roster not loaded".to_string(),
            })?;
        let hits = screen_snapshot(&snapshot, name, country, min_score, self.policy);
        tracing::debug!(
            roster_entries = snapshot.len(),
            hits = hits.len(),
            min_score,
            "sanctions screening complete"
        );
        Ok(hits)
    }
}

/// Screen against one snapshot. Empty or blank `country` counts as absent.
#[must_use]
pub fn screen_snapshot(
    snapshot: &RosterSnapshot,
    name: &str,
    country: Option<&str>,
    min_score: u8,
    policy: MatchPolicy,
) -> Vec<ScreeningHit> {
    let name_query = fuzzy::normalize(name);
    let country_query = country
        .map(fuzzy::normalize)
        .filter(|c| !c.is_empty());

    snapshot
        .entries()
        .iter()
        .filter_map(|entry| {
            let name_score = fuzzy::score_normalized(&name_query, &fuzzy::normalize(&entry.name))?;
            // Entries published without a country are judged on name alone.
            let country_score = match &country_query {
                Some(q) if entry.has_country() => {
                    Some(fuzzy::score_normalized(q, &fuzzy::normalize(&entry.country))?)
                }
                _ => None,
            };
            let name_hit = name_score >= min_score;
            let country_hit = country_score.is_some_and(|s| s >= min_score);
            let hit = match policy {
                MatchPolicy::Either => name_hit || country_hit,
                MatchPolicy::Both => name_hit && (country_score.is_none() || country_hit),
            };
            hit.then(|| ScreeningHit {
                entry: entry.clone(),
                name_score,
                country_score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Arc<SanctionsRoster> {
        Arc::new(SanctionsRoster::preloaded(vec![
            SanctionsEntry::new("John Doe", "Nowhereland"),
            SanctionsEntry::new("Ivan Petrov", "Elbonia"),
        ]))
    }

    #[test]
    fn exact_name_and_country_hit() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        assert!(gate.screen("John Doe", Some("Nowhereland"), 80).unwrap());
    }

    #[test]
    fn unrelated_party_is_clear() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        assert!(
            !gate
                .screen("Completely Different Name", Some("Elsewhere"), 80)
                .unwrap()
        );
    }

    #[test]
    fn threshold_above_near_miss_flips_result() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        assert!(gate.screen("Jon Doe", None, 80).unwrap());
        assert!(!gate.screen("Jon Doe", None, 90).unwrap());
    }

    #[test]
    fn empty_roster_never_hits() {
        let gate = ComplianceGate::new(
            Arc::new(SanctionsRoster::preloaded(Vec::new())),
            MatchPolicy::Either,
        );
        assert!(!gate.screen("John Doe", Some("Nowhereland"), 0).unwrap());
    }

    #[test]
    fn empty_name_does_not_crash() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        assert!(!gate.screen("", None, 80).unwrap());
        assert!(!gate.screen("", Some(""), 0).unwrap());
    }

    #[test]
    fn blank_country_is_ignored() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        assert_eq!(
            gate.screen("John Doe", Some("  "), 80).unwrap(),
            gate.screen("John Doe", None, 80).unwrap()
        );
    }

    #[test]
    fn country_narrows_candidates() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        // Name matches exactly, but the country is not a fuzzy candidate.
        assert!(!gate.screen("John Doe", Some("Freedonia"), 80).unwrap());
    }

    #[test]
    fn countryless_entry_is_judged_on_name() {
        let roster = Arc::new(SanctionsRoster::preloaded(vec![SanctionsEntry::new(
            "John Doe", "",
        )]));
        for policy in [MatchPolicy::Either, MatchPolicy::Both] {
            let gate = ComplianceGate::new(Arc::clone(&roster), policy);
            assert!(gate.screen("John Doe", None, 80).unwrap());
            assert!(gate.screen("John Doe", Some("Nowhereland"), 80).unwrap());
            let hits = gate.hits("John Doe", Some("Nowhereland"), 80).unwrap();
            assert_eq!(hits[0].country_score, None);
            assert!(!gate.screen("Jane Roe", Some("Nowhereland"), 80).unwrap());
        }
    }

    #[test]
    fn either_policy_hits_on_country_alone() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        // "Doe" is a weak name candidate; the exact country carries the hit.
        assert!(gate.screen("Doe", Some("Nowhereland"), 80).unwrap());
    }

    #[test]
    fn both_policy_requires_name_hit() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Both);
        assert!(!gate.screen("Doe", Some("Nowhereland"), 80).unwrap());
        assert!(gate.screen("John Doe", Some("Nowhereland"), 80).unwrap());
        assert!(gate.screen("John Doe", None, 80).unwrap());
    }

    #[test]
    fn hits_report_scores() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        let hits = gate.hits("Jon Doe", Some("Nowhereland"), 80).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name_score, 87);
        assert_eq!(hits[0].country_score, Some(100));
    }

    #[test]
    fn unloaded_roster_fails_closed() {
        let roster = Arc::new(SanctionsRoster::new(Arc::new(crate::StaticRoster::default())));
        let gate = ComplianceGate::new(roster, MatchPolicy::Either);
        assert!(matches!(
            gate.screen("Anyone", None, 80),
            Err(PfiError::RosterUnavailable { .. })
        ));
    }

    #[test]
    fn monotonic_in_threshold() {
        let gate = ComplianceGate::new(roster(), MatchPolicy::Either);
        let mut last = true;
        for min in 0..=100u8 {
            let hit = gate.screen("Ivan Petro", None, min).unwrap();
            assert!(last || !hit, "hit reappeared at {min}");
            last = hit;
        }
    }
}
