//! Membership stint reconciliation.
//!
//! MusicBrainz reports membership dates at whatever precision editors
//! entered ("1969", "1969-09", "1969-09-26"). Reconciliation is a partial
//! order over the raw strings via prefix: an incoming stint either matches
//! an existing one exactly, refines a compatible one with strictly more
//! precision, or is a genuinely new stint.

use uuid::Uuid;

use crate::dates;
use crate::model::catalog::GroupMembership;

#[derive(Clone, Debug)]
pub struct StintCandidate {
    pub begin_raw: Option<String>,
    pub end_raw: Option<String>,
    pub ended: bool,
}

impl StintCandidate {
    pub fn new(begin: Option<String>, end: Option<String>, ended: bool) -> Self {
        Self {
            begin_raw: begin.filter(|s| !s.trim().is_empty()),
            end_raw: end.filter(|s| !s.trim().is_empty()),
            ended,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StintDecision {
    NoChange,
    /// Exact date match; only the ended flag moved.
    SetEnded { id: Uuid, ended: bool },
    /// A compatible stint gains precision (and/or a new ended flag).
    Update {
        id: Uuid,
        begin_raw: Option<String>,
        end_raw: Option<String>,
        ended: bool,
    },
    Insert,
}

/// Reconcile a candidate against the existing stints for one
/// (member, group) pair.
pub fn decide(existing: &[GroupMembership], candidate: &StintCandidate) -> StintDecision {
    // Exact raw-date match wins outright.
    for stint in existing {
        if raw_eq(stint.begin_date_raw.as_deref(), candidate.begin_raw.as_deref())
            && raw_eq(stint.end_date_raw.as_deref(), candidate.end_raw.as_deref())
        {
            if stint.ended != candidate.ended {
                return StintDecision::SetEnded {
                    id: stint.id,
                    ended: candidate.ended,
                };
            }
            return StintDecision::NoChange;
        }
    }

    // Otherwise look for a stint both of whose endpoints are prefix-
    // compatible with the candidate's.
    for stint in existing {
        let begin_ok = dates::compatible(
            candidate.begin_raw.as_deref(),
            stint.begin_date_raw.as_deref(),
        );
        let end_ok =
            dates::compatible(candidate.end_raw.as_deref(), stint.end_date_raw.as_deref());
        if !(begin_ok && end_ok) {
            continue;
        }

        let begin_refines = dates::refines(
            candidate.begin_raw.as_deref(),
            stint.begin_date_raw.as_deref(),
        );
        let end_refines =
            dates::refines(candidate.end_raw.as_deref(), stint.end_date_raw.as_deref());

        if begin_refines || end_refines || stint.ended != candidate.ended {
            let begin_raw = if begin_refines {
                candidate.begin_raw.clone()
            } else {
                stint.begin_date_raw.clone()
            };
            let end_raw = if end_refines {
                candidate.end_raw.clone()
            } else {
                stint.end_date_raw.clone()
            };
            return StintDecision::Update {
                id: stint.id,
                begin_raw,
                end_raw,
                ended: candidate.ended,
            };
        }
        // Compatible but carrying no new information.
        return StintDecision::NoChange;
    }

    StintDecision::Insert
}

fn raw_eq(a: Option<&str>, b: Option<&str>) -> bool {
    fn norm(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|s| !s.is_empty())
    }
    norm(a) == norm(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtistId;
    use chrono::Utc;

    fn stint(begin: Option<&str>, end: Option<&str>, ended: bool) -> GroupMembership {
        GroupMembership {
            id: Uuid::new_v4(),
            member_id: ArtistId::new(),
            group_id: ArtistId::new(),
            begin_date: begin.and_then(crate::dates::normalize),
            end_date: end.and_then(crate::dates::normalize),
            begin_date_raw: begin.map(str::to_string),
            end_date_raw: end.map(str::to_string),
            ended,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn candidate(begin: Option<&str>, end: Option<&str>, ended: bool) -> StintCandidate {
        StintCandidate::new(
            begin.map(str::to_string),
            end.map(str::to_string),
            ended,
        )
    }

    #[test]
    fn exact_match_is_a_no_op() {
        let existing = vec![stint(Some("2001"), None, false)];
        assert_eq!(
            decide(&existing, &candidate(Some("2001"), None, false)),
            StintDecision::NoChange
        );
    }

    #[test]
    fn exact_match_updates_only_ended() {
        let existing = vec![stint(Some("2001"), Some("2005"), false)];
        let decision = decide(&existing, &candidate(Some("2001"), Some("2005"), true));
        assert_eq!(
            decision,
            StintDecision::SetEnded {
                id: existing[0].id,
                ended: true
            }
        );
    }

    #[test]
    fn more_precise_begin_refines_in_place() {
        let existing = vec![stint(Some("2001"), None, false)];
        let decision = decide(&existing, &candidate(Some("2001-06-15"), None, false));
        assert_eq!(
            decision,
            StintDecision::Update {
                id: existing[0].id,
                begin_raw: Some("2001-06-15".to_string()),
                end_raw: None,
                ended: false,
            }
        );
    }

    #[test]
    fn less_precise_candidate_does_not_downgrade() {
        let existing = vec![stint(Some("2001-06-15"), None, false)];
        assert_eq!(
            decide(&existing, &candidate(Some("2001"), None, false)),
            StintDecision::NoChange
        );
    }

    #[test]
    fn incompatible_dates_insert_a_second_stint() {
        // A leave-and-rejoin: different era entirely.
        let existing = vec![stint(Some("1995"), Some("1999"), true)];
        assert_eq!(
            decide(&existing, &candidate(Some("2004"), None, false)),
            StintDecision::Insert
        );
    }

    #[test]
    fn empty_candidate_refines_nothing_but_matches() {
        let existing = vec![stint(Some("2001"), None, false)];
        // Null dates are compatible with everything and refine nothing.
        assert_eq!(
            decide(&existing, &candidate(None, None, false)),
            StintDecision::NoChange
        );
    }

    #[test]
    fn no_stints_means_insert() {
        assert_eq!(
            decide(&[], &candidate(Some("2001"), None, false)),
            StintDecision::Insert
        );
    }

    #[test]
    fn refinement_preserves_unrefined_endpoint() {
        let existing = vec![stint(Some("2001"), Some("2009-05"), true)];
        let decision = decide(
            &existing,
            &candidate(Some("2001-06"), Some("2009"), true),
        );
        assert_eq!(
            decision,
            StintDecision::Update {
                id: existing[0].id,
                begin_raw: Some("2001-06".to_string()),
                // Candidate end is *less* precise; stored value stays.
                end_raw: Some("2009-05".to_string()),
                ended: true,
            }
        );
    }
}
