//! Conflict arbitration for display names and phone/linked-id links.

use crate::types::ContactSource;

/// Name currently held by a record, or offered by an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameClaim<'a> {
    pub name: Option<&'a str>,
    pub source: ContactSource,
}

/// Outcome of [`arbitrate_name`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameDecision {
    pub display_name: Option<String>,
    pub source: ContactSource,
    /// Both sides named and the names differed
    pub conflict: bool,
}

/// Pick the display name (and its source) a record keeps.
///
/// - an incoming observation without a name never clears one
/// - an existing `ManualSeed` name is terminal
/// - an existing `MessageEvent` name is never replaced by a `ContactEvent`
/// - otherwise the incoming name wins
pub fn arbitrate_name(existing: Option<NameClaim<'_>>, incoming: NameClaim<'_>) -> NameDecision {
    let Some(existing) = existing else {
        return take(incoming, false);
    };
    let (Some(current), Some(offered)) = (existing.name, incoming.name) else {
        return if existing.name.is_some() {
            take(existing, false)
        } else {
            take(incoming, false)
        };
    };

    let conflict = current != offered;
    if blocks(existing.source, incoming.source) {
        take(existing, conflict)
    } else {
        take(incoming, conflict)
    }
}

fn blocks(existing: ContactSource, incoming: ContactSource) -> bool {
    match existing {
        ContactSource::ManualSeed => incoming != ContactSource::ManualSeed,
        ContactSource::MessageEvent => incoming == ContactSource::ContactEvent,
        ContactSource::RosterScan | ContactSource::ContactEvent => false,
    }
}

fn take(claim: NameClaim<'_>, conflict: bool) -> NameDecision {
    NameDecision {
        display_name: claim.name.map(str::to_string),
        source: claim.source,
        conflict,
    }
}

/// Whether a link index entry may be (re)written with `incoming`.
///
/// Last write wins, except that a self-equivalent link (a linked id standing in as its own
/// phone, learned from a bare `digits@linked` id) never displaces an entry pointing
/// elsewhere.
pub fn link_may_replace(existing: Option<&str>, incoming: &str, self_equivalent: bool) -> bool {
    match existing {
        Some(current) if current != incoming => !self_equivalent,
        _ => true,
    }
}

/// Sources whose names survive the duplicate-name cleanup.
pub(crate) const fn keeps_name_on_dedupe(source: ContactSource) -> bool {
    matches!(
        source,
        ContactSource::MessageEvent | ContactSource::ManualSeed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn claim(name: Option<&str>, source: ContactSource) -> NameClaim<'_> {
        NameClaim { name, source }
    }

    #[test]
    fn first_name_is_taken() {
        let decision = arbitrate_name(None, claim(Some("Bob"), ContactSource::ContactEvent));
        assert_eq!(decision.display_name.as_deref(), Some("Bob"));
        assert_eq!(decision.source, ContactSource::ContactEvent);
        assert!(!decision.conflict);
    }

    #[test]
    fn message_beats_contact_event() {
        let up = arbitrate_name(
            Some(claim(Some("Bob"), ContactSource::ContactEvent)),
            claim(Some("Robert"), ContactSource::MessageEvent),
        );
        assert_eq!(up.display_name.as_deref(), Some("Robert"));
        assert!(up.conflict);

        let down = arbitrate_name(
            Some(claim(Some("Robert"), ContactSource::MessageEvent)),
            claim(Some("Bobby"), ContactSource::ContactEvent),
        );
        assert_eq!(down.display_name.as_deref(), Some("Robert"));
        assert_eq!(down.source, ContactSource::MessageEvent);
    }

    #[test]
    fn equal_contact_event_name_does_not_downgrade_source() {
        let decision = arbitrate_name(
            Some(claim(Some("Robert"), ContactSource::MessageEvent)),
            claim(Some("Robert"), ContactSource::ContactEvent),
        );
        assert_eq!(decision.source, ContactSource::MessageEvent);
        assert!(!decision.conflict);
    }

    #[test]
    fn manual_seed_is_terminal() {
        for source in [
            ContactSource::RosterScan,
            ContactSource::MessageEvent,
            ContactSource::ContactEvent,
        ] {
            let decision = arbitrate_name(
                Some(claim(Some("Widji"), ContactSource::ManualSeed)),
                claim(Some("Other"), source),
            );
            assert_eq!(decision.display_name.as_deref(), Some("Widji"));
            assert_eq!(decision.source, ContactSource::ManualSeed);
        }
    }

    #[test]
    fn missing_incoming_name_keeps_existing() {
        let decision = arbitrate_name(
            Some(claim(Some("Ann"), ContactSource::ContactEvent)),
            claim(None, ContactSource::RosterScan),
        );
        assert_eq!(decision.display_name.as_deref(), Some("Ann"));
        assert_eq!(decision.source, ContactSource::ContactEvent);
    }

    #[test]
    fn unnamed_existing_takes_incoming_source() {
        let decision = arbitrate_name(
            Some(claim(None, ContactSource::ManualSeed)),
            claim(Some("Ann"), ContactSource::ContactEvent),
        );
        assert_eq!(decision.display_name.as_deref(), Some("Ann"));
        assert_eq!(decision.source, ContactSource::ContactEvent);
    }

    #[test]
    fn equal_priority_incoming_wins() {
        let decision = arbitrate_name(
            Some(claim(Some("Old"), ContactSource::RosterScan)),
            claim(Some("New"), ContactSource::RosterScan),
        );
        assert_eq!(decision.display_name.as_deref(), Some("New"));
    }

    #[test]
    fn self_equivalent_link_does_not_displace_real_one() {
        assert!(link_may_replace(None, "8044", true));
        assert!(link_may_replace(Some("8044"), "8044", true));
        assert!(!link_may_replace(Some("6285"), "8044", true));
        assert!(link_may_replace(Some("6285"), "6299", false));
    }
}
