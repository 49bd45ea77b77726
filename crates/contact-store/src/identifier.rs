use serde::{Deserialize, Serialize};

/// Domain suffixes the platform appends to raw identifiers.
///
/// `linked_domain` doubles as the linked-id marker: an id ending in
/// `@{linked_domain}` is routed through the alternate identifier space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierScheme {
    /// Suffix of phone-routed ids (`digits@phone_domain`)
    pub phone_domain: String,

    /// Suffix of linked-id-routed ids (`digits@linked_domain`)
    pub linked_domain: String,

    /// Suffix of multi-party chat ids
    pub group_domain: String,
}

impl Default for IdentifierScheme {
    fn default() -> Self {
        Self {
            phone_domain: "s.whatsapp.net".to_string(),
            linked_domain: "lid".to_string(),
            group_domain: "g.us".to_string(),
        }
    }
}

/// Classification of one raw identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Plain phone digits.
    Phone { phone: String },

    /// Alternate identifier. `phone` is the usable phone-equivalent key when one can be
    /// read off the id itself (device-suffixed ids, or bare digits behind the marker).
    Linked {
        linked_id: String,
        phone: Option<String>,
    },

    /// Nothing recognisable; the stripped string is only usable as an opaque key.
    Ambiguous(String),
}

impl Identifier {
    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        match self {
            Self::Phone { phone } => Some(phone),
            Self::Linked { phone, .. } => phone.as_deref(),
            Self::Ambiguous(_) => None,
        }
    }

    #[must_use]
    pub fn linked_id(&self) -> Option<&str> {
        match self {
            Self::Linked { linked_id, .. } => Some(linked_id),
            Self::Phone { .. } | Self::Ambiguous(_) => None,
        }
    }

    /// Key to index this identifier under when no phone could be resolved.
    #[must_use]
    pub fn opaque_key(&self) -> &str {
        match self {
            Self::Phone { phone } => phone,
            Self::Linked {
                phone: Some(phone), ..
            } => phone,
            Self::Linked { linked_id, .. } => linked_id,
            Self::Ambiguous(raw) => raw,
        }
    }
}

impl IdentifierScheme {
    pub fn new(
        phone_domain: impl Into<String>,
        linked_domain: impl Into<String>,
        group_domain: impl Into<String>,
    ) -> Self {
        Self {
            phone_domain: phone_domain.into(),
            linked_domain: linked_domain.into(),
            group_domain: group_domain.into(),
        }
    }

    pub fn classify(&self, raw: &str) -> Identifier {
        let stripped = strip_domain(raw);

        if stripped.contains(|c: char| c == ':' || c == '.') {
            let digits: String = stripped.chars().take_while(char::is_ascii_digit).collect();
            let phone = (!digits.is_empty()).then_some(digits);
            return Identifier::Linked {
                linked_id: stripped.to_string(),
                phone,
            };
        }

        if self.has_linked_marker(raw) {
            let phone = is_all_digits(stripped).then(|| stripped.to_string());
            return Identifier::Linked {
                linked_id: stripped.to_string(),
                phone,
            };
        }

        if is_all_digits(stripped) {
            return Identifier::Phone {
                phone: stripped.to_string(),
            };
        }

        Identifier::Ambiguous(stripped.to_string())
    }

    pub fn has_linked_marker(&self, raw: &str) -> bool {
        has_domain(raw, &self.linked_domain)
    }

    pub fn is_group(&self, raw: &str) -> bool {
        has_domain(raw, &self.group_domain)
    }

    pub fn is_phone_routed(&self, raw: &str) -> bool {
        has_domain(raw, &self.phone_domain)
    }

    #[must_use]
    pub fn phone_jid(&self, phone: &str) -> String {
        format!("{phone}@{}", self.phone_domain)
    }

    #[must_use]
    pub fn linked_jid(&self, linked_id: &str) -> String {
        format!("{linked_id}@{}", self.linked_domain)
    }
}

/// Phone (or phone-equivalent key) for a raw id.
///
/// Unresolvable ids come back as the stripped string so callers can still key on them.
/// `None` only for empty input.
pub fn extract_phone(scheme: &IdentifierScheme, id: &str) -> Option<String> {
    if id.is_empty() {
        return None;
    }
    Some(scheme.classify(id).opaque_key().to_string())
}

pub fn extract_linked_id(scheme: &IdentifierScheme, id: &str) -> Option<String> {
    if id.is_empty() {
        return None;
    }
    scheme.classify(id).linked_id().map(str::to_string)
}

/// Drop everything from the first `@`.
pub fn strip_domain(id: &str) -> &str {
    id.split_once('@').map_or(id, |(head, _)| head)
}

fn has_domain(raw: &str, domain: &str) -> bool {
    raw.strip_suffix(domain)
        .is_some_and(|head| head.ends_with('@'))
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
