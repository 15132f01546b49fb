//! Message-based classification of backend errors.
//!
//! Backend clients report many transient conditions only through the
//! error message. The table below maps case-insensitive substrings to a
//! closed set of outcomes; it can be extended without touching the
//! provider's control flow.

/// Outcome of matching an error message against the known-error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Known condition with a more actionable message for operators.
    Friendly(&'static str),
    /// Known condition; log the raw message and move on.
    Suppress,
}

impl Classification {
    /// The line to log for `raw`.
    pub fn render(self, raw: &str) -> String {
        match self {
            Classification::Friendly(msg) => msg.to_string(),
            Classification::Suppress => raw.to_string(),
        }
    }
}

const MISSING_CONTAINER: &str = "Please check that the monitored container and the lease \
container exist and are configured correctly for this function.";

/// Known backend error substrings.
pub const KNOWN_ERRORS: &[(&str, Classification)] = &[
    ("Resource Not Found", Classification::Friendly(MISSING_CONTAINER)),
    (
        "The input authorization token can't serve the request",
        Classification::Suppress,
    ),
    (
        "The MAC signature found in the HTTP request is not the same",
        Classification::Suppress,
    ),
    ("Service is currently unavailable.", Classification::Suppress),
    (
        "Entity with the specified id does not exist in the system.",
        Classification::Suppress,
    ),
    (
        "Subscription owning the database account is disabled.",
        Classification::Suppress,
    ),
    ("Request rate is large", Classification::Suppress),
    ("PartitionKeyRangeGone", Classification::Suppress),
    ("ServiceUnavailable", Classification::Suppress),
    (
        "Resource with specified id or name already exists.",
        Classification::Suppress,
    ),
    (
        "The specified document collection is invalid.",
        Classification::Suppress,
    ),
];

/// Look `message` up in [`KNOWN_ERRORS`].
///
/// Matching is case-insensitive; when several entries match, the last one
/// in the table wins.
pub fn classify_message(message: &str) -> Option<Classification> {
    if message.is_empty() {
        return None;
    }
    let haystack = message.to_lowercase();
    KNOWN_ERRORS
        .iter()
        .rev()
        .find(|(pattern, _)| haystack.contains(&pattern.to_lowercase()))
        .map(|(_, class)| *class)
}
