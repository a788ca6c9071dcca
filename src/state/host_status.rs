/// Host lifecycle states tracked by the frontier store
///
/// A host starts out `New` (it only exists as an entry in the new-host set),
/// becomes `Claimed` when a worker wins it, `Active` once its policy is
/// built, and ends `Completed` or, if its robots.txt could not be fetched,
/// `Abandoned`.
use std::fmt;

/// Represents where a host is in the claim lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostStatus {
    /// Discovered and waiting in the new-host set
    New,

    /// Won by a worker, policy not yet built
    Claimed,

    /// Worker is fetching pages for this host
    Active,

    /// Worker released the host after exhausting its queue or page cap
    Completed,

    /// Policy construction failed; the host is never claimed again
    Abandoned,
}

impl HostStatus {
    /// Returns true while a worker holds the claim
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Claimed | Self::Active)
    }

    /// Returns true if the host will never be claimed again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Converts the status to its stored string form
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Claimed => "claimed",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parses a stored status string
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "claimed" => Some(Self::Claimed),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
