//! Collection tags.
//!
//! Every persisted record belongs to exactly one collection from a closed set.
//! The tag carries everything the storage layer needs to know about a
//! collection without looking at a record: its wire name, how many parts its
//! identifier has, how the store caches it, and whether it is prefetched.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// A logical table of records of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Collection {
    Metadata,
    EntryRequests,
    GuildStatistics,
    Guilds,
    Praises,
    Reports,
    Resources,
    Suggestions,
    Tickets,
    Users,
    Warnings,
}

/// How the store keys a collection's records in its cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheShape {
    /// `partialId -> record`.
    Flat,
    /// Cached twice: `authorId -> partialId -> record` and
    /// `targetId -> partialId -> record`.
    AuthorAndTarget,
    /// `targetId -> partialId -> record`.
    Target,
}

impl Collection {
    /// Every collection, in declaration order.
    pub const ALL: [Collection; 11] = [
        Collection::Metadata,
        Collection::EntryRequests,
        Collection::GuildStatistics,
        Collection::Guilds,
        Collection::Praises,
        Collection::Reports,
        Collection::Resources,
        Collection::Suggestions,
        Collection::Tickets,
        Collection::Users,
        Collection::Warnings,
    ];

    /// Collections loaded in full when the store starts with prefetching on.
    pub const PREFETCHED: [Collection; 5] = [
        Collection::EntryRequests,
        Collection::Reports,
        Collection::Resources,
        Collection::Suggestions,
        Collection::Tickets,
    ];

    /// Wire name, as used for collection, database and document names.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Metadata => "metadata",
            Collection::EntryRequests => "entry-requests",
            Collection::GuildStatistics => "guild-statistics",
            Collection::Guilds => "guilds",
            Collection::Praises => "praises",
            Collection::Reports => "reports",
            Collection::Resources => "resources",
            Collection::Suggestions => "suggestions",
            Collection::Tickets => "tickets",
            Collection::Users => "users",
            Collection::Warnings => "warnings",
        }
    }

    /// Name usable as an unquoted SQL identifier (`entry-requests` -> `entry_requests`).
    pub fn table_name(&self) -> String {
        self.name().replace('-', "_")
    }

    /// Number of parts in this collection's partial identifiers.
    pub fn id_arity(&self) -> usize {
        match self {
            Collection::Metadata
            | Collection::GuildStatistics
            | Collection::Guilds
            | Collection::Users => 1,
            Collection::EntryRequests => 2,
            Collection::Praises
            | Collection::Reports
            | Collection::Resources
            | Collection::Suggestions
            | Collection::Tickets
            | Collection::Warnings => 3,
        }
    }

    pub fn cache_shape(&self) -> CacheShape {
        match self {
            Collection::Praises => CacheShape::AuthorAndTarget,
            Collection::Warnings => CacheShape::Target,
            _ => CacheShape::Flat,
        }
    }

    pub fn is_prefetched(&self) -> bool {
        Self::PREFETCHED.contains(self)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .find(|collection| collection.name() == s.to_lowercase())
            .copied()
            .ok_or_else(|| format!("unknown collection: '{s}'"))
    }
}
