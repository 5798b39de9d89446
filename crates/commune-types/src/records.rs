//! Record models, one per collection.
//!
//! Field names serialise in camelCase. Identity fields are plain strings;
//! creation timestamps that take part in an identifier are Unix milliseconds
//! rendered in decimal.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::identity::Reference;
use crate::model::impl_model;

/// Current time as a decimal Unix-milliseconds string, for `createdAt` parts.
pub fn timestamp_now() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// Free-form service metadata (e.g. bookkeeping markers) keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub key: String,
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl_model!(Metadata, Collection::Metadata, Metadata, [key]);

/// One question/answer pair from an entry request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Votes {
    #[serde(default, rename = "for")]
    pub in_favour: Vec<String>,
    #[serde(default)]
    pub against: Vec<String>,
}

/// A request by a newcomer to be admitted to a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub guild_id: String,
    pub author_id: String,
    pub requested_role: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub votes: Votes,
    pub submitted_at: String,
    #[serde(default)]
    pub is_finalised: bool,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl_model!(EntryRequest, Collection::EntryRequests, EntryRequest, [guild_id, author_id]);

/// Running counters for a guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildStatistics {
    pub guild_id: String,
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl GuildStatistics {
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            counters: BTreeMap::new(),
            reference: None,
        }
    }

    /// Increment a named counter, returning the new value.
    pub fn increment(&mut self, counter: &str) -> u64 {
        let value = self.counters.entry(counter.to_string()).or_insert(0);
        *value += 1;
        *value
    }
}

impl_model!(GuildStatistics, Collection::GuildStatistics, GuildStatistics, [guild_id]);

/// Per-guild configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub guild_id: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl Guild {
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            language: None,
            features: BTreeMap::new(),
            reference: None,
        }
    }

    pub fn is_enabled(&self, feature: &str) -> bool {
        self.features.get(feature).copied().unwrap_or(false)
    }
}

impl_model!(Guild, Collection::Guilds, Guild, [guild_id]);

/// Thanks given by one member to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Praise {
    pub author_id: String,
    pub target_id: String,
    pub created_at: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl Praise {
    pub fn new(author_id: impl Into<String>, target_id: impl Into<String>, comment: Option<String>) -> Self {
        Self {
            author_id: author_id.into(),
            target_id: target_id.into(),
            created_at: timestamp_now(),
            comment,
            reference: None,
        }
    }
}

impl_model!(Praise, Collection::Praises, Praise, [author_id, target_id, created_at]);

/// A report of misconduct raised with guild moderators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub guild_id: String,
    pub author_id: String,
    pub created_at: String,
    #[serde(default)]
    pub reported_user_ids: Vec<String>,
    pub reason: String,
    #[serde(default)]
    pub message_link: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl Report {
    pub fn new(
        guild_id: impl Into<String>,
        author_id: impl Into<String>,
        reported_user_ids: Vec<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            author_id: author_id.into(),
            created_at: timestamp_now(),
            reported_user_ids,
            reason: reason.into(),
            message_link: None,
            is_resolved: false,
            reference: None,
        }
    }
}

impl_model!(Report, Collection::Reports, Report, [guild_id, author_id, created_at]);

/// A learning resource submitted for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub guild_id: String,
    pub author_id: String,
    pub created_at: String,
    pub url: String,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl Resource {
    pub fn new(guild_id: impl Into<String>, author_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            author_id: author_id.into(),
            created_at: timestamp_now(),
            url: url.into(),
            is_resolved: false,
            reference: None,
        }
    }
}

impl_model!(Resource, Collection::Resources, Resource, [guild_id, author_id, created_at]);

/// A suggestion for improving the guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub guild_id: String,
    pub author_id: String,
    pub created_at: String,
    pub suggestion: String,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl Suggestion {
    pub fn new(guild_id: impl Into<String>, author_id: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            author_id: author_id.into(),
            created_at: timestamp_now(),
            suggestion: suggestion.into(),
            is_resolved: false,
            reference: None,
        }
    }
}

impl_model!(Suggestion, Collection::Suggestions, Suggestion, [guild_id, author_id, created_at]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    Support,
    Inquiry,
}

/// A private support channel opened by a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub guild_id: String,
    pub author_id: String,
    pub channel_id: String,
    pub topic: String,
    #[serde(rename = "type")]
    pub kind: TicketKind,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl_model!(Ticket, Collection::Tickets, Ticket, [guild_id, author_id, channel_id]);

/// Per-user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            language: None,
            reference: None,
        }
    }
}

impl_model!(User, Collection::Users, User, [user_id]);

/// A moderator warning issued to a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub author_id: String,
    pub target_id: String,
    pub created_at: String,
    pub reason: String,
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(skip)]
    pub reference: Option<Reference>,
}

impl Warning {
    pub fn new(author_id: impl Into<String>, target_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            target_id: target_id.into(),
            created_at: timestamp_now(),
            reason: reason.into(),
            rule: None,
            reference: None,
        }
    }
}

impl_model!(Warning, Collection::Warnings, Warning, [author_id, target_id, created_at]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    #[test]
    fn test_resource_partial_id() {
        let mut resource = Resource::new("g1", "a1", "https://example.com");
        resource.created_at = "1700000000000".to_string();
        assert_eq!(resource.partial_id().unwrap().as_str(), "g1/a1/1700000000000");
    }

    #[test]
    fn test_id_parts_match_collection_arity() {
        let ticket = Ticket {
            guild_id: "g".to_string(),
            author_id: "a".to_string(),
            channel_id: "c".to_string(),
            topic: "help".to_string(),
            kind: TicketKind::Support,
            is_resolved: false,
            reference: None,
        };
        assert_eq!(ticket.id_parts().len(), Ticket::COLLECTION.id_arity());
        assert_eq!(User::new("u").id_parts().len(), User::COLLECTION.id_arity());
        assert_eq!(
            Praise::new("a", "t", None).id_parts().len(),
            Praise::COLLECTION.id_arity()
        );
    }

    #[test]
    fn test_reference_is_not_serialized() {
        let mut user = User::new("u1");
        user.set_reference(Some(Reference("rev-1".to_string())));
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, serde_json::json!({"userId": "u1", "language": null}));
    }

    #[test]
    fn test_ticket_kind_serializes_as_type() {
        let json = serde_json::json!({
            "guildId": "g",
            "authorId": "a",
            "channelId": "c",
            "topic": "billing",
            "type": "inquiry"
        });
        let ticket: Ticket = serde_json::from_value(json).unwrap();
        assert_eq!(ticket.kind, TicketKind::Inquiry);
        assert!(!ticket.is_resolved);
    }

    #[test]
    fn test_entry_request_votes_rename() {
        let json = serde_json::json!({
            "guildId": "g",
            "authorId": "a",
            "requestedRole": "member",
            "submittedAt": "1700000000000",
            "votes": {"for": ["m1"], "against": []}
        });
        let request: EntryRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.votes.in_favour, vec!["m1"]);
        assert!(request.answers.is_empty());
    }

    #[test]
    fn test_guild_statistics_increment() {
        let mut stats = GuildStatistics::new("g1");
        assert_eq!(stats.increment("praises"), 1);
        assert_eq!(stats.increment("praises"), 2);
        assert_eq!(stats.counters.get("praises"), Some(&2));
    }

    #[test]
    fn test_guild_feature_defaults_off() {
        let mut guild = Guild::new("g1");
        assert!(!guild.is_enabled("suggestions"));
        guild.features.insert("suggestions".to_string(), true);
        assert!(guild.is_enabled("suggestions"));
    }
}
