use chrono::{DateTime, FixedOffset};

/// Timestamp layout used by `created_at` in archive exports,
/// e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Fields extracted from each archive entry, in ledger order.
pub const TWEET_FIELDS: [&str; 5] = [
    "id",
    "full_text",
    "created_at",
    "retweet_count",
    "favorite_count",
];

/// Raw string values of a tweet as they appear in the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TweetFields {
    pub id: String,
    pub full_text: String,
    pub created_at: String,
    pub retweet_count: String,
    pub favorite_count: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

/// One archived tweet with its typed fields parsed up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub status_id: u64,
    pub full_text: String,
    pub created_at: String,
    pub created: DateTime<FixedOffset>,
    pub retweet_count: u64,
    pub favorite_count: u64,
}

impl Record {
    pub fn parse(fields: TweetFields) -> Result<Self, FieldError> {
        let status_id = parse_count("id", &fields.id)?;
        let created = DateTime::parse_from_str(fields.created_at.trim(), CREATED_AT_FORMAT)
            .map_err(|e| FieldError {
                field: "created_at",
                reason: format!("{:?}: {}", fields.created_at, e),
            })?;
        let retweet_count = parse_count("retweet_count", &fields.retweet_count)?;
        let favorite_count = parse_count("favorite_count", &fields.favorite_count)?;

        Ok(Self {
            id: fields.id.trim().to_string(),
            status_id,
            full_text: fields.full_text,
            created_at: fields.created_at,
            created,
            retweet_count,
            favorite_count,
        })
    }

    /// `(name, value)` pairs in [`TWEET_FIELDS`] order.
    pub fn fields(&self) -> [(&'static str, String); 5] {
        [
            ("id", self.id.clone()),
            ("full_text", self.full_text.clone()),
            ("created_at", self.created_at.clone()),
            ("retweet_count", self.retweet_count.to_string()),
            ("favorite_count", self.favorite_count.to_string()),
        ]
    }
}

fn parse_count(field: &'static str, value: &str) -> Result<u64, FieldError> {
    value.trim().parse().map_err(|_| FieldError {
        field,
        reason: format!("expected a non-negative integer, got {:?}", value),
    })
}
