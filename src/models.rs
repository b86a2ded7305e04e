use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::tags::{aggregate_tags, TagStats};
use crate::time_weights::{heat_score, HeatConfig};

pub const MAX_MESSAGE_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Food,
    Nature,
    Sport,
    Party,
    Culture,
}

impl Tag {
    pub const ALL: [Tag; 5] = [Tag::Food, Tag::Nature, Tag::Sport, Tag::Party, Tag::Culture];

    pub fn as_str(self) -> &'static str {
        match self {
            Tag::Food => "food",
            Tag::Nature => "nature",
            Tag::Sport => "sport",
            Tag::Party => "party",
            Tag::Culture => "culture",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown tag: {s}")))
    }
}

/// Who made a check-in: a device token kept client-side, or a signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Anonymous(String),
    Account(String),
}

impl Actor {
    pub fn kind(&self) -> &'static str {
        match self {
            Actor::Anonymous(_) => "anonymous",
            Actor::Account(_) => "account",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Actor::Anonymous(id) | Actor::Account(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: String) -> Option<Self> {
        match kind {
            "anonymous" => Some(Actor::Anonymous(id)),
            "account" => Some(Actor::Account(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub id: i64,
    pub location_id: i64,
    pub actor: Actor,
    pub tags: Vec<Tag>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationSubmission {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub lat: f64,
    pub lon: f64,
    pub message: String,
}

impl LocationSubmission {
    pub fn validate(self) -> Result<NewLocation, AppError> {
        let (Some(lat), Some(lon), Some(message)) = (self.lat, self.lon, self.message) else {
            return Err(AppError::InvalidInput("Missing required fields".to_string()));
        };

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::InvalidInput("Invalid coordinates".to_string()));
        }

        let message = message.trim().to_string();
        if message.is_empty() {
            return Err(AppError::InvalidInput("Message must not be empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::InvalidInput(format!(
                "Message longer than {MAX_MESSAGE_LEN} characters"
            )));
        }

        Ok(NewLocation { lat, lon, message })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckinSubmission {
    pub actor: Option<Actor>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutSubmission {
    pub actor: Option<Actor>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckin {
    pub actor: Actor,
    pub tags: Vec<Tag>,
}

impl CheckinSubmission {
    pub fn validate(self) -> Result<NewCheckin, AppError> {
        let actor = validate_actor(self.actor)?;

        let mut tags = Vec::new();
        for raw in self.tags.unwrap_or_default() {
            let tag: Tag = raw.trim().parse()?;
            if tags.contains(&tag) {
                return Err(AppError::InvalidInput(format!("Duplicate tag: {tag}")));
            }
            tags.push(tag);
        }

        Ok(NewCheckin { actor, tags })
    }
}

impl CheckoutSubmission {
    pub fn validate(self) -> Result<NewCheckin, AppError> {
        Ok(NewCheckin {
            actor: validate_actor(self.actor)?,
            tags: Vec::new(),
        })
    }
}

fn validate_actor(actor: Option<Actor>) -> Result<Actor, AppError> {
    let actor = actor.ok_or_else(|| AppError::InvalidInput("Missing actor".to_string()))?;
    if actor.id().trim().is_empty() {
        return Err(AppError::InvalidInput("Actor id must not be empty".to_string()));
    }
    Ok(actor)
}

/// Location as returned by the list endpoint, with its check-in history summarised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationView {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub checkin_count: usize,
    pub checkin_history: Vec<CheckinRecord>,
    pub tag_percentages: BTreeMap<Tag, f64>,
    pub most_common_tag: Option<Tag>,
}

impl LocationView {
    pub fn new(location: Location, checkins: Vec<CheckinRecord>) -> Self {
        let TagStats {
            tag_percentages,
            most_common_tag,
        } = aggregate_tags(&checkins);

        Self {
            id: location.id,
            lat: location.lat,
            lon: location.lon,
            message: location.message,
            timestamp: location.created_at,
            checkin_count: checkins.len(),
            checkin_history: checkins,
            tag_percentages,
            most_common_tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub heat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLocation {
    #[serde(flatten)]
    pub location: LocationView,
    pub scores: Scores,
}

pub fn score_location(location: LocationView, now: DateTime<Utc>, config: &HeatConfig) -> ScoredLocation {
    let heat = heat_score(&location.checkin_history, now, config);
    ScoredLocation {
        location,
        scores: Scores { heat },
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeoutSetting {
    pub timeout: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeoutSubmission {
    pub timeout: Option<i64>,
}

impl TimeoutSubmission {
    pub fn validate(self) -> Result<u32, AppError> {
        self.timeout
            .and_then(|timeout| u32::try_from(timeout).ok())
            .ok_or_else(|| AppError::InvalidInput("Invalid timeout value".to_string()))
    }
}
