use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};

use crate::error::{AppError, AppResult};

pub(crate) const EVENT_COLUMNS: &str =
    "id, club_id, title, description, date, image, event_type";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Workshop,
    Conference,
    Competition,
    Training,
    Social,
    #[default]
    Other,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Workshop => "WORKSHOP",
            EventType::Conference => "CONFERENCE",
            EventType::Competition => "COMPETITION",
            EventType::Training => "TRAINING",
            EventType::Social => "SOCIAL",
            EventType::Other => "OTHER",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WORKSHOP" => Ok(EventType::Workshop),
            "CONFERENCE" => Ok(EventType::Conference),
            "COMPETITION" => Ok(EventType::Competition),
            "TRAINING" => Ok(EventType::Training),
            "SOCIAL" => Ok(EventType::Social),
            "OTHER" => Ok(EventType::Other),
            _ => Err(AppError::bad_request(format!("unknown event type: {s}"))),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub club_id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub image: Option<String>,
    pub event_type: EventType,
}

impl Event {
    pub async fn from_id(id: i64, db: &mut SqliteConnection) -> AppResult<Option<Self>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;

        Ok(event)
    }

    pub async fn require(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::not_found("Event not found"))
    }

    pub async fn require_reference(id: i64, db: &mut SqliteConnection) -> AppResult<Self> {
        Self::from_id(id, db)
            .await?
            .ok_or_else(|| AppError::bad_request(format!("event {id} does not exist")))
    }

    pub async fn list_for_club(club_id: i64, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE club_id = ? ORDER BY date, id"
        ))
        .bind(club_id)
        .fetch_all(db)
        .await?;

        Ok(events)
    }

    pub async fn list_by_type(
        event_type: EventType,
        db: &mut SqliteConnection,
    ) -> AppResult<Vec<Self>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE event_type = ? ORDER BY date, id"
        ))
        .bind(event_type)
        .fetch_all(db)
        .await?;

        Ok(events)
    }

    /// Events dated strictly after `after`, soonest first.
    pub async fn upcoming(after: NaiveDate, db: &mut SqliteConnection) -> AppResult<Vec<Self>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE date > ? ORDER BY date, id"
        ))
        .bind(after)
        .fetch_all(db)
        .await?;

        Ok(events)
    }
}
