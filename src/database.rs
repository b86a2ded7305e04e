use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::info;

use crate::expiry::expiry_cutoff;
use crate::models::*;

const TIMEOUT_SETTING_KEY: &str = "timeout_minutes";

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

pub async fn setup_database(pool: SqlitePool) -> Result<SqlitePool> {
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

fn to_micros(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| anyhow!("Timestamp out of range: {micros}"))
}

fn location_from_row(row: &SqliteRow) -> Result<Location> {
    Ok(Location {
        id: row.get("id"),
        lat: row.get("lat"),
        lon: row.get("lon"),
        message: row.get("message"),
        created_at: from_micros(row.get("created_at"))?,
    })
}

fn checkin_from_row(row: &SqliteRow) -> Result<CheckinRecord> {
    let kind: String = row.get("actor_kind");
    let actor = Actor::from_parts(&kind, row.get("actor_id"))
        .ok_or_else(|| anyhow!("Unknown actor kind: {kind}"))?;
    let tags: String = row.get("tags");

    Ok(CheckinRecord {
        id: row.get("id"),
        location_id: row.get("location_id"),
        actor,
        tags: serde_json::from_str(&tags)?,
        created_at: from_micros(row.get("created_at"))?,
    })
}

pub async fn insert_location(
    pool: &SqlitePool,
    location: NewLocation,
    created_at: DateTime<Utc>,
) -> Result<Location> {
    let id: i64 = sqlx::query(
        "INSERT INTO locations (lat, lon, message, created_at)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(location.lat)
    .bind(location.lon)
    .bind(&location.message)
    .bind(to_micros(created_at))
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(Location {
        id,
        lat: location.lat,
        lon: location.lon,
        message: location.message,
        created_at: from_micros(to_micros(created_at))?,
    })
}

/// Deletes every location created before `now - timeout_minutes`, along with its check-ins.
///
/// The SQL filter is `expiry::is_expired` evaluated in the database: both compare against
/// `expiry_cutoff` with a strict `<`. Returns the number of locations removed.
pub async fn purge_expired(pool: &SqlitePool, timeout_minutes: u32, now: DateTime<Utc>) -> Result<u64> {
    let cutoff = to_micros(expiry_cutoff(now, timeout_minutes));
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM checkins
         WHERE location_id IN (SELECT id FROM locations WHERE created_at < $1)",
    )
    .bind(cutoff)
    .execute(&mut *tx)
    .await?;

    let removed = sqlx::query("DELETE FROM locations WHERE created_at < $1")
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    if removed > 0 {
        info!("Purged {removed} expired location(s) older than {timeout_minutes} minute(s)");
    }

    Ok(removed)
}

/// All stored locations in id order, each with its check-ins in insertion order.
pub async fn list_locations(pool: &SqlitePool) -> Result<Vec<(Location, Vec<CheckinRecord>)>> {
    let location_rows = sqlx::query(
        "SELECT id, lat, lon, message, created_at
         FROM locations
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let checkin_rows = sqlx::query(
        "SELECT id, location_id, actor_kind, actor_id, tags, created_at
         FROM checkins
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut checkins_by_location: HashMap<i64, Vec<CheckinRecord>> = HashMap::new();
    for row in &checkin_rows {
        let checkin = checkin_from_row(row)?;
        checkins_by_location
            .entry(checkin.location_id)
            .or_default()
            .push(checkin);
    }

    location_rows
        .iter()
        .map(|row| {
            let location = location_from_row(row)?;
            let checkins = checkins_by_location.remove(&location.id).unwrap_or_default();
            Ok((location, checkins))
        })
        .collect()
}

pub async fn location_exists(pool: &SqlitePool, location_id: i64) -> Result<bool> {
    let row = sqlx::query("SELECT 1 AS found FROM locations WHERE id = $1")
        .bind(location_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// Fails with a unique-constraint violation when the actor already checked in here.
pub async fn insert_checkin(
    pool: &SqlitePool,
    location_id: i64,
    checkin: NewCheckin,
    created_at: DateTime<Utc>,
) -> Result<CheckinRecord> {
    let tags = serde_json::to_string(&checkin.tags)?;

    let id: i64 = sqlx::query(
        "INSERT INTO checkins (location_id, actor_kind, actor_id, tags, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(location_id)
    .bind(checkin.actor.kind())
    .bind(checkin.actor.id())
    .bind(&tags)
    .bind(to_micros(created_at))
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(CheckinRecord {
        id,
        location_id,
        actor: checkin.actor,
        tags: checkin.tags,
        created_at: from_micros(to_micros(created_at))?,
    })
}

pub async fn get_timeout_setting(pool: &SqlitePool) -> Result<Option<u32>> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = $1")
        .bind(TIMEOUT_SETTING_KEY)
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        let value: String = row.get("value");
        value
            .parse()
            .map_err(|e| anyhow!("Stored timeout {value:?} is not a valid number: {e}"))
    })
    .transpose()
}

pub async fn set_timeout_setting(pool: &SqlitePool, timeout_minutes: u32) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value)
         VALUES ($1, $2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
    )
    .bind(TIMEOUT_SETTING_KEY)
    .bind(timeout_minutes.to_string())
    .execute(pool)
    .await?;

    Ok(())
}
