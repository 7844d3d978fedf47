//! Deserializers for request fields.
//!
//! License payloads arrive either as JSON or as multipart form fields, where
//! every value is text. These helpers accept both shapes for the typed fields.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, de::Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOr<T> {
    Value(T),
    Text(String),
}

/// Deserialize a double Option field where:
/// - Field absent → None (don't update)
/// - Field present with null → Some(None) (clear the column)
/// - Field present with value → Some(Some(value)) (set to value)
pub fn optional_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<T> = Option::deserialize(deserializer)?;
    Ok(Some(value))
}

/// Parse a timestamp from Unix seconds, `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::MIN).and_utc().timestamp());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn timestamp_value<E: Error>(value: TextOr<i64>) -> Result<i64, E> {
    let secs = match value {
        TextOr::Value(secs) => secs,
        TextOr::Text(text) => parse_timestamp(&text)
            .ok_or_else(|| E::custom(format!("invalid date '{}'", text)))?,
    };
    if DateTime::from_timestamp(secs, 0).is_none() {
        return Err(E::custom(format!("date out of range: {}", secs)));
    }
    Ok(secs)
}

fn bool_value<E: Error>(value: TextOr<bool>) -> Result<bool, E> {
    match value {
        TextOr::Value(b) => Ok(b),
        TextOr::Text(text) => {
            parse_bool(&text).ok_or_else(|| E::custom(format!("invalid boolean '{}'", text)))
        }
    }
}

fn number_value<E: Error>(value: TextOr<f64>) -> Result<f64, E> {
    match value {
        TextOr::Value(n) => Ok(n),
        TextOr::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid number '{}'", text))),
    }
}

pub fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    timestamp_value(TextOr::deserialize(deserializer)?)
}

pub fn optional_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<TextOr<i64>>::deserialize(deserializer)?
        .map(timestamp_value)
        .transpose()
}

pub fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    bool_value(TextOr::deserialize(deserializer)?)
}

pub fn optional_flexible_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<bool>, D::Error> {
    Option::<TextOr<bool>>::deserialize(deserializer)?
        .map(bool_value)
        .transpose()
}

pub fn flexible_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    number_value(TextOr::deserialize(deserializer)?)
}

pub fn optional_flexible_f64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    Option::<TextOr<f64>>::deserialize(deserializer)?
        .map(number_value)
        .transpose()
}

/// Filter values from a query string: an empty value counts as absent.
pub fn non_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Option::<String>::deserialize(deserializer)?
        .filter(|text| !text.is_empty())
        .map(|text| text.parse().map_err(D::Error::custom))
        .transpose()
}
