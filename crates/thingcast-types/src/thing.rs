//! The [`Thing`] snapshot.
//!
//! A thing is immutable once built. Mutating a thing means building a new
//! snapshot under the same id and replacing the stored one wholesale.
//!
//! # Representations
//!
//! Besides JSON, a thing renders as:
//!
//! | Mime | Body |
//! |------|------|
//! | `text/plain` | `Thing a which is a green car created at 2021-04-17T15:01:14.498166+00:00.` |
//! | `text/html` | the same sentence inside an HTML document, the color span styled in its own color |
//!
//! Neither representation can be parsed back into a thing.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thingcast_repr::{Capability, ReprError, Representable, RepresentationKind};
use ts_rs::TS;

use crate::enums::{ThingColor, ThingType};
use crate::ids::ThingId;

/// Timestamp of the documentation sample (`2021-04-17T15:01:14.498166Z`).
const SAMPLE_CREATED_MICROS: i64 = 1_618_671_674_498_166;

/// A snapshot of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Thing {
    /// Stable identifier.
    #[ts(type = "string")]
    pub id: ThingId,
    /// Color attribute.
    pub color: ThingColor,
    /// Type attribute.
    #[serde(rename = "type")]
    pub kind: ThingType,
    /// When this snapshot was generated (microsecond precision, UTC).
    #[serde(with = "created_format")]
    #[ts(type = "string")]
    pub created: DateTime<Utc>,
}

impl Thing {
    /// Build a snapshot, truncating `created` to microseconds so the JSON
    /// form round-trips exactly.
    pub fn new(id: ThingId, color: ThingColor, kind: ThingType, created: DateTime<Utc>) -> Self {
        Self {
            id,
            color,
            kind,
            created: created.trunc_subsecs(6),
        }
    }

    /// Build a snapshot with random attributes created at `created`.
    pub fn new_random<R: Rng + ?Sized>(id: ThingId, created: DateTime<Utc>, rng: &mut R) -> Self {
        let color = ThingColor::random(rng);
        let kind = ThingType::random(rng);
        Self::new(id, color, kind, created)
    }

    /// The creation timestamp as ISO 8601 with an explicit `+00:00` offset.
    pub fn created_iso(&self) -> String {
        self.created.to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    /// One line plain text summary.
    pub fn to_text_plain(&self) -> String {
        format!(
            "Thing {} which is a {} {} created at {}.",
            self.id,
            self.color,
            self.kind,
            self.created_iso()
        )
    }

    /// HTML summary document.
    pub fn to_text_html(&self) -> String {
        format!(
            "<html><body><h1>Thing {id} which is a \
             <span style=\"color:{color}\">{color} {kind}</span> \
             created at {created}.</body></html>",
            id = self.id,
            color = self.color,
            kind = self.kind,
            created = self.created_iso(),
        )
    }
}

fn encode_text_plain(thing: &Thing) -> Result<Vec<u8>, ReprError> {
    Ok(thing.to_text_plain().into_bytes())
}

fn encode_text_html(thing: &Thing) -> Result<Vec<u8>, ReprError> {
    Ok(thing.to_text_html().into_bytes())
}

impl Representable for Thing {
    fn capability(kind: RepresentationKind) -> Option<Capability<Self>> {
        match kind {
            RepresentationKind::TextPlain => Some(Capability::encode_only(kind, encode_text_plain)),
            RepresentationKind::TextHtml => Some(Capability::encode_only(kind, encode_text_html)),
        }
    }

    fn sample() -> Self {
        let created =
            DateTime::from_timestamp_micros(SAMPLE_CREATED_MICROS).unwrap_or(DateTime::UNIX_EPOCH);
        Self {
            id: ThingId::from_static("a"),
            color: ThingColor::Green,
            kind: ThingType::Car,
            created,
        }
    }
}

thingcast_repr::single_result_model!(Thing);

/// Serde adapter writing timestamps as `2021-04-17T15:01:14.498166+00:00`.
mod created_format {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
