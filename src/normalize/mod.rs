pub mod card;
pub mod related;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::RelatedRows;
use crate::raw::RawCard;
pub use card::{Card, CardKind};

/// Why a raw record was left out of the store. None of these abort a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Error)]
pub enum SkipReason {
    #[error("empty record")]
    Empty,
    #[error("record does not match the card shape")]
    Malformed,
    #[error("no attributes")]
    MissingAttributes,
    #[error("no id")]
    MissingId,
    #[error("could not determine card type")]
    UnresolvedType,
    #[error("no name")]
    MissingName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCard {
    pub card: Card,
    pub related: RelatedRows,
}

/// Map one upstream record onto a typed card plus its child rows.
///
/// `now` becomes the card's `last_updated`, so every card written in a run
/// shares the run's start time.
pub fn normalize(record: &Value, now: &DateTime<Utc>) -> Result<NormalizedCard, SkipReason> {
    let result = RawCard::parse(record)
        .map_err(|e| {
            debug!("Record does not decode: {}", e);
            SkipReason::Malformed
        })
        .and_then(|raw| build(&raw, now));
    if let Err(reason) = &result {
        let id = match record.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "?".to_string(),
            Some(other) => other.to_string(),
        };
        warn!(
            "Skipping card {} ({}): {}",
            id,
            record
                .pointer("/attributes/title")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("untitled"),
            reason
        );
    }
    result
}

fn build(raw: &RawCard, now: &DateTime<Utc>) -> Result<NormalizedCard, SkipReason> {
    if raw.is_empty() {
        return Err(SkipReason::Empty);
    }
    let attrs = raw
        .attributes
        .as_ref()
        .filter(|a| !a.is_empty())
        .ok_or(SkipReason::MissingAttributes)?;
    let id = raw
        .id
        .as_ref()
        .map(|id| id.to_string())
        .filter(|id| !id.is_empty())
        .ok_or(SkipReason::MissingId)?;
    let card_type = attrs.type_name().ok_or(SkipReason::UnresolvedType)?;
    let name = attrs
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(SkipReason::MissingName)?;

    debug!("Normalizing card {} {} of type {}", id, name, card_type);

    let card = Card {
        id: id.clone(),
        name: name.to_string(),
        subtitle: attrs.subtitle.clone(),
        card_type: card_type.to_string(),
        rarity: attrs.rarity_name().map(str::to_string),
        text: attrs.text.clone(),
        image_uri: attrs.front_image().map(str::to_string),
        set_name: attrs.set_name().map(str::to_string),
        set_code: attrs.set_code().map(str::to_string),
        card_number: attrs.card_number.as_ref().map(|n| n.to_string()),
        serial_code: attrs.serial_code.as_ref().map(|s| s.to_string()),
        artist: attrs.artist.clone(),
        is_unique: attrs.unique,
        last_updated: now.to_rfc3339(),
        kind: CardKind::from_attributes(card_type, attrs),
    };
    let related = related::flatten(&id, attrs);

    Ok(NormalizedCard { card, related })
}
