//! Upstream payload shapes for the `card-list` endpoint.
//!
//! Every field is optional: the upstream omits or nulls fields freely and a
//! missing value must never abort a page. Relations come wrapped in a
//! `{ "data": ... }` envelope whose entries carry their own `attributes`.

use std::fmt;

use serde::Deserialize;

/// One page of the card listing. Records stay as JSON until normalized so a
/// single odd record cannot fail the page.
#[derive(Debug, Default, Deserialize)]
pub struct CardListResponse {
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
}

impl CardListResponse {
    pub fn pagination(&self) -> Option<&Pagination> {
        self.meta.as_ref()?.pagination.as_ref()
    }

    /// Records in page order, nulls included so they still show up in the
    /// skip counts.
    pub fn into_records(self) -> Vec<serde_json::Value> {
        self.data.unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub page_count: Option<u32>,
    pub total: Option<u64>,
}

/// A number-or-string value. Ids and card numbers arrive as either.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Float(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct RawCard {
    pub id: Option<Scalar>,
    pub attributes: Option<RawAttributes>,
}

impl RawCard {
    /// Decode one listing entry. `null` decodes to an empty record.
    pub fn parse(value: &serde_json::Value) -> serde_json::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value)
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.attributes.is_none()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAttributes {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub text: Option<String>,
    pub epic_action: Option<String>,
    pub deploy_box: Option<String>,
    pub cost: Option<i64>,
    pub power: Option<i64>,
    pub hp: Option<i64>,
    pub card_number: Option<Scalar>,
    pub serial_code: Option<Scalar>,
    pub artist: Option<String>,
    pub unique: Option<bool>,
    #[serde(rename = "type")]
    pub card_type: Option<TypeField>,
    pub rarity: Option<One<Named>>,
    pub expansion: Option<One<Named>>,
    pub art_front: Option<One<Media>>,
    pub art_back: Option<One<Media>>,
    pub aspects: Option<Many<Named>>,
    pub keywords: Option<Many<Named>>,
    pub traits: Option<Many<Named>>,
    pub arenas: Option<Many<Named>>,
}

impl RawAttributes {
    /// `{}` carries nothing to normalize.
    pub fn is_empty(&self) -> bool {
        *self == RawAttributes::default()
    }

    /// Card type, trying the nested entity's attributes, then the entity's
    /// own `name`, then a flat string.
    pub fn type_name(&self) -> Option<&str> {
        let name = match self.card_type.as_ref()? {
            TypeField::Flat(s) => Some(s.as_str()),
            TypeField::Nested(one) => {
                let entry = one.data.as_ref()?;
                entry
                    .attributes
                    .as_ref()
                    .and_then(|a| a.name.as_deref())
                    .or(entry.name.as_deref())
            }
        };
        name.map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn rarity_name(&self) -> Option<&str> {
        self.rarity.as_ref()?.attributes()?.name.as_deref()
    }

    pub fn set_name(&self) -> Option<&str> {
        self.expansion.as_ref()?.attributes()?.name.as_deref()
    }

    pub fn set_code(&self) -> Option<&str> {
        self.expansion.as_ref()?.attributes()?.code.as_deref()
    }

    pub fn front_image(&self) -> Option<&str> {
        self.art_front.as_ref()?.attributes()?.card_url()
    }

    pub fn back_image(&self) -> Option<&str> {
        self.art_back.as_ref()?.attributes()?.card_url()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TypeField {
    Flat(String),
    Nested(One<Named>),
}

/// A single related entity: `{ "data": { "attributes": {...} } }`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct One<T> {
    pub data: Option<Entry<T>>,
}

impl<T> One<T> {
    pub fn attributes(&self) -> Option<&T> {
        self.data.as_ref()?.attributes.as_ref()
    }
}

/// A list of related entities: `{ "data": [ {...}, ... ] }`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Many<T> {
    pub data: Option<Vec<Entry<T>>>,
}

impl<T> Many<T> {
    pub fn entries(&self) -> impl Iterator<Item = &T> {
        self.data
            .iter()
            .flatten()
            .filter_map(|e| e.attributes.as_ref())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Entry<T> {
    pub attributes: Option<T>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Named {
    pub name: Option<String>,
    pub color: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Media {
    pub url: Option<String>,
    pub formats: Option<MediaFormats>,
}

impl Media {
    /// Medium "card" rendition, else the raw asset.
    pub fn card_url(&self) -> Option<&str> {
        self.formats
            .as_ref()
            .and_then(|f| f.card.as_ref())
            .and_then(|c| c.url.as_deref())
            .or(self.url.as_deref())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct MediaFormats {
    pub card: Option<MediaFormat>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct MediaFormat {
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(json: serde_json::Value) -> RawAttributes {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn type_from_nested_attributes() {
        let a = attrs(serde_json::json!({
            "type": { "data": { "id": 4, "attributes": { "name": "Unit" } } }
        }));
        assert_eq!(a.type_name(), Some("Unit"));
    }

    #[test]
    fn type_from_nested_entry_name() {
        let a = attrs(serde_json::json!({ "type": { "data": { "name": "Event" } } }));
        assert_eq!(a.type_name(), Some("Event"));
    }

    #[test]
    fn type_from_flat_string() {
        let a = attrs(serde_json::json!({ "type": "Base" }));
        assert_eq!(a.type_name(), Some("Base"));
    }

    #[test]
    fn type_missing_or_blank() {
        assert_eq!(attrs(serde_json::json!({})).type_name(), None);
        assert_eq!(attrs(serde_json::json!({ "type": { "data": null } })).type_name(), None);
        assert_eq!(attrs(serde_json::json!({ "type": "  " })).type_name(), None);
    }

    #[test]
    fn image_prefers_card_rendition() {
        let a = attrs(serde_json::json!({
            "artFront": { "data": { "attributes": {
                "url": "https://cdn/raw.png",
                "formats": { "card": { "url": "https://cdn/card.png" } }
            } } },
            "artBack": { "data": { "attributes": { "url": "https://cdn/back.png" } } }
        }));
        assert_eq!(a.front_image(), Some("https://cdn/card.png"));
        assert_eq!(a.back_image(), Some("https://cdn/back.png"));
    }

    #[test]
    fn null_envelopes_resolve_to_none() {
        let a = attrs(serde_json::json!({
            "rarity": { "data": null },
            "expansion": null,
            "aspects": { "data": null },
            "artFront": { "data": { "attributes": null } }
        }));
        assert_eq!(a.rarity_name(), None);
        assert_eq!(a.set_name(), None);
        assert_eq!(a.front_image(), None);
        assert_eq!(a.aspects.as_ref().map(|m| m.entries().count()), Some(0));
    }

    #[test]
    fn page_with_null_records_and_meta() {
        let page: CardListResponse = serde_json::from_value(serde_json::json!({
            "data": [ { "id": 7, "attributes": { "title": "X" } }, null ],
            "meta": { "pagination": { "page": 1, "pageSize": 40, "pageCount": 12, "total": 461 } }
        }))
        .unwrap();
        let p = page.pagination().cloned().unwrap();
        assert_eq!(p.page_count, Some(12));
        assert_eq!(p.total, Some(461));

        let records = page.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(RawCard::parse(&records[0]).unwrap().id, Some(Scalar::Int(7)));
        assert!(RawCard::parse(&records[1]).unwrap().is_empty());
    }

    #[test]
    fn odd_record_does_not_fail_the_page() {
        let page: CardListResponse = serde_json::from_value(serde_json::json!({
            "data": [
                { "id": 1, "attributes": { "title": "Good", "cost": 4 } },
                { "id": 2, "attributes": { "title": "Bad", "cost": "X" } }
            ]
        }))
        .unwrap();
        let records = page.into_records();
        assert!(RawCard::parse(&records[0]).is_ok());
        assert!(RawCard::parse(&records[1]).is_err());
    }

    #[test]
    fn scalar_display() {
        assert_eq!(Scalar::Int(42).to_string(), "42");
        assert_eq!(Scalar::Text("SOR-010".into()).to_string(), "SOR-010");
    }
}
