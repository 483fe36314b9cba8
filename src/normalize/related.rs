use std::collections::HashSet;

use crate::db::{AspectRow, RelatedRows, TagRow};
use crate::raw::{Many, Named, RawAttributes};

/// Flatten the four relation lists into child rows for `card_id`.
pub fn flatten(card_id: &str, attrs: &RawAttributes) -> RelatedRows {
    RelatedRows {
        aspects: named(attrs.aspects.as_ref())
            .map(|n| AspectRow {
                card_id: card_id.to_string(),
                name: n.name.as_deref().unwrap_or_default().trim().to_string(),
                color: n.color.clone(),
            })
            .collect(),
        keywords: tags(card_id, attrs.keywords.as_ref()),
        traits: tags(card_id, attrs.traits.as_ref()),
        arenas: tags(card_id, attrs.arenas.as_ref()),
    }
}

fn tags(card_id: &str, list: Option<&Many<Named>>) -> Vec<TagRow> {
    named(list)
        .filter_map(|n| n.name.as_deref().map(|s| s.trim().to_string()))
        .map(|value| TagRow {
            card_id: card_id.to_string(),
            value,
        })
        .collect()
}

/// Entries with a non-blank name, first occurrence wins.
fn named(list: Option<&Many<Named>>) -> impl Iterator<Item = &Named> {
    let mut seen = HashSet::new();
    list.into_iter().flat_map(Many::entries).filter(move |n| {
        match n.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => seen.insert(name.to_string()),
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(json: serde_json::Value) -> RawAttributes {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn flattens_all_four_lists() {
        let a = attrs(serde_json::json!({
            "aspects": { "data": [
                { "attributes": { "name": "Vigilance", "color": "blue" } },
                { "attributes": { "name": "Villainy", "color": "black" } }
            ] },
            "keywords": { "data": [ { "attributes": { "name": "Sentinel" } } ] },
            "traits": { "data": [
                { "attributes": { "name": "Imperial" } },
                { "attributes": { "name": "Trooper" } }
            ] },
            "arenas": { "data": [ { "attributes": { "name": "Ground" } } ] }
        }));
        let rows = flatten("42", &a);
        assert_eq!(rows.aspects.len(), 2);
        assert_eq!(rows.aspects[1].color.as_deref(), Some("black"));
        assert!(rows.aspects.iter().all(|r| r.card_id == "42"));
        assert_eq!(rows.keywords[0].value, "Sentinel");
        assert_eq!(rows.traits.len(), 2);
        assert_eq!(rows.arenas[0].value, "Ground");
    }

    #[test]
    fn absent_and_null_lists_are_empty() {
        let a = attrs(serde_json::json!({
            "aspects": null,
            "keywords": { "data": null },
            "traits": { "data": [] }
        }));
        assert_eq!(flatten("1", &a), RelatedRows::default());
    }

    #[test]
    fn drops_unnamed_and_duplicate_entries() {
        let a = attrs(serde_json::json!({
            "traits": { "data": [
                { "attributes": { "name": "Force" } },
                { "attributes": { "name": null } },
                { "attributes": null },
                { "attributes": { "name": "Force" } },
                { "attributes": { "name": "" } }
            ] }
        }));
        let rows = flatten("1", &a);
        assert_eq!(rows.traits.len(), 1);
        assert_eq!(rows.traits[0].value, "Force");
    }
}
