use std::fmt;

use crate::db::CardRow;
use crate::raw::RawAttributes;

/// A card with its type-specific fields held in `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub subtitle: Option<String>,
    pub card_type: String,
    pub rarity: Option<String>,
    pub text: Option<String>,
    pub image_uri: Option<String>,
    pub set_name: Option<String>,
    pub set_code: Option<String>,
    pub card_number: Option<String>,
    pub serial_code: Option<String>,
    pub artist: Option<String>,
    pub is_unique: Option<bool>,
    pub last_updated: String,
    pub kind: CardKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardKind {
    Leader {
        epic_action: Option<String>,
        deploy_box: Option<String>,
        energy_cost: Option<i64>,
        image_back_uri: Option<String>,
    },
    /// Bases are never paid for, so there is no cost to carry.
    Base { health: Option<i64> },
    /// Units, events, upgrades and anything else the upstream adds later.
    Other {
        energy_cost: Option<i64>,
        attack: Option<i64>,
        health: Option<i64>,
    },
}

impl CardKind {
    pub fn from_attributes(card_type: &str, attrs: &RawAttributes) -> Self {
        match card_type {
            "Leader" => CardKind::Leader {
                epic_action: attrs.epic_action.clone(),
                deploy_box: attrs.deploy_box.clone(),
                energy_cost: attrs.cost,
                image_back_uri: attrs.back_image().map(str::to_string),
            },
            "Base" => CardKind::Base { health: attrs.hp },
            _ => CardKind::Other {
                energy_cost: attrs.cost,
                attack: attrs.power,
                health: attrs.hp,
            },
        }
    }

    pub fn energy_cost(&self) -> Option<i64> {
        match self {
            CardKind::Leader { energy_cost, .. } | CardKind::Other { energy_cost, .. } => {
                *energy_cost
            }
            CardKind::Base { .. } => None,
        }
    }

    pub fn attack(&self) -> Option<i64> {
        match self {
            CardKind::Other { attack, .. } => *attack,
            _ => None,
        }
    }

    pub fn health(&self) -> Option<i64> {
        match self {
            CardKind::Base { health } | CardKind::Other { health, .. } => *health,
            CardKind::Leader { .. } => None,
        }
    }
}

impl Card {
    pub fn to_row(&self) -> CardRow {
        let (epic_action, deploy_box, image_back_uri) = match &self.kind {
            CardKind::Leader {
                epic_action,
                deploy_box,
                image_back_uri,
                ..
            } => (epic_action.clone(), deploy_box.clone(), image_back_uri.clone()),
            _ => (None, None, None),
        };

        CardRow {
            id: self.id.clone(),
            name: self.name.clone(),
            subtitle: self.subtitle.clone(),
            card_type: self.card_type.clone(),
            rarity: self.rarity.clone(),
            text: self.text.clone(),
            epic_action,
            deploy_box,
            energy_cost: self.kind.energy_cost(),
            attack: self.kind.attack(),
            health: self.kind.health(),
            image_uri: self.image_uri.clone(),
            image_back_uri,
            set_name: self.set_name.clone(),
            set_code: self.set_code.clone(),
            card_number: self.card_number.clone(),
            serial_code: self.serial_code.clone(),
            artist: self.artist.clone(),
            is_unique: self.is_unique,
            last_updated: self.last_updated.clone(),
        }
    }

    /// Rebuild the typed card from storage. Columns that make no sense for
    /// the stored type are dropped.
    pub fn from_row(row: CardRow) -> Self {
        let kind = match row.card_type.as_str() {
            "Leader" => CardKind::Leader {
                epic_action: row.epic_action,
                deploy_box: row.deploy_box,
                energy_cost: row.energy_cost,
                image_back_uri: row.image_back_uri,
            },
            "Base" => CardKind::Base { health: row.health },
            _ => CardKind::Other {
                energy_cost: row.energy_cost,
                attack: row.attack,
                health: row.health,
            },
        };

        Card {
            id: row.id,
            name: row.name,
            subtitle: row.subtitle,
            card_type: row.card_type,
            rarity: row.rarity,
            text: row.text,
            image_uri: row.image_uri,
            set_name: row.set_name,
            set_code: row.set_code,
            card_number: row.card_number,
            serial_code: row.serial_code,
            artist: row.artist,
            is_unique: row.is_unique,
            last_updated: row.last_updated,
            kind,
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(sub) = &self.subtitle {
            write!(f, ", {}", sub)?;
        }
        write!(f, " [{}]", self.card_type)?;
        if let Some(cost) = self.kind.energy_cost() {
            write!(f, " cost {}", cost)?;
        }
        match &self.kind {
            CardKind::Other {
                attack: Some(a),
                health: Some(h),
                ..
            } => write!(f, " {}/{}", a, h),
            CardKind::Base { health: Some(h) } => write!(f, " hp {}", h),
            _ => Ok(()),
        }
    }
}
