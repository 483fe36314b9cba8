use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

// ── Schema ──

const CHILD_TABLES: [&str; 4] = ["card_aspects", "card_keywords", "card_traits", "card_arenas"];

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cards (
        id             TEXT PRIMARY KEY,
        name           TEXT NOT NULL,
        subtitle       TEXT,
        type           TEXT NOT NULL,
        rarity         TEXT,
        text           TEXT,
        epic_action    TEXT,
        deploy_box     TEXT,
        energy_cost    INTEGER,
        attack         INTEGER,
        health         INTEGER,
        image_uri      TEXT,
        image_back_uri TEXT,
        set_name       TEXT,
        set_code       TEXT,
        card_number    TEXT,
        serial_code    TEXT,
        artist         TEXT,
        is_unique      BOOLEAN,
        last_updated   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_card_name ON cards(name);
    CREATE INDEX IF NOT EXISTS idx_card_type ON cards(type);
    CREATE INDEX IF NOT EXISTS idx_card_set  ON cards(set_name);
    CREATE INDEX IF NOT EXISTS idx_card_cost ON cards(energy_cost);

    CREATE TABLE IF NOT EXISTS card_aspects (
        card_id      TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
        aspect_name  TEXT NOT NULL,
        aspect_color TEXT,
        PRIMARY KEY (card_id, aspect_name)
    );

    CREATE TABLE IF NOT EXISTS card_keywords (
        card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
        keyword TEXT NOT NULL,
        PRIMARY KEY (card_id, keyword)
    );

    CREATE TABLE IF NOT EXISTS card_traits (
        card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
        trait   TEXT NOT NULL,
        PRIMARY KEY (card_id, trait)
    );

    CREATE TABLE IF NOT EXISTS card_arenas (
        card_id TEXT NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
        arena   TEXT NOT NULL,
        PRIMARY KEY (card_id, arena)
    );
";

/// Create the tables if they are missing. Leaves existing rows alone.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Drop every card table and recreate them empty. All prior data is lost.
pub fn reset_schema(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    for table in CHILD_TABLES {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", table))?;
    }
    tx.execute_batch("DROP TABLE IF EXISTS cards;")?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()?;
    Ok(())
}

// ── Rows ──

const CARD_COLUMNS: &str = "id, name, subtitle, type, rarity, text, epic_action, deploy_box,
    energy_cost, attack, health, image_uri, image_back_uri, set_name, set_code,
    card_number, serial_code, artist, is_unique, last_updated";

/// Flat storage shape of a card. See `normalize::Card` for the typed form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRow {
    pub id: String,
    pub name: String,
    pub subtitle: Option<String>,
    #[serde(rename = "type")]
    pub card_type: String,
    pub rarity: Option<String>,
    pub text: Option<String>,
    pub epic_action: Option<String>,
    pub deploy_box: Option<String>,
    pub energy_cost: Option<i64>,
    pub attack: Option<i64>,
    pub health: Option<i64>,
    pub image_uri: Option<String>,
    pub image_back_uri: Option<String>,
    pub set_name: Option<String>,
    pub set_code: Option<String>,
    pub card_number: Option<String>,
    pub serial_code: Option<String>,
    pub artist: Option<String>,
    pub is_unique: Option<bool>,
    pub last_updated: String,
}

fn card_from_row(row: &rusqlite::Row) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        name: row.get(1)?,
        subtitle: row.get(2)?,
        card_type: row.get(3)?,
        rarity: row.get(4)?,
        text: row.get(5)?,
        epic_action: row.get(6)?,
        deploy_box: row.get(7)?,
        energy_cost: row.get(8)?,
        attack: row.get(9)?,
        health: row.get(10)?,
        image_uri: row.get(11)?,
        image_back_uri: row.get(12)?,
        set_name: row.get(13)?,
        set_code: row.get(14)?,
        card_number: row.get(15)?,
        serial_code: row.get(16)?,
        artist: row.get(17)?,
        is_unique: row.get(18)?,
        last_updated: row.get(19)?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AspectRow {
    pub card_id: String,
    pub name: String,
    pub color: Option<String>,
}

/// Single-valued child tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Keyword,
    Trait,
    Arena,
}

impl TagKind {
    pub const ALL: [TagKind; 3] = [TagKind::Keyword, TagKind::Trait, TagKind::Arena];

    pub fn table(self) -> &'static str {
        match self {
            TagKind::Keyword => "card_keywords",
            TagKind::Trait => "card_traits",
            TagKind::Arena => "card_arenas",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            TagKind::Keyword => "keyword",
            TagKind::Trait => "trait",
            TagKind::Arena => "arena",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRow {
    pub card_id: String,
    pub value: String,
}

/// Child rows belonging to one card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedRows {
    pub aspects: Vec<AspectRow>,
    pub keywords: Vec<TagRow>,
    pub traits: Vec<TagRow>,
    pub arenas: Vec<TagRow>,
}

impl RelatedRows {
    pub fn tags(&self, kind: TagKind) -> &[TagRow] {
        match kind {
            TagKind::Keyword => &self.keywords,
            TagKind::Trait => &self.traits,
            TagKind::Arena => &self.arenas,
        }
    }

    pub fn row_count(&self) -> usize {
        self.aspects.len() + self.keywords.len() + self.traits.len() + self.arenas.len()
    }
}

// ── Writer ──

/// Write one card and all of its child rows as a single transaction.
///
/// The card's previous child rows are cleared first so a re-run replaces the
/// whole unit. Any error drops the transaction, which rolls it back.
pub fn upsert_card(conn: &Connection, card: &CardRow, related: &RelatedRows) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        for table in CHILD_TABLES {
            tx.execute(
                &format!("DELETE FROM {} WHERE card_id = ?1", table),
                params![card.id],
            )?;
        }

        let mut c_stmt = tx.prepare_cached(&format!(
            "INSERT OR REPLACE INTO cards ({})
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
            CARD_COLUMNS
        ))?;
        c_stmt.execute(params![
            card.id, card.name, card.subtitle, card.card_type, card.rarity, card.text,
            card.epic_action, card.deploy_box, card.energy_cost, card.attack, card.health,
            card.image_uri, card.image_back_uri, card.set_name, card.set_code,
            card.card_number, card.serial_code, card.artist, card.is_unique, card.last_updated,
        ])?;

        let mut a_stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO card_aspects (card_id, aspect_name, aspect_color)
             VALUES (?1, ?2, ?3)",
        )?;
        for a in &related.aspects {
            a_stmt.execute(params![a.card_id, a.name, a.color])?;
        }

        for kind in TagKind::ALL {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO {} (card_id, {}) VALUES (?1, ?2)",
                kind.table(),
                kind.column()
            ))?;
            for t in related.tags(kind) {
                stmt.execute(params![t.card_id, t.value])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Verification ──

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChildCounts {
    pub aspects: usize,
    pub keywords: usize,
    pub traits: usize,
    pub arenas: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub total_cards: usize,
    pub by_type: Vec<(String, usize)>,
    /// Total rows per child table.
    pub child_rows: ChildCounts,
    /// Distinct cards present in each child table.
    pub coverage: ChildCounts,
    pub integrity: Vec<(&'static str, usize)>,
    pub orphans: usize,
}

const INTEGRITY_CHECKS: [(&str, &str); 6] = [
    ("Cards missing names", "SELECT COUNT(*) FROM cards WHERE name IS NULL OR name = ''"),
    ("Cards missing types", "SELECT COUNT(*) FROM cards WHERE type IS NULL OR type = ''"),
    ("Cards missing images", "SELECT COUNT(*) FROM cards WHERE image_uri IS NULL"),
    (
        "Leaders missing epic actions",
        "SELECT COUNT(*) FROM cards WHERE type = 'Leader' AND epic_action IS NULL",
    ),
    (
        "Units missing power",
        "SELECT COUNT(*) FROM cards WHERE type = 'Unit' AND attack IS NULL",
    ),
    (
        "Cards missing set info",
        "SELECT COUNT(*) FROM cards WHERE set_name IS NULL OR set_code IS NULL",
    ),
];

fn count(conn: &Connection, sql: &str) -> Result<usize> {
    let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
    Ok(n as usize)
}

fn child_counts(conn: &Connection, select: &str) -> Result<ChildCounts> {
    let q = |table: &str| count(conn, &format!("SELECT {} FROM {}", select, table));
    Ok(ChildCounts {
        aspects: q("card_aspects")?,
        keywords: q("card_keywords")?,
        traits: q("card_traits")?,
        arenas: q("card_arenas")?,
    })
}

/// Summarize the finished store. Observations only, nothing is corrected.
pub fn verify(conn: &Connection) -> Result<VerificationReport> {
    let total_cards = count(conn, "SELECT COUNT(*) FROM cards")?;

    let mut stmt =
        conn.prepare("SELECT type, COUNT(*) FROM cards GROUP BY type ORDER BY COUNT(*) DESC, type")?;
    let by_type = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))?
        .collect::<Result<Vec<_>, _>>()?;

    let integrity = INTEGRITY_CHECKS
        .iter()
        .map(|(label, sql)| Ok((*label, count(conn, sql)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut orphans = 0;
    for table in CHILD_TABLES {
        orphans += count(
            conn,
            &format!(
                "SELECT COUNT(*) FROM {} WHERE card_id NOT IN (SELECT id FROM cards)",
                table
            ),
        )?;
    }

    Ok(VerificationReport {
        total_cards,
        by_type,
        child_rows: child_counts(conn, "COUNT(*)")?,
        coverage: child_counts(conn, "COUNT(DISTINCT card_id)")?,
        integrity,
        orphans,
    })
}

// ── Lookup ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AspectView {
    pub name: String,
    pub color: Option<String>,
}

/// A card with its child relations resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    #[serde(flatten)]
    pub card: CardRow,
    pub aspects: Vec<AspectView>,
    pub keywords: Vec<String>,
    pub traits: Vec<String>,
    pub arenas: Vec<String>,
}

pub fn fetch_card(conn: &Connection, id: &str) -> Result<Option<CardView>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS))?;
    let mut rows = stmt.query_map(params![id], card_from_row)?;
    let card = match rows.next() {
        Some(row) => row?,
        None => return Ok(None),
    };

    let mut a_stmt = conn.prepare(
        "SELECT aspect_name, aspect_color FROM card_aspects WHERE card_id = ?1 ORDER BY aspect_name",
    )?;
    let aspects = a_stmt
        .query_map(params![id], |row| {
            Ok(AspectView {
                name: row.get(0)?,
                color: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let tags = |kind: TagKind| -> Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {col} FROM {table} WHERE card_id = ?1 ORDER BY {col}",
            col = kind.column(),
            table = kind.table()
        ))?;
        let values = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    };

    Ok(Some(CardView {
        keywords: tags(TagKind::Keyword)?,
        traits: tags(TagKind::Trait)?,
        arenas: tags(TagKind::Arena)?,
        card,
        aspects,
    }))
}

// ── Overview ──

#[derive(Debug, Default)]
pub struct OverviewFilter<'a> {
    pub card_type: Option<&'a str>,
    pub set_code: Option<&'a str>,
    pub aspect: Option<&'a str>,
    pub name: Option<&'a str>,
}

pub struct OverviewRow {
    pub id: String,
    pub name: String,
    pub subtitle: String,
    pub card_type: String,
    pub set_code: String,
    pub card_number: String,
    pub energy_cost: Option<i64>,
    pub attack: Option<i64>,
    pub health: Option<i64>,
    pub aspects: String,
}

pub fn fetch_overview(
    conn: &Connection,
    filter: &OverviewFilter,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(t) = filter.card_type {
        conditions.push(format!("c.type = ?{}", params.len() + 1));
        params.push(Box::new(t.to_string()));
    }
    if let Some(s) = filter.set_code {
        conditions.push(format!("c.set_code = ?{}", params.len() + 1));
        params.push(Box::new(s.to_string()));
    }
    if let Some(a) = filter.aspect {
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM card_aspects a WHERE a.card_id = c.id AND a.aspect_name = ?{})",
            params.len() + 1
        ));
        params.push(Box::new(a.to_string()));
    }
    if let Some(n) = filter.name {
        conditions.push(format!("c.name LIKE ?{}", params.len() + 1));
        params.push(Box::new(format!("%{}%", n)));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT c.id, c.name, COALESCE(c.subtitle,''), c.type, COALESCE(c.set_code,''),
                COALESCE(c.card_number,''), c.energy_cost, c.attack, c.health,
                COALESCE((SELECT GROUP_CONCAT(aspect_name, '/') FROM card_aspects a
                          WHERE a.card_id = c.id), '')
         FROM cards c{}
         ORDER BY c.set_code, CAST(c.card_number AS INTEGER), c.id
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                id: row.get(0)?,
                name: row.get(1)?,
                subtitle: row.get(2)?,
                card_type: row.get(3)?,
                set_code: row.get(4)?,
                card_number: row.get(5)?,
                energy_cost: row.get(6)?,
                attack: row.get(7)?,
                health: row.get(8)?,
                aspects: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
