use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

const DB_PATH: &str = "data/carpedia.sqlite";

pub fn connect() -> Result<Connection> {
    let path = std::env::var("CARPEDIA_DB").unwrap_or_else(|_| DB_PATH.to_string());
    if let Some(dir) = std::path::Path::new(&path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(&path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cars (
            id                 INTEGER PRIMARY KEY,
            brand              TEXT NOT NULL,
            name               TEXT NOT NULL,
            year               INTEGER,
            description        TEXT NOT NULL DEFAULT '',
            engine             TEXT NOT NULL DEFAULT '',
            horsepower         INTEGER,
            top_speed          INTEGER,
            acceleration       REAL,
            transmission       TEXT NOT NULL DEFAULT '',
            fuel_type          TEXT NOT NULL DEFAULT '',
            body_style         TEXT NOT NULL DEFAULT '',
            car_class          TEXT NOT NULL DEFAULT '',
            generation_code    TEXT NOT NULL DEFAULT '',
            generation_years   TEXT NOT NULL DEFAULT '',
            image_url          TEXT NOT NULL DEFAULT '',
            data_source        TEXT NOT NULL DEFAULT 'manual'
                               CHECK(data_source IN ('manual','wikipedia','autopedia')),
            wiki_page_id       INTEGER UNIQUE,
            wikipedia_page_id  INTEGER UNIQUE,
            created_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cars_brand ON cars(brand, name);
        CREATE INDEX IF NOT EXISTS idx_cars_source ON cars(data_source);

        CREATE TABLE IF NOT EXISTS generations (
            id           INTEGER PRIMARY KEY,
            car_id       INTEGER NOT NULL REFERENCES cars(id) ON DELETE CASCADE,
            name         TEXT NOT NULL DEFAULT '',
            code         TEXT NOT NULL DEFAULT '',
            year_start   INTEGER,
            year_end     INTEGER,
            engine       TEXT NOT NULL DEFAULT '',
            horsepower   TEXT NOT NULL DEFAULT '',
            torque       TEXT NOT NULL DEFAULT '',
            top_speed    TEXT NOT NULL DEFAULT '',
            acceleration TEXT NOT NULL DEFAULT '',
            transmission TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_generations_car ON generations(car_id);
        ",
    )?;
    Ok(())
}

// ── Records ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    #[default]
    Manual,
    Wikipedia,
    Autopedia,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Manual => "manual",
            Source::Wikipedia => "wikipedia",
            Source::Autopedia => "autopedia",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Source::Manual),
            "wikipedia" => Some(Source::Wikipedia),
            "autopedia" => Some(Source::Autopedia),
            _ => None,
        }
    }

    /// Which cars column holds this source's external page id.
    fn id_column(self) -> Option<&'static str> {
        match self {
            Source::Manual => None,
            Source::Wikipedia => Some("wikipedia_page_id"),
            Source::Autopedia => Some("wiki_page_id"),
        }
    }
}

/// A parsed car as produced by the extraction pipeline, keyed by the source
/// wiki's page id.
#[derive(Debug, Default)]
pub struct CarRecord {
    pub brand: String,
    pub name: String,
    pub year: Option<i32>,
    pub description: String,
    pub engine: String,
    pub horsepower: Option<i32>,
    pub top_speed: Option<i32>,
    pub acceleration: Option<f64>,
    pub transmission: String,
    pub fuel_type: String,
    pub body_style: String,
    pub car_class: String,
    pub generation_code: String,
    pub generation_years: String,
    pub image_url: String,
    pub source: Source,
    pub page_id: i64,
    pub generations: Vec<GenerationRecord>,
}

impl CarRecord {
    /// A record without both brand and name is not worth persisting.
    pub fn is_valid(&self) -> bool {
        !self.brand.is_empty() && !self.name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRecord {
    pub name: String,
    pub code: String,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
    pub engine: String,
    pub horsepower: String,
    pub torque: String,
    pub top_speed: String,
    pub acceleration: String,
    pub transmission: String,
}

// ── Upsert ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Skipped,
}

/// The mutable slice of a persisted car row, loaded for merging. `id`,
/// external page ids, and `created_at` are deliberately absent: the upsert
/// never rewrites them.
struct StoredCar {
    id: i64,
    brand: String,
    name: String,
    year: Option<i32>,
    description: String,
    engine: String,
    horsepower: Option<i32>,
    top_speed: Option<i32>,
    acceleration: Option<f64>,
    transmission: String,
    fuel_type: String,
    body_style: String,
    car_class: String,
    generation_code: String,
    generation_years: String,
    image_url: String,
    data_source: String,
}

/// Insert-or-update a parsed record by its external page id.
///
/// Existing rows are merged field by field: an incoming empty/null value
/// never erases stored data, so a degraded re-scrape cannot regress the
/// catalog. A non-empty generation list replaces the stored set entirely,
/// in the same transaction as the car write.
pub fn upsert_car(conn: &Connection, rec: &CarRecord) -> Result<UpsertOutcome> {
    if !rec.is_valid() {
        return Ok(UpsertOutcome::Skipped);
    }

    let tx = conn.unchecked_transaction()?;

    let existing = match rec.source.id_column() {
        Some(col) => load_by_external_id(&tx, col, rec.page_id)?,
        None => None,
    };

    let (outcome, car_id) = match existing {
        Some(mut stored) => {
            merge_record(&mut stored, rec);
            update_car(&tx, &stored)?;
            (UpsertOutcome::Updated, stored.id)
        }
        None => {
            insert_car(&tx, rec)?;
            (UpsertOutcome::Created, tx.last_insert_rowid())
        }
    };

    if !rec.generations.is_empty() {
        replace_generations(&tx, car_id, &rec.generations)?;
    }

    tx.commit()?;
    Ok(outcome)
}

/// Field-by-field merge: every overwritable column is listed here with its
/// policy spelled out, so the never-regress rule is enforced per field
/// rather than through reflection.
fn merge_record(stored: &mut StoredCar, rec: &CarRecord) {
    merge_text(&mut stored.brand, &rec.brand);
    merge_text(&mut stored.name, &rec.name);
    merge_opt(&mut stored.year, rec.year);
    merge_text(&mut stored.description, &rec.description);
    merge_text(&mut stored.engine, &rec.engine);
    merge_opt(&mut stored.horsepower, rec.horsepower);
    merge_opt(&mut stored.top_speed, rec.top_speed);
    merge_opt(&mut stored.acceleration, rec.acceleration);
    merge_text(&mut stored.transmission, &rec.transmission);
    merge_text(&mut stored.fuel_type, &rec.fuel_type);
    merge_text(&mut stored.body_style, &rec.body_style);
    merge_text(&mut stored.car_class, &rec.car_class);
    merge_text(&mut stored.generation_code, &rec.generation_code);
    merge_text(&mut stored.generation_years, &rec.generation_years);
    merge_text(&mut stored.image_url, &rec.image_url);
    stored.data_source = rec.source.as_str().to_string();
}

fn merge_text(slot: &mut String, incoming: &str) {
    if !incoming.is_empty() {
        incoming.clone_into(slot);
    }
}

fn merge_opt<T>(slot: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}

fn load_by_external_id(
    conn: &Connection,
    id_column: &str,
    page_id: i64,
) -> Result<Option<StoredCar>> {
    let sql = format!(
        "SELECT id, brand, name, year, description, engine, horsepower, top_speed,
                acceleration, transmission, fuel_type, body_style, car_class,
                generation_code, generation_years, image_url, data_source
         FROM cars WHERE {} = ?1",
        id_column
    );
    let stored = conn
        .query_row(&sql, params![page_id], |row| {
            Ok(StoredCar {
                id: row.get(0)?,
                brand: row.get(1)?,
                name: row.get(2)?,
                year: row.get(3)?,
                description: row.get(4)?,
                engine: row.get(5)?,
                horsepower: row.get(6)?,
                top_speed: row.get(7)?,
                acceleration: row.get(8)?,
                transmission: row.get(9)?,
                fuel_type: row.get(10)?,
                body_style: row.get(11)?,
                car_class: row.get(12)?,
                generation_code: row.get(13)?,
                generation_years: row.get(14)?,
                image_url: row.get(15)?,
                data_source: row.get(16)?,
            })
        })
        .optional()?;
    Ok(stored)
}

fn insert_car(conn: &Connection, rec: &CarRecord) -> Result<()> {
    let (wiki_page_id, wikipedia_page_id) = match rec.source {
        Source::Autopedia => (Some(rec.page_id), None),
        Source::Wikipedia => (None, Some(rec.page_id)),
        Source::Manual => (None, None),
    };
    conn.execute(
        "INSERT INTO cars
         (brand, name, year, description, engine, horsepower, top_speed, acceleration,
          transmission, fuel_type, body_style, car_class, generation_code,
          generation_years, image_url, data_source, wiki_page_id, wikipedia_page_id,
          created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)",
        params![
            rec.brand,
            rec.name,
            rec.year,
            rec.description,
            rec.engine,
            rec.horsepower,
            rec.top_speed,
            rec.acceleration,
            rec.transmission,
            rec.fuel_type,
            rec.body_style,
            rec.car_class,
            rec.generation_code,
            rec.generation_years,
            rec.image_url,
            rec.source.as_str(),
            wiki_page_id,
            wikipedia_page_id,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn update_car(conn: &Connection, stored: &StoredCar) -> Result<()> {
    conn.execute(
        "UPDATE cars SET
            brand = ?2, name = ?3, year = ?4, description = ?5, engine = ?6,
            horsepower = ?7, top_speed = ?8, acceleration = ?9, transmission = ?10,
            fuel_type = ?11, body_style = ?12, car_class = ?13, generation_code = ?14,
            generation_years = ?15, image_url = ?16, data_source = ?17
         WHERE id = ?1",
        params![
            stored.id,
            stored.brand,
            stored.name,
            stored.year,
            stored.description,
            stored.engine,
            stored.horsepower,
            stored.top_speed,
            stored.acceleration,
            stored.transmission,
            stored.fuel_type,
            stored.body_style,
            stored.car_class,
            stored.generation_code,
            stored.generation_years,
            stored.image_url,
            stored.data_source,
        ],
    )?;
    Ok(())
}

fn replace_generations(
    conn: &Connection,
    car_id: i64,
    generations: &[GenerationRecord],
) -> Result<()> {
    conn.execute("DELETE FROM generations WHERE car_id = ?1", params![car_id])?;
    let mut stmt = conn.prepare(
        "INSERT INTO generations
         (car_id, name, code, year_start, year_end, engine, horsepower, torque,
          top_speed, acceleration, transmission)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
    )?;
    for g in generations {
        stmt.execute(params![
            car_id,
            g.name,
            g.code,
            g.year_start,
            g.year_end,
            g.engine,
            g.horsepower,
            g.torque,
            g.top_speed,
            g.acceleration,
            g.transmission,
        ])?;
    }
    Ok(())
}

/// Delete every car imported by `source` (generations cascade).
pub fn clear_source(conn: &Connection, source: Source) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM cars WHERE data_source = ?1",
        params![source.as_str()],
    )?;
    Ok(n)
}

// ── Queries ──

pub struct Stats {
    pub cars: usize,
    pub wikipedia: usize,
    pub autopedia: usize,
    pub manual: usize,
    pub generations: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count_source = |source: &str| -> Result<usize> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM cars WHERE data_source = ?1",
            params![source],
            |r| r.get(0),
        )?)
    };
    let cars: usize = conn.query_row("SELECT COUNT(*) FROM cars", [], |r| r.get(0))?;
    let generations: usize =
        conn.query_row("SELECT COUNT(*) FROM generations", [], |r| r.get(0))?;
    Ok(Stats {
        cars,
        wikipedia: count_source("wikipedia")?,
        autopedia: count_source("autopedia")?,
        manual: count_source("manual")?,
        generations,
    })
}

pub struct CarSummary {
    pub id: i64,
    pub brand: String,
    pub name: String,
    pub year: Option<i32>,
    pub horsepower: Option<i32>,
    pub data_source: String,
    pub image_url: String,
}

pub fn list_cars(
    conn: &Connection,
    brand: Option<&str>,
    source: Option<Source>,
    limit: usize,
) -> Result<Vec<CarSummary>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(b) = brand {
        conditions.push(format!("brand = ?{}", params.len() + 1));
        params.push(Box::new(b.to_string()));
    }
    if let Some(s) = source {
        conditions.push(format!("data_source = ?{}", params.len() + 1));
        params.push(Box::new(s.as_str().to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT id, brand, name, year, horsepower, data_source, image_url
         FROM cars{}
         ORDER BY brand, name
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(CarSummary {
                id: row.get(0)?,
                brand: row.get(1)?,
                name: row.get(2)?,
                year: row.get(3)?,
                horsepower: row.get(4)?,
                data_source: row.get(5)?,
                image_url: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn sample_record(page_id: i64) -> CarRecord {
        CarRecord {
            brand: "BMW".into(),
            name: "3 Series".into(),
            year: Some(1990),
            description: "Compact executive car.".into(),
            engine: "2.5 L I6".into(),
            horsepower: Some(192),
            source: Source::Wikipedia,
            page_id,
            generations: vec![
                GenerationRecord {
                    name: "E30".into(),
                    year_start: Some(1982),
                    year_end: Some(1994),
                    ..Default::default()
                },
                GenerationRecord {
                    name: "E36".into(),
                    year_start: Some(1990),
                    year_end: Some(2000),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn car_count(conn: &Connection) -> usize {
        conn.query_row("SELECT COUNT(*) FROM cars", [], |r| r.get(0)).unwrap()
    }

    fn generation_count(conn: &Connection) -> usize {
        conn.query_row("SELECT COUNT(*) FROM generations", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn reimport_is_idempotent() {
        let conn = test_conn();
        let rec = sample_record(42);

        assert_eq!(upsert_car(&conn, &rec).unwrap(), UpsertOutcome::Created);
        assert_eq!(upsert_car(&conn, &rec).unwrap(), UpsertOutcome::Updated);
        assert_eq!(car_count(&conn), 1);
        assert_eq!(generation_count(&conn), 2);

        let engine: String = conn
            .query_row("SELECT engine FROM cars WHERE wikipedia_page_id = 42", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(engine, "2.5 L I6");
    }

    #[test]
    fn empty_incoming_fields_never_regress() {
        let conn = test_conn();
        upsert_car(&conn, &sample_record(42)).unwrap();

        let degraded = CarRecord {
            brand: "BMW".into(),
            name: "3 Series".into(),
            source: Source::Wikipedia,
            page_id: 42,
            ..Default::default()
        };
        assert_eq!(upsert_car(&conn, &degraded).unwrap(), UpsertOutcome::Updated);

        let (engine, description, hp): (String, String, Option<i32>) = conn
            .query_row(
                "SELECT engine, description, horsepower FROM cars WHERE wikipedia_page_id = 42",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(engine, "2.5 L I6");
        assert_eq!(description, "Compact executive car.");
        assert_eq!(hp, Some(192));
    }

    #[test]
    fn non_empty_incoming_fields_do_update() {
        let conn = test_conn();
        upsert_car(&conn, &sample_record(42)).unwrap();

        let mut rec = sample_record(42);
        rec.engine = "3.0 L I6".into();
        rec.generations.clear();
        upsert_car(&conn, &rec).unwrap();

        let engine: String = conn
            .query_row("SELECT engine FROM cars WHERE wikipedia_page_id = 42", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(engine, "3.0 L I6");
        // Empty incoming generation list leaves the stored set alone.
        assert_eq!(generation_count(&conn), 2);
    }

    #[test]
    fn generation_set_is_fully_replaced() {
        let conn = test_conn();
        upsert_car(&conn, &sample_record(42)).unwrap();
        assert_eq!(generation_count(&conn), 2);

        let mut rec = sample_record(42);
        rec.generations = vec![GenerationRecord {
            name: "G20".into(),
            year_start: Some(2019),
            ..Default::default()
        }];
        upsert_car(&conn, &rec).unwrap();

        assert_eq!(generation_count(&conn), 1);
        let name: String = conn
            .query_row("SELECT name FROM generations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "G20");
    }

    #[test]
    fn invalid_record_is_skipped_before_persistence() {
        let conn = test_conn();
        let rec = CarRecord {
            brand: "Foo".into(),
            source: Source::Autopedia,
            page_id: 7,
            ..Default::default()
        };
        assert_eq!(upsert_car(&conn, &rec).unwrap(), UpsertOutcome::Skipped);
        assert_eq!(car_count(&conn), 0);
    }

    #[test]
    fn created_at_survives_updates() {
        let conn = test_conn();
        upsert_car(&conn, &sample_record(42)).unwrap();
        conn.execute("UPDATE cars SET created_at = '2001-01-01T00:00:00Z'", [])
            .unwrap();

        upsert_car(&conn, &sample_record(42)).unwrap();
        let created_at: String = conn
            .query_row("SELECT created_at FROM cars", [], |r| r.get(0))
            .unwrap();
        assert_eq!(created_at, "2001-01-01T00:00:00Z");
    }

    #[test]
    fn clear_source_only_touches_matching_rows() {
        let conn = test_conn();
        upsert_car(&conn, &sample_record(42)).unwrap();

        let other = CarRecord {
            brand: "Ford".into(),
            name: "Mustang".into(),
            source: Source::Autopedia,
            page_id: 99,
            ..Default::default()
        };
        upsert_car(&conn, &other).unwrap();

        assert_eq!(clear_source(&conn, Source::Wikipedia).unwrap(), 1);
        assert_eq!(car_count(&conn), 1);
        // Cascade removed the cleared car's generations.
        assert_eq!(generation_count(&conn), 0);

        let remaining: String = conn
            .query_row("SELECT brand FROM cars", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, "Ford");
    }

    #[test]
    fn sources_key_on_separate_id_columns() {
        let conn = test_conn();
        let mut wiki = sample_record(42);
        wiki.source = Source::Autopedia;
        upsert_car(&conn, &wiki).unwrap();
        upsert_car(&conn, &sample_record(42)).unwrap();
        // Same numeric page id from different wikis must not collide.
        assert_eq!(car_count(&conn), 2);
    }

    #[test]
    fn list_cars_filters_by_brand_and_source() {
        let conn = test_conn();
        upsert_car(&conn, &sample_record(42)).unwrap();
        let other = CarRecord {
            brand: "Ford".into(),
            name: "Mustang".into(),
            source: Source::Autopedia,
            page_id: 99,
            ..Default::default()
        };
        upsert_car(&conn, &other).unwrap();

        let all = list_cars(&conn, None, None, 50).unwrap();
        assert_eq!(all.len(), 2);
        // Ordered by brand.
        assert_eq!(all[0].brand, "BMW");

        let fords = list_cars(&conn, Some("Ford"), None, 50).unwrap();
        assert_eq!(fords.len(), 1);
        let wiki = list_cars(&conn, None, Some(Source::Wikipedia), 50).unwrap();
        assert_eq!(wiki.len(), 1);
        assert_eq!(wiki[0].name, "3 Series");
    }
}
