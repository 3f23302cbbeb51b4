use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use crate::config::app_cache_dir;
use crate::features::{MatchRecord, MatchStats, MatchStatus};
use crate::odds::OddsQuote;

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("history.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            league TEXT NOT NULL,
            kickoff TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            status TEXT NOT NULL,
            odds_json TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league);
        CREATE INDEX IF NOT EXISTS idx_matches_kickoff ON matches(kickoff);

        CREATE TABLE IF NOT EXISTS match_stats (
            match_id INTEGER PRIMARY KEY REFERENCES matches(match_id),
            home_possession REAL NULL,
            away_possession REAL NULL,
            home_shots REAL NULL,
            away_shots REAL NULL,
            home_shots_on_target REAL NULL,
            away_shots_on_target REAL NULL,
            home_xg REAL NULL,
            away_xg REAL NULL,
            home_corners REAL NULL,
            away_corners REAL NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Inserts or replaces every record in one transaction; returns the number written.
pub fn upsert_matches(conn: &mut Connection, records: &[MatchRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin upsert transaction")?;
    for record in records {
        upsert_match(&tx, record)?;
    }
    tx.commit().context("commit upsert transaction")?;
    Ok(records.len())
}

/// SQLite integers are signed; ids above `i64::MAX` cannot be stored.
fn sql_id(id: u64) -> Result<i64> {
    i64::try_from(id).with_context(|| format!("match id {id} exceeds the sqlite integer range"))
}

pub fn upsert_match(tx: &Transaction<'_>, m: &MatchRecord) -> Result<()> {
    let id = sql_id(m.id)?;
    let odds_json = match &m.odds {
        Some(odds) if !odds.is_empty() => {
            Some(serde_json::to_string(odds).context("encode odds json")?)
        }
        _ => None,
    };

    tx.execute(
        r#"
        INSERT INTO matches (
            match_id, league, kickoff, home_team, away_team,
            home_score, away_score, status, odds_json, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(match_id) DO UPDATE SET
            league = excluded.league,
            kickoff = excluded.kickoff,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            status = excluded.status,
            odds_json = excluded.odds_json,
            updated_at = excluded.updated_at
        "#,
        params![
            id,
            m.league,
            m.kickoff.to_rfc3339(),
            m.home_team,
            m.away_team,
            m.home_score,
            m.away_score,
            m.status.as_str(),
            odds_json,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {}", m.id))?;

    let s = &m.stats;
    tx.execute(
        r#"
        INSERT INTO match_stats (
            match_id, home_possession, away_possession, home_shots, away_shots,
            home_shots_on_target, away_shots_on_target, home_xg, away_xg,
            home_corners, away_corners
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(match_id) DO UPDATE SET
            home_possession = excluded.home_possession,
            away_possession = excluded.away_possession,
            home_shots = excluded.home_shots,
            away_shots = excluded.away_shots,
            home_shots_on_target = excluded.home_shots_on_target,
            away_shots_on_target = excluded.away_shots_on_target,
            home_xg = excluded.home_xg,
            away_xg = excluded.away_xg,
            home_corners = excluded.home_corners,
            away_corners = excluded.away_corners
        "#,
        params![
            id,
            s.home_possession,
            s.away_possession,
            s.home_shots,
            s.away_shots,
            s.home_shots_on_target,
            s.away_shots_on_target,
            s.home_xg,
            s.away_xg,
            s.home_corners,
            s.away_corners,
        ],
    )
    .with_context(|| format!("upsert stats for match {}", m.id))?;
    Ok(())
}

const SELECT_MATCH: &str = r#"
    SELECT
        m.match_id, m.league, m.kickoff, m.home_team, m.away_team,
        m.home_score, m.away_score, m.status, m.odds_json,
        s.home_possession, s.away_possession, s.home_shots, s.away_shots,
        s.home_shots_on_target, s.away_shots_on_target, s.home_xg, s.away_xg,
        s.home_corners, s.away_corners
    FROM matches m
    LEFT JOIN match_stats s ON s.match_id = m.match_id
"#;

/// The `limit` most recent finished matches of `league`, returned oldest first.
pub fn load_training_history(
    conn: &Connection,
    league: &str,
    limit: usize,
) -> Result<Vec<MatchRecord>> {
    let sql = format!(
        "{SELECT_MATCH}
        WHERE m.league = ?1
          AND m.status = 'finished'
          AND m.home_score IS NOT NULL
          AND m.away_score IS NOT NULL
        ORDER BY m.kickoff DESC, m.match_id DESC
        LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql).context("prepare training history query")?;
    let rows = stmt
        .query_map(
            params![league, i64::try_from(limit).unwrap_or(i64::MAX)],
            decode_row,
        )
        .context("query training history")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")??);
    }
    out.reverse();
    Ok(out)
}

pub fn load_match(conn: &Connection, match_id: u64) -> Result<Option<MatchRecord>> {
    let Ok(id) = i64::try_from(match_id) else {
        return Ok(None);
    };
    let sql = format!("{SELECT_MATCH} WHERE m.match_id = ?1");
    let found = conn
        .query_row(&sql, params![id], decode_row)
        .optional()
        .with_context(|| format!("load match {match_id}"))?;
    found.transpose()
}

pub fn league_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT league FROM matches ORDER BY league ASC")
        .context("prepare league query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query leagues")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode league row")?);
    }
    Ok(out)
}

// Column-level decoding stays inside rusqlite; kickoff, status and odds are parsed
// afterwards so their errors carry anyhow context.
fn decode_row(row: &Row<'_>) -> rusqlite::Result<Result<MatchRecord>> {
    let match_id = row.get::<_, i64>(0)?;
    let kickoff_raw: String = row.get(2)?;
    let status_raw: String = row.get(7)?;
    let odds_json: Option<String> = row.get(8)?;
    let stats = MatchStats {
        home_possession: row.get(9)?,
        away_possession: row.get(10)?,
        home_shots: row.get(11)?,
        away_shots: row.get(12)?,
        home_shots_on_target: row.get(13)?,
        away_shots_on_target: row.get(14)?,
        home_xg: row.get(15)?,
        away_xg: row.get(16)?,
        home_corners: row.get(17)?,
        away_corners: row.get(18)?,
    };
    let league: String = row.get(1)?;
    let home_team: String = row.get(3)?;
    let away_team: String = row.get(4)?;
    let home_score: Option<i32> = row.get(5)?;
    let away_score: Option<i32> = row.get(6)?;

    Ok((|| -> Result<MatchRecord> {
        let kickoff = DateTime::parse_from_rfc3339(&kickoff_raw)
            .with_context(|| format!("match {match_id}: bad kickoff '{kickoff_raw}'"))?
            .with_timezone(&Utc);
        let id = u64::try_from(match_id)
            .with_context(|| format!("negative match id {match_id}"))?;
        let status = MatchStatus::parse(&status_raw)
            .with_context(|| format!("match {match_id}: unknown status '{status_raw}'"))?;
        let odds = odds_json
            .as_deref()
            .map(serde_json::from_str::<OddsQuote>)
            .transpose()
            .with_context(|| format!("match {match_id}: bad odds json"))?;
        Ok(MatchRecord {
            id,
            league,
            kickoff,
            home_team,
            away_team,
            home_score,
            away_score,
            status,
            stats,
            odds,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: u64, day: u32, status: MatchStatus) -> MatchRecord {
        MatchRecord {
            id,
            league: "Premier League".to_string(),
            kickoff: Utc.with_ymd_and_hms(2024, 3, day, 15, 0, 0).unwrap(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            home_score: Some(2),
            away_score: Some(1),
            status,
            stats: MatchStats {
                home_possession: Some(58.0),
                home_xg: Some(1.9),
                ..MatchStats::default()
            },
            odds: Some(OddsQuote::from_1x2(1.9, 3.6, 4.2).unwrap()),
        }
    }

    #[test]
    fn history_is_limited_to_recent_finished_matches_in_order() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let records = vec![
            record(3, 10, MatchStatus::Finished),
            record(1, 1, MatchStatus::Finished),
            record(2, 5, MatchStatus::Finished),
            record(4, 12, MatchStatus::Scheduled),
        ];
        upsert_matches(&mut conn, &records).unwrap();

        let loaded = load_training_history(&conn, "Premier League", 2).unwrap();
        let ids: Vec<u64> = loaded.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(loaded[1], records[0]);
    }

    #[test]
    fn upsert_overwrites_by_id() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let mut m = record(7, 3, MatchStatus::Scheduled);
        m.home_score = None;
        m.away_score = None;
        m.odds = None;
        upsert_matches(&mut conn, std::slice::from_ref(&m)).unwrap();

        m.status = MatchStatus::Finished;
        m.home_score = Some(0);
        m.away_score = Some(0);
        upsert_matches(&mut conn, std::slice::from_ref(&m)).unwrap();

        assert_eq!(load_match(&conn, 7).unwrap(), Some(m));
        assert!(load_match(&conn, 8).unwrap().is_none());
        assert_eq!(league_names(&conn).unwrap(), vec!["Premier League".to_string()]);
    }

    #[test]
    fn ids_beyond_sqlite_range_are_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let huge = record(u64::MAX, 4, MatchStatus::Finished);
        let err = upsert_matches(&mut conn, &[record(1, 1, MatchStatus::Finished), huge])
            .unwrap_err();
        assert!(format!("{err:#}").contains("exceeds the sqlite integer range"), "{err:#}");
        // The failed batch is rolled back as a whole.
        assert!(load_match(&conn, 1).unwrap().is_none());
        assert!(load_match(&conn, u64::MAX).unwrap().is_none());
    }

    #[test]
    fn corrupt_rows_fail_to_load() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        upsert_matches(&mut conn, &[record(5, 2, MatchStatus::Finished)]).unwrap();

        conn.execute("UPDATE matches SET status = 'abandoned?' WHERE match_id = 5", [])
            .unwrap();
        let err = load_match(&conn, 5).unwrap_err();
        assert!(format!("{err:#}").contains("unknown status"), "{err:#}");

        conn.execute(
            "UPDATE matches SET status = 'finished', match_id = -5 WHERE match_id = 5",
            [],
        )
        .unwrap();
        let err = load_training_history(&conn, "Premier League", 10).unwrap_err();
        assert!(format!("{err:#}").contains("negative match id"), "{err:#}");
    }
}
