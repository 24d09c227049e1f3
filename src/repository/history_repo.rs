// ==========================================
// 羊群档案系统 - 历史数据仓储
// ==========================================
// 职责: sheep_historical_data 表的数据访问（追加式时间序列）
// ==========================================

use crate::domain::{HistoricalDataPoint, NewHistoricalDataPoint};
use crate::repository::error::RepositoryResult;
use crate::repository::parse_timestamp;
use chrono::Utc;
use rusqlite::{params, Connection, Row, Transaction};

const HISTORY_COLUMNS: &str =
    "h.id, h.owner_id, h.sheep_id, h.record_date, h.record_type, h.value, h.notes, h.recorded_at";

pub struct HistoricalDataRepository;

impl HistoricalDataRepository {
    fn map_row(row: &Row<'_>) -> rusqlite::Result<HistoricalDataPoint> {
        let recorded_at: String = row.get(7)?;
        Ok(HistoricalDataPoint {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            sheep_id: row.get(2)?,
            record_date: row.get(3)?,
            metric: row.get(4)?,
            value: row.get(5)?,
            notes: row.get(6)?,
            recorded_at: parse_timestamp(7, &recorded_at)?,
        })
    }

    /// 在事务中追加数据点，返回新 id
    pub fn insert_tx(tx: &Transaction, point: &NewHistoricalDataPoint) -> RepositoryResult<i64> {
        tx.execute(
            r#"
            INSERT INTO sheep_historical_data (
                owner_id, sheep_id, record_date, record_type, value, notes, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                point.owner_id,
                point.sheep_id,
                point.record_date,
                point.metric,
                point.value,
                point.notes,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 查询羊只的历史数据（日期升序，同日按 id 升序）
    pub fn list_by_sheep(
        conn: &Connection,
        sheep_id: i64,
    ) -> RepositoryResult<Vec<HistoricalDataPoint>> {
        let sql = format!(
            "SELECT {} FROM sheep_historical_data h WHERE h.sheep_id = ?1 \
             ORDER BY h.record_date ASC, h.id ASC",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let points = stmt
            .query_map(params![sheep_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    /// 在事务中删除数据点（限定 owner）
    pub fn delete_tx(tx: &Transaction, owner_id: i64, record_id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM sheep_historical_data WHERE id = ?1 AND owner_id = ?2",
            params![record_id, owner_id],
        )?;
        Ok(affected)
    }

    /// 导出用：owner 的全部历史数据，附带耳号（耳号升序，日期升序）
    pub fn list_for_export(
        conn: &Connection,
        owner_id: i64,
    ) -> RepositoryResult<Vec<(String, HistoricalDataPoint)>> {
        let sql = format!(
            "SELECT {}, s.\"EarNum\" FROM sheep_historical_data h \
             JOIN sheep s ON s.id = h.sheep_id \
             WHERE s.owner_id = ?1 \
             ORDER BY s.\"EarNum\", h.record_date ASC, h.id ASC",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                Ok((row.get::<_, String>(8)?, Self::map_row(row)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, ensure_schema};
    use crate::domain::Sheep;
    use crate::repository::SheepRepository;

    #[test]
    fn test_history_cascades_with_sheep() {
        let mut conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let tx = conn.transaction().unwrap();
        let sheep_id = SheepRepository::insert_tx(&tx, &Sheep::new(1, "G001")).unwrap();
        for (date, value) in [("2024-01-02", 1.5), ("2024-01-01", 1.2)] {
            HistoricalDataRepository::insert_tx(
                &tx,
                &NewHistoricalDataPoint {
                    owner_id: 1,
                    sheep_id,
                    record_date: date.to_string(),
                    metric: "milk_yield".to_string(),
                    value,
                    notes: None,
                },
            )
            .unwrap();
        }
        tx.commit().unwrap();

        let points = HistoricalDataRepository::list_by_sheep(&conn, sheep_id).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].record_date, "2024-01-01");

        let tx = conn.transaction().unwrap();
        SheepRepository::delete_tx(&tx, 1, "G001").unwrap();
        tx.commit().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM sheep_historical_data", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
