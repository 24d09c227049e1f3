// ==========================================
// 羊群档案系统 - 事件日志仓储
// ==========================================
// 职责: sheep_event 表的数据访问
// 红线: 不含业务逻辑；写操作只在调用方事务内执行
// ==========================================

use crate::domain::{NewSheepEvent, SheepEvent};
use crate::repository::error::RepositoryResult;
use crate::repository::parse_timestamp;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

const EVENT_COLUMNS: &str =
    "e.id, e.owner_id, e.sheep_id, e.event_date, e.event_type, e.description, e.notes, e.recorded_at";

pub struct SheepEventRepository;

impl SheepEventRepository {
    fn map_row(row: &Row<'_>) -> rusqlite::Result<SheepEvent> {
        let recorded_at: String = row.get(7)?;
        Ok(SheepEvent {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            sheep_id: row.get(2)?,
            event_date: row.get(3)?,
            event_type: row.get(4)?,
            description: row.get(5)?,
            notes: row.get(6)?,
            recorded_at: parse_timestamp(7, &recorded_at)?,
        })
    }

    /// 在事务中追加事件，返回新 id
    pub fn insert_tx(tx: &Transaction, event: &NewSheepEvent) -> RepositoryResult<i64> {
        tx.execute(
            r#"
            INSERT INTO sheep_event (
                owner_id, sheep_id, event_date, event_type, description, notes, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                event.owner_id,
                event.sheep_id,
                event.event_date,
                event.event_type,
                event.description,
                event.notes,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 查询羊只的事件（日期倒序，同日按 id 倒序）
    pub fn list_by_sheep(
        conn: &Connection,
        sheep_id: i64,
        limit: Option<usize>,
    ) -> RepositoryResult<Vec<SheepEvent>> {
        let sql = format!(
            "SELECT {} FROM sheep_event e WHERE e.sheep_id = ?1 \
             ORDER BY e.event_date DESC, e.id DESC LIMIT ?2",
            EVENT_COLUMNS
        );
        // SQLite 中 LIMIT -1 表示不限制
        let limit = limit.map(|n| n as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![sheep_id, limit], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// 按 id 查询（限定 owner）
    pub fn find_by_id(
        conn: &Connection,
        owner_id: i64,
        event_id: i64,
    ) -> RepositoryResult<Option<SheepEvent>> {
        let sql = format!(
            "SELECT {} FROM sheep_event e WHERE e.id = ?1 AND e.owner_id = ?2",
            EVENT_COLUMNS
        );
        let event = conn
            .query_row(&sql, params![event_id, owner_id], Self::map_row)
            .optional()?;
        Ok(event)
    }

    /// 在事务中更新事件的日期/类型/描述/备注（限定 owner）
    pub fn update_tx(
        tx: &Transaction,
        owner_id: i64,
        event_id: i64,
        event_date: &str,
        event_type: &str,
        description: Option<&str>,
        notes: Option<&str>,
    ) -> RepositoryResult<usize> {
        let affected = tx.execute(
            r#"
            UPDATE sheep_event
            SET event_date = ?3, event_type = ?4, description = ?5, notes = ?6
            WHERE id = ?1 AND owner_id = ?2
            "#,
            params![event_id, owner_id, event_date, event_type, description, notes],
        )?;
        Ok(affected)
    }

    /// 在事务中删除事件（限定 owner）
    pub fn delete_tx(tx: &Transaction, owner_id: i64, event_id: i64) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM sheep_event WHERE id = ?1 AND owner_id = ?2",
            params![event_id, owner_id],
        )?;
        Ok(affected)
    }

    /// 导出用：owner 的全部事件，附带耳号（耳号升序，日期倒序）
    pub fn list_for_export(
        conn: &Connection,
        owner_id: i64,
    ) -> RepositoryResult<Vec<(String, SheepEvent)>> {
        let sql = format!(
            "SELECT {}, s.\"EarNum\" FROM sheep_event e \
             JOIN sheep s ON s.id = e.sheep_id \
             WHERE s.owner_id = ?1 \
             ORDER BY s.\"EarNum\", e.event_date DESC, e.id DESC",
            EVENT_COLUMNS
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
