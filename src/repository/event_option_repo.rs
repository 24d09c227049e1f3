// ==========================================
// 羊群档案系统 - 事件下拉选项仓储
// ==========================================
// 职责: event_type_option / event_description_option 表的增删查
// 排序: 默认项在前，其余按名称升序
// ==========================================

use crate::domain::{EventDescriptionOption, EventTypeOption, DEFAULT_EVENT_OPTIONS};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

const TYPE_COLUMNS: &str = "id, owner_id, name, is_default";
const DESCRIPTION_COLUMNS: &str = "id, owner_id, event_type_option_id, description, is_default";

pub struct EventOptionRepository;

impl EventOptionRepository {
    fn map_type(row: &Row) -> rusqlite::Result<EventTypeOption> {
        Ok(EventTypeOption {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            is_default: row.get(3)?,
            descriptions: Vec::new(),
        })
    }

    fn map_description(row: &Row) -> rusqlite::Result<EventDescriptionOption> {
        Ok(EventDescriptionOption {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            event_type_option_id: row.get(2)?,
            description: row.get(3)?,
            is_default: row.get(4)?,
        })
    }

    fn descriptions_of(
        conn: &Connection,
        type_id: i64,
    ) -> RepositoryResult<Vec<EventDescriptionOption>> {
        let sql = format!(
            "SELECT {} FROM event_description_option \
             WHERE event_type_option_id = ?1 \
             ORDER BY is_default DESC, description ASC",
            DESCRIPTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![type_id], Self::map_description)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 查询 owner 的全部事件类型（含描述）
    pub fn list_types(conn: &Connection, owner_id: i64) -> RepositoryResult<Vec<EventTypeOption>> {
        let sql = format!(
            "SELECT {} FROM event_type_option WHERE owner_id = ?1 \
             ORDER BY is_default DESC, name ASC",
            TYPE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut types = stmt
            .query_map(params![owner_id], Self::map_type)?
            .collect::<Result<Vec<_>, _>>()?;
        for option in &mut types {
            option.descriptions = Self::descriptions_of(conn, option.id)?;
        }
        Ok(types)
    }

    pub fn count_types(conn: &Connection, owner_id: i64) -> RepositoryResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM event_type_option WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 按 id 查找事件类型（限定 owner，含描述）
    pub fn find_type(
        conn: &Connection,
        owner_id: i64,
        type_id: i64,
    ) -> RepositoryResult<Option<EventTypeOption>> {
        let sql = format!(
            "SELECT {} FROM event_type_option WHERE id = ?1 AND owner_id = ?2",
            TYPE_COLUMNS
        );
        let found = conn
            .query_row(&sql, params![type_id, owner_id], Self::map_type)
            .optional()?;
        match found {
            Some(mut option) => {
                option.descriptions = Self::descriptions_of(conn, option.id)?;
                Ok(Some(option))
            }
            None => Ok(None),
        }
    }

    pub fn type_name_exists(conn: &Connection, owner_id: i64, name: &str) -> RepositoryResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM event_type_option WHERE owner_id = ?1 AND name = ?2",
                params![owner_id, name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 按 id 查找描述选项（限定 owner）
    pub fn find_description(
        conn: &Connection,
        owner_id: i64,
        description_id: i64,
    ) -> RepositoryResult<Option<EventDescriptionOption>> {
        let sql = format!(
            "SELECT {} FROM event_description_option WHERE id = ?1 AND owner_id = ?2",
            DESCRIPTION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![description_id, owner_id], Self::map_description)
            .optional()?)
    }

    pub fn insert_type_tx(
        tx: &Transaction,
        owner_id: i64,
        name: &str,
        is_default: bool,
    ) -> RepositoryResult<i64> {
        tx.execute(
            "INSERT INTO event_type_option (owner_id, name, is_default) VALUES (?1, ?2, ?3)",
            params![owner_id, name, is_default],
        )?;
        Ok(tx.last_insert_rowid())
    }

    pub fn insert_description_tx(
        tx: &Transaction,
        owner_id: i64,
        type_id: i64,
        description: &str,
        is_default: bool,
    ) -> RepositoryResult<i64> {
        tx.execute(
            r#"
            INSERT INTO event_description_option (owner_id, event_type_option_id, description, is_default)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![owner_id, type_id, description, is_default],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 删除事件类型（其描述级联删除）
    pub fn delete_type_tx(tx: &Transaction, owner_id: i64, type_id: i64) -> RepositoryResult<usize> {
        Ok(tx.execute(
            "DELETE FROM event_type_option WHERE id = ?1 AND owner_id = ?2",
            params![type_id, owner_id],
        )?)
    }

    pub fn delete_description_tx(
        tx: &Transaction,
        owner_id: i64,
        description_id: i64,
    ) -> RepositoryResult<usize> {
        Ok(tx.execute(
            "DELETE FROM event_description_option WHERE id = ?1 AND owner_id = ?2",
            params![description_id, owner_id],
        )?)
    }

    /// 写入默认选项，返回新增的事件类型数
    pub fn seed_defaults_tx(tx: &Transaction, owner_id: i64) -> RepositoryResult<usize> {
        for (type_name, descriptions) in DEFAULT_EVENT_OPTIONS {
            let type_id = Self::insert_type_tx(tx, owner_id, type_name, true)?;
            for description in descriptions.iter() {
                Self::insert_description_tx(tx, owner_id, type_id, description, true)?;
            }
        }
        Ok(DEFAULT_EVENT_OPTIONS.len())
    }
}
