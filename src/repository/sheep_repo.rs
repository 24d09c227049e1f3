// ==========================================
// 羊群档案系统 - 羊只主档仓储
// ==========================================
// 职责: sheep 表的 CRUD 与按 owner 的批量有序读取
// 红线: 不含业务逻辑，只负责数据访问
// 约束: 所有写操作在调用方提供的事务内执行，仓储自身从不提交
// ==========================================

use crate::domain::{FieldValue, Sheep, SheepField};
use crate::repository::error::RepositoryResult;
use crate::repository::parse_timestamp;
use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashMap;

/// 属性列起始下标（id, owner_id, EarNum 之后）
const ATTRIBUTE_OFFSET: usize = 3;

// ==========================================
// SheepRepository - 羊只主档仓储
// ==========================================
pub struct SheepRepository;

impl SheepRepository {
    /// SELECT 列清单：id, owner_id, EarNum, <属性列...>, last_updated
    fn select_columns() -> String {
        let mut cols = vec![
            "id".to_string(),
            "owner_id".to_string(),
            "\"EarNum\"".to_string(),
        ];
        cols.extend(SheepField::attributes().map(|f| format!("\"{}\"", f.name())));
        cols.push("last_updated".to_string());
        cols.join(", ")
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Sheep> {
        let mut sheep = Sheep {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            ear_num: row.get(2)?,
            attributes: Default::default(),
            last_updated: Utc::now(),
        };

        let mut idx = ATTRIBUTE_OFFSET;
        for field in SheepField::attributes() {
            if let Some(value) = row.get::<_, Option<FieldValue>>(idx)? {
                sheep.attributes.insert(field, value.conform(field.kind()));
            }
            idx += 1;
        }

        let raw: String = row.get(idx)?;
        sheep.last_updated = parse_timestamp(idx, &raw)?;
        Ok(sheep)
    }

    /// 按 (owner, 耳号) 查询
    pub fn find_by_ear_num(
        conn: &Connection,
        owner_id: i64,
        ear_num: &str,
    ) -> RepositoryResult<Option<Sheep>> {
        let sql = format!(
            "SELECT {} FROM sheep WHERE owner_id = ?1 AND \"EarNum\" = ?2",
            Self::select_columns()
        );
        let sheep = conn
            .query_row(&sql, params![owner_id, ear_num], Self::map_row)
            .optional()?;
        Ok(sheep)
    }

    /// 查询 owner 的全部羊只（按耳号排序）
    pub fn list_by_owner(conn: &Connection, owner_id: i64) -> RepositoryResult<Vec<Sheep>> {
        let sql = format!(
            "SELECT {} FROM sheep WHERE owner_id = ?1 ORDER BY \"EarNum\"",
            Self::select_columns()
        );
        let mut stmt = conn.prepare(&sql)?;
        let sheep = stmt
            .query_map(params![owner_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sheep)
    }

    /// 读取 owner 的 耳号 → 内部 id 全量索引
    ///
    /// # 说明
    /// - 在事务内调用时可以看到本事务已写入但尚未提交的行
    pub fn load_ear_num_index(
        conn: &Connection,
        owner_id: i64,
    ) -> RepositoryResult<HashMap<String, i64>> {
        let mut stmt = conn.prepare("SELECT \"EarNum\", id FROM sheep WHERE owner_id = ?1")?;
        let index = stmt
            .query_map(params![owner_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(index)
    }

    /// 在事务中插入羊只，返回新 id
    ///
    /// # 说明
    /// - (owner_id, EarNum) 重复时返回 UniqueConstraintViolation
    pub fn insert_tx(tx: &Transaction, sheep: &Sheep) -> RepositoryResult<i64> {
        let mut cols = vec!["owner_id".to_string(), "\"EarNum\"".to_string()];
        let mut values: Vec<&dyn ToSql> = vec![&sheep.owner_id, &sheep.ear_num];
        for (field, value) in &sheep.attributes {
            cols.push(format!("\"{}\"", field.name()));
            values.push(value);
        }
        let last_updated = sheep.last_updated.to_rfc3339();
        cols.push("last_updated".to_string());
        values.push(&last_updated);

        let placeholders = (1..=values.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO sheep ({}) VALUES ({})",
            cols.join(", "),
            placeholders
        );

        tx.execute(&sql, values.as_slice())?;
        Ok(tx.last_insert_rowid())
    }

    /// 在事务中按字段更新（只写入给定字段，并刷新 last_updated）
    pub fn update_fields_tx(
        tx: &Transaction,
        sheep_id: i64,
        fields: &[(SheepField, FieldValue)],
    ) -> RepositoryResult<usize> {
        let last_updated = Utc::now().to_rfc3339();
        let mut sets = Vec::with_capacity(fields.len() + 1);
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(fields.len() + 2);

        for (field, value) in fields.iter().filter(|(f, _)| *f != SheepField::EarNum) {
            values.push(value);
            sets.push(format!("\"{}\" = ?{}", field.name(), values.len()));
        }
        values.push(&last_updated);
        sets.push(format!("last_updated = ?{}", values.len()));
        values.push(&sheep_id);

        let sql = format!(
            "UPDATE sheep SET {} WHERE id = ?{}",
            sets.join(", "),
            values.len()
        );
        let affected = tx.execute(&sql, values.as_slice())?;
        Ok(affected)
    }

    /// 在事务中删除羊只（事件与历史数据由外键级联删除）
    pub fn delete_tx(tx: &Transaction, owner_id: i64, ear_num: &str) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM sheep WHERE owner_id = ?1 AND \"EarNum\" = ?2",
            params![owner_id, ear_num],
        )?;
        Ok(affected)
    }
}
