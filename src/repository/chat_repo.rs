// ==========================================
// 羊群档案系统 - 助手对话记录仓储
// ==========================================
// 职责: chat_history 表的追加与有序读取
// ==========================================

use crate::domain::ChatMessage;
use crate::repository::error::RepositoryResult;
use crate::repository::parse_timestamp;
use chrono::Utc;
use rusqlite::{params, Connection, Transaction};

pub struct ChatHistoryRepository;

impl ChatHistoryRepository {
    /// 在事务中追加一条对话消息
    pub fn insert_tx(
        tx: &Transaction,
        owner_id: i64,
        session_id: &str,
        role: &str,
        content: &str,
        ear_num_context: Option<&str>,
    ) -> RepositoryResult<i64> {
        tx.execute(
            r#"
            INSERT INTO chat_history (owner_id, session_id, role, content, timestamp, ear_num_context)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                owner_id,
                session_id,
                role,
                content,
                Utc::now().to_rfc3339(),
                ear_num_context,
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 查询 owner 的全部对话（时间升序）
    pub fn list_by_owner(conn: &Connection, owner_id: i64) -> RepositoryResult<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, owner_id, session_id, role, content, timestamp, ear_num_context
            FROM chat_history
            WHERE owner_id = ?1
            ORDER BY timestamp ASC, id ASC
            "#,
        )?;
        let messages = stmt
            .query_map(params![owner_id], |row| {
                let ts: String = row.get(5)?;
                Ok(ChatMessage {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    session_id: row.get(2)?,
                    role: row.get(3)?,
                    content: row.get(4)?,
                    timestamp: parse_timestamp(5, &ts)?,
                    ear_num_context: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}
