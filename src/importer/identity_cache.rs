// ==========================================
// 羊群档案系统 - 耳号身份缓存
// ==========================================
// 职责: 耳号 → 羊只内部 id 的只读快照
// 约束: 只能通过 materialize 在当前事务内全量读取构建，
//       保证包含本次导入刚写入但尚未提交的羊只
// ==========================================

use crate::importer::error::ImportResult;
use crate::repository::SheepRepository;
use rusqlite::Connection;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct IdentityCache {
    index: HashMap<String, i64>,
}

impl IdentityCache {
    /// 从存储全量构建（传入事务即可看到事务内写入）
    pub fn materialize(conn: &Connection, owner_id: i64) -> ImportResult<Self> {
        let index = SheepRepository::load_ear_num_index(conn, owner_id)?;
        Ok(Self { index })
    }

    pub fn resolve(&self, ear_num: &str) -> Option<i64> {
        self.index.get(ear_num).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
