// ==========================================
// 羊群档案系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化；写操作接收调用方事务，仓储从不提交
// ==========================================

pub mod chat_repo;
pub mod error;
pub mod event_option_repo;
pub mod event_repo;
pub mod history_repo;
pub mod sheep_repo;

// 重导出核心仓储
pub use chat_repo::ChatHistoryRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use event_option_repo::EventOptionRepository;
pub use event_repo::SheepEventRepository;
pub use history_repo::HistoricalDataRepository;
pub use sheep_repo::SheepRepository;

use chrono::{DateTime, Utc};

/// 解析 RFC3339 时间戳列
pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
