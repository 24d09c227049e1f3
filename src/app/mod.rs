// ==========================================
// 羊群档案系统 - 应用层
// ==========================================
// 职责: 组装共享连接与各 API 实例，供命令行 / HTTP 层使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
