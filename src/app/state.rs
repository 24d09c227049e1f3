// ==========================================
// 羊群档案系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接和 API 实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ApiResult, DataApi, EventOptionApi, SheepApi};
use crate::db::open_and_migrate;

/// 显式指定数据库路径的环境变量
pub const DB_PATH_ENV: &str = "FLOCK_LEDGER_DB_PATH";

const DB_FILE_NAME: &str = "flock_ledger.db";

/// 应用状态
///
/// 所有 API 共享同一个连接（Mutex 串行化写入）
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入导出 API
    pub data_api: Arc<DataApi>,

    /// 羊只维护 API
    pub sheep_api: Arc<SheepApi>,

    /// 事件下拉选项 API
    pub event_option_api: Arc<EventOptionApi>,
}

impl AppState {
    /// 打开数据库并创建全部 API 实例
    pub fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!(db_path = %db_path, "初始化应用状态");
        let conn = Arc::new(Mutex::new(open_and_migrate(&db_path)?));

        Ok(Self {
            data_api: Arc::new(DataApi::new(conn.clone())),
            sheep_api: Arc::new(SheepApi::new(conn.clone())),
            event_option_api: Arc::new(EventOptionApi::new(conn)),
            db_path,
        })
    }

    /// 从已有连接创建（测试 / 嵌入场景）
    pub fn from_connection(conn: Connection) -> Self {
        let conn = Arc::new(Mutex::new(conn));
        Self {
            db_path: String::from(":memory:"),
            data_api: Arc::new(DataApi::new(conn.clone())),
            sheep_api: Arc::new(SheepApi::new(conn.clone())),
            event_option_api: Arc::new(EventOptionApi::new(conn)),
        }
    }
}

/// 默认数据库路径
///
/// 优先级: 环境变量 FLOCK_LEDGER_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(format!("./{}", DB_FILE_NAME));

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let app_dir = data_dir.join("flock-ledger-dev");

        #[cfg(not(debug_assertions))]
        let app_dir = data_dir.join("flock-ledger");

        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&app_dir).is_ok() {
            path = app_dir.join(DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}
