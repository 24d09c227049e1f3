// ==========================================
// 羊群档案系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 统一建表脚本，(owner_id, ear_num) 唯一约束由存储层强制
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS sheep (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    "EarNum" TEXT NOT NULL,
    "BirthDate" TEXT,
    "Sex" TEXT,
    "Breed" TEXT,
    "Sire" TEXT,
    "Dam" TEXT,
    "BirWei" REAL,
    "SireBre" TEXT,
    "DamBre" TEXT,
    "MoveCau" TEXT,
    "MoveDate" TEXT,
    "Class" TEXT,
    "LittleSize" INTEGER,
    "Lactation" INTEGER,
    "ManaClas" TEXT,
    "FarmNum" TEXT,
    "RUni" TEXT,
    "Body_Weight_kg" REAL,
    "Age_Months" INTEGER,
    "breed_category" TEXT,
    "status" TEXT,
    "status_description" TEXT,
    "target_average_daily_gain_g" REAL,
    "milk_yield_kg_day" REAL,
    "milk_fat_percentage" REAL,
    "number_of_fetuses" INTEGER,
    "expected_fiber_yield_g_day" REAL,
    "activity_level" TEXT,
    "other_remarks" TEXT,
    "agent_notes" TEXT,
    "next_vaccination_due_date" TEXT,
    "next_deworming_due_date" TEXT,
    "expected_lambing_date" TEXT,
    last_updated TEXT NOT NULL,
    CONSTRAINT uq_owner_ear_num UNIQUE (owner_id, "EarNum")
);

CREATE TABLE IF NOT EXISTS sheep_event (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    sheep_id INTEGER NOT NULL REFERENCES sheep(id) ON DELETE CASCADE,
    event_date TEXT NOT NULL,
    event_type TEXT NOT NULL,
    description TEXT,
    notes TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sheep_event_sheep ON sheep_event(sheep_id, event_date);

CREATE TABLE IF NOT EXISTS sheep_historical_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    sheep_id INTEGER NOT NULL REFERENCES sheep(id) ON DELETE CASCADE,
    record_date TEXT NOT NULL,
    record_type TEXT NOT NULL,
    value REAL NOT NULL,
    notes TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_sheep ON sheep_historical_data(sheep_id, record_type, record_date);

CREATE TABLE IF NOT EXISTS chat_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    ear_num_context TEXT
);

CREATE TABLE IF NOT EXISTS event_type_option (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0,
    CONSTRAINT uq_owner_event_type UNIQUE (owner_id, name)
);

CREATE TABLE IF NOT EXISTS event_description_option (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    event_type_option_id INTEGER NOT NULL REFERENCES event_type_option(id) ON DELETE CASCADE,
    description TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0,
    CONSTRAINT uq_type_description UNIQUE (event_type_option_id, description)
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（级联删除依赖它）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表（幂等）并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 打开连接、应用 PRAGMA 并确保表结构存在
pub fn open_and_migrate(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    ensure_schema(&conn)?;

    match read_schema_version(&conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema_version 高于当前程序版本"
            );
        }
        _ => {}
    }

    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
