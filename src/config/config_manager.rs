// ==========================================
// 羊群档案系统 - 配置管理器
// ==========================================
// 职责: 自定义映射方案（mapping profile）的持久化与读取
// 存储: config_kv 表 (scope_id + key → value)
// 约定: scope_id = "owner/<owner_id>"，key = "mapping_profile/<方案名>"
// ==========================================

use crate::config::mapping_config::MappingConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

const PROFILE_KEY_PREFIX: &str = "mapping_profile/";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn scope_id(owner_id: i64) -> String {
        format!("owner/{}", owner_id)
    }

    fn profile_key(name: &str) -> RepositoryResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::ValidationError(
                "映射方案名称不能为空".to_string(),
            ));
        }
        Ok(format!("{}{}", PROFILE_KEY_PREFIX, name))
    }

    /// 读取 scope 下的配置值
    fn get_config_value(&self, scope_id: &str, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope_id, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 保存（覆盖）映射方案
    pub fn save_mapping_profile(
        &self,
        owner_id: i64,
        name: &str,
        config: &MappingConfig,
    ) -> RepositoryResult<()> {
        let key = Self::profile_key(name)?;
        let value = config
            .to_json()
            .map_err(|e| RepositoryError::ValidationError(e.to_string()))?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![Self::scope_id(owner_id), key, value],
        )?;

        tracing::info!(owner_id, profile = name, "映射方案已保存");
        Ok(())
    }

    /// 读取映射方案
    ///
    /// # 返回
    /// - Ok(None): 方案不存在
    /// - Err(ValidationError): 存储内容无法解析
    pub fn load_mapping_profile(
        &self,
        owner_id: i64,
        name: &str,
    ) -> RepositoryResult<Option<MappingConfig>> {
        let key = Self::profile_key(name)?;
        let raw = match self.get_config_value(&Self::scope_id(owner_id), &key)? {
            Some(v) => v,
            None => return Ok(None),
        };

        let config = MappingConfig::from_json(&raw)
            .map_err(|e| RepositoryError::ValidationError(format!("映射方案 {} 已损坏: {}", name, e)))?;
        Ok(Some(config))
    }

    /// 列出 owner 的全部映射方案名称（按名称排序）
    pub fn list_mapping_profiles(&self, owner_id: i64) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT key FROM config_kv WHERE scope_id = ?1 AND key LIKE ?2 ORDER BY key",
        )?;
        let names = stmt
            .query_map(
                params![Self::scope_id(owner_id), format!("{}%", PROFILE_KEY_PREFIX)],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(PROFILE_KEY_PREFIX).map(str::to_string))
            .collect();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::mapping_config::default_mapping_config;
    use crate::db::ensure_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_save_and_load_profile() {
        let mgr = manager();
        let config = default_mapping_config();
        mgr.save_mapping_profile(1, "standard", &config).unwrap();
        assert_eq!(mgr.load_mapping_profile(1, "standard").unwrap(), Some(config));
        assert_eq!(mgr.load_mapping_profile(2, "standard").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites_and_lists_sorted() {
        let mgr = manager();
        mgr.save_mapping_profile(1, "b", &MappingConfig::default()).unwrap();
        mgr.save_mapping_profile(1, "a", &MappingConfig::default()).unwrap();
        mgr.save_mapping_profile(1, "a", &default_mapping_config()).unwrap();
        assert_eq!(mgr.list_mapping_profiles(1).unwrap(), vec!["a", "b"]);
        assert_eq!(
            mgr.load_mapping_profile(1, "a").unwrap(),
            Some(default_mapping_config())
        );
    }

    #[test]
    fn test_empty_profile_name_rejected() {
        let mgr = manager();
        let err = mgr
            .save_mapping_profile(1, "  ", &MappingConfig::default())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
    }
}
