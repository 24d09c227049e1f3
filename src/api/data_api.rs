// ==========================================
// 羊群档案系统 - 数据导入导出 API
// ==========================================
// 职责: 工作簿导入 / 导出 / 结构分析 / 映射方案管理
// 并发: 连接由 Mutex 保护，同一时刻只有一个导入在执行
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{default_mapping_json, ConfigManager, MappingConfig};
use crate::db::open_and_migrate;
use crate::exporter::ExcelExporter;
use crate::importer::{analyze_workbook, ImportReport, MappingSource, SheepImporter, WorkbookAnalysis};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

// ==========================================
// DataApi - 数据导入导出 API
// ==========================================
pub struct DataApi {
    conn: Arc<Mutex<Connection>>,
    config_manager: ConfigManager,
}

impl DataApi {
    /// 从共享连接创建
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let config_manager = ConfigManager::from_connection(conn.clone());
        Self {
            conn,
            config_manager,
        }
    }

    /// 打开数据库文件（自动建表）
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = open_and_migrate(db_path)?;
        Ok(Self::new(Arc::new(Mutex::new(conn))))
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ApiError::DatabaseError(format!("数据库锁获取失败: {}", e)))
    }

    /// 导入工作簿
    ///
    /// # 参数
    /// - owner_id: 数据归属
    /// - workbook_bytes: 工作簿字节
    /// - source: 映射配置来源（默认 / 自定义 JSON / 已保存方案）
    ///
    /// # 返回
    /// - Ok(ImportReport): 全部写入已提交
    /// - Err(Configuration): 映射配置无效，未做任何写入
    /// - Err(Conflict / TransientIo / ImportFailed): 已回滚
    pub fn import_workbook(
        &self,
        owner_id: i64,
        workbook_bytes: &[u8],
        source: &MappingSource,
    ) -> ApiResult<ImportReport> {
        // 映射方案读取需要连接锁，必须在持有导入锁之前完成
        let config = SheepImporter::resolve_mapping(source, owner_id, &self.config_manager)?;

        let mut conn = self.lock()?;
        let report = SheepImporter::import(&mut conn, owner_id, workbook_bytes, &config)?;
        Ok(report)
    }

    /// 导出 owner 的全部数据为 xlsx 字节
    pub fn export_workbook(&self, owner_id: i64) -> ApiResult<Vec<u8>> {
        let conn = self.lock()?;
        let bytes = ExcelExporter::export_owner(&conn, owner_id)?;
        Ok(bytes)
    }

    /// 分析工作簿结构（不访问数据库）
    pub fn analyze_workbook(&self, workbook_bytes: &[u8]) -> ApiResult<WorkbookAnalysis> {
        Ok(analyze_workbook(workbook_bytes)?)
    }

    /// 默认映射配置（JSON 文本，带版本号，供调用方作为自定义配置的起点）
    pub fn default_mapping_json(&self) -> ApiResult<String> {
        default_mapping_json().map_err(|e| ApiError::Other(e.into()))
    }

    // ==========================================
    // 映射方案
    // ==========================================

    /// 校验并保存映射方案
    pub fn save_mapping_profile(&self, owner_id: i64, name: &str, config_json: &str) -> ApiResult<()> {
        let config = MappingConfig::from_json(config_json)
            .map_err(|e| ApiError::Configuration(e.to_string()))?;
        self.config_manager
            .save_mapping_profile(owner_id, name, &config)?;
        info!(owner_id, profile = name, sheets = config.sheets.len(), "映射方案已更新");
        Ok(())
    }

    pub fn load_mapping_profile(&self, owner_id: i64, name: &str) -> ApiResult<MappingConfig> {
        self.config_manager
            .load_mapping_profile(owner_id, name)?
            .ok_or_else(|| ApiError::NotFound(format!("映射方案 {}", name)))
    }

    pub fn list_mapping_profiles(&self, owner_id: i64) -> ApiResult<Vec<String>> {
        Ok(self.config_manager.list_mapping_profiles(owner_id)?)
    }
}
