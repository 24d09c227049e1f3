// ==========================================
// 羊群档案系统 - 导入编排器
// ==========================================
// 职责: 整合导入流程，从工作簿字节到数据库
// 流程: 解析 → 解析映射配置 → 对照表 → 开启事务 → 身份缓存
//       → 基础资料 upsert → 重建身份缓存 → 派生记录 → 提交
// 约束:
// - 整个导入只有一个事务，显式传递给每个阶段
// - 任一阶段的非行级错误 → 回滚，数据库中不留任何痕迹
// - 对同一 owner 的导入不并发执行（由调用方持有连接锁保证）
// ==========================================

use crate::config::mapping_config::{default_mapping_config, MappingConfig};
use crate::config::ConfigManager;
use crate::importer::basic_info_upserter::{upsert_basic_info, BasicInfoSummary};
use crate::importer::derived_synthesizer::synthesize_derived_records;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::identity_cache::IdentityCache;
use crate::importer::lookup_builder::LookupTables;
use crate::importer::workbook::ParsedWorkbook;
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// MappingSource - 映射配置来源
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum MappingSource {
    /// 内置默认配置
    Default,
    /// 调用方提供的 JSON 文本
    Custom(String),
    /// owner 已保存的映射方案名
    Profile(String),
}

// ==========================================
// 导入报告
// ==========================================

/// 单个工作表的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub import_id: String,
    /// 基础资料表在前，其余按配置顺序
    pub sheets: Vec<SheetReport>,
    pub basic_info: Option<BasicInfoSummary>,
    pub derived_records: usize,
    pub elapsed_ms: u64,
}

// ==========================================
// SheepImporter - 导入编排器
// ==========================================
pub struct SheepImporter;

impl SheepImporter {
    /// 解析映射配置来源（任何写入之前）
    ///
    /// # 说明
    /// - Profile 通过 ConfigManager 读取，调用时不得持有导入连接的锁
    pub fn resolve_mapping(
        source: &MappingSource,
        owner_id: i64,
        profiles: &ConfigManager,
    ) -> ImportResult<MappingConfig> {
        match source {
            MappingSource::Default => Ok(default_mapping_config()),
            MappingSource::Custom(text) => MappingConfig::from_json(text)
                .map_err(|e| ImportError::Configuration(e.to_string())),
            MappingSource::Profile(name) => profiles
                .load_mapping_profile(owner_id, name)
                .map_err(|e| ImportError::Configuration(e.to_string()))?
                .ok_or_else(|| ImportError::Configuration(format!("映射方案不存在: {}", name))),
        }
    }

    /// 执行一次导入
    ///
    /// # 参数
    /// - conn: 独占的数据库连接（导入期间开启唯一事务）
    /// - owner_id: 数据归属
    /// - workbook_bytes: 工作簿原始字节
    /// - config: 已解析的映射配置
    ///
    /// # 返回
    /// - Ok(ImportReport): 已提交
    /// - Err: 已回滚
    #[instrument(skip(conn, workbook_bytes, config), fields(import_id))]
    pub fn import(
        conn: &mut Connection,
        owner_id: i64,
        workbook_bytes: &[u8],
        config: &MappingConfig,
    ) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let import_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("import_id", import_id.as_str());

        info!(
            owner_id,
            bytes = workbook_bytes.len(),
            configured_sheets = config.sheets.len(),
            "开始导入"
        );

        // === 步骤 1: 解析工作簿 ===
        let workbook = ParsedWorkbook::from_bytes(workbook_bytes)?;
        info!(sheets = ?workbook.sheet_names(), "工作簿解析完成");

        // === 步骤 2: 对照表（只读）===
        let lookups = LookupTables::build(&workbook, config);

        // === 步骤 3: 事务内执行各阶段 ===
        let tx = conn.transaction()?;
        match Self::run_phases(&tx, owner_id, &workbook, config, &lookups) {
            Ok((sheets, basic_info, derived_records)) => {
                tx.commit()?;
                let elapsed_ms = start_time.elapsed().as_millis() as u64;
                info!(
                    sheets = sheets.len(),
                    derived_records,
                    elapsed_ms,
                    "导入完成，事务已提交"
                );
                Ok(ImportReport {
                    import_id,
                    sheets,
                    basic_info,
                    derived_records,
                    elapsed_ms,
                })
            }
            Err(e) => {
                error!(error = %e, "导入失败，事务回滚");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "显式回滚失败（连接关闭时仍会回滚）");
                }
                Err(e)
            }
        }
    }

    fn run_phases(
        tx: &Transaction,
        owner_id: i64,
        workbook: &ParsedWorkbook,
        config: &MappingConfig,
        lookups: &LookupTables,
    ) -> ImportResult<(Vec<SheetReport>, Option<BasicInfoSummary>, usize)> {
        let mut sheets = Vec::new();

        let cache = IdentityCache::materialize(tx, owner_id)?;

        let outcome = upsert_basic_info(tx, owner_id, workbook, config, lookups, cache)?;
        let basic_info = outcome.processed.map(|(sheet, summary)| {
            sheets.push(SheetReport {
                sheet,
                message: format!(
                    "processed: {} created, {} updated",
                    summary.created, summary.updated
                ),
            });
            summary
        });

        let derived = synthesize_derived_records(tx, owner_id, workbook, config, &outcome.cache)?;
        let derived_records = derived.iter().map(|d| d.records).sum();
        sheets.extend(derived.into_iter().map(|d| SheetReport {
            sheet: d.sheet_name,
            message: format!("imported {} records", d.records),
        }));

        Ok((sheets, basic_info, derived_records))
    }
}
