// ==========================================
// 羊群档案系统 - 导入层
// ==========================================
// 职责: 外部工作簿 → 羊只主档 + 事件 + 历史数据
// 支持: Excel (.xlsx / .xls)
// 流程: 解析 → 对照表 → 基础资料 upsert → 派生记录（单事务）
// ==========================================

// 模块声明
pub mod analyzer;
pub mod basic_info_upserter;
pub mod date_normalizer;
pub mod derived_synthesizer;
pub mod error;
pub mod identity_cache;
pub mod lookup_builder;
pub mod sheep_importer;
pub mod workbook;

// 重导出核心类型
pub use analyzer::{analyze_workbook, PreviewRow, SheetPreview, WorkbookAnalysis};
pub use basic_info_upserter::BasicInfoSummary;
pub use date_normalizer::normalize_date;
pub use error::{ImportError, ImportResult, RowError};
pub use identity_cache::IdentityCache;
pub use lookup_builder::LookupTables;
pub use sheep_importer::{ImportReport, MappingSource, SheepImporter, SheetReport};
pub use workbook::{ParsedWorkbook, SheetTable};
