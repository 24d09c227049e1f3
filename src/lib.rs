// ==========================================
// 羊群档案系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格导入导出对账引擎（多 owner 羊只档案）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部工作簿
pub mod importer;

// 导出层 - 工作簿生成
pub mod exporter;

// 配置层 - 映射配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    ChatMessage, EventDescriptionOption, EventKind, EventTypeOption, FieldKind, FieldValue,
    HistoricalDataPoint, Metric, Sheep, SheepEvent, SheepField,
};

// 配置
pub use config::{default_mapping_config, MappingConfig, SheetPurpose, SheetSpec};

// 导入 / 导出
pub use exporter::ExcelExporter;
pub use importer::{ImportReport, MappingSource, SheepImporter, SheetReport};

// API
pub use api::{ApiError, ApiResult, DataApi, EventOptionApi, SheepApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "羊群档案系统";
