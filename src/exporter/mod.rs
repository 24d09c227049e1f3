// ==========================================
// 羊群档案系统 - 导出层
// ==========================================
// 职责: 只读路径，数据库 → 多工作表 xlsx 字节
// ==========================================

pub mod excel_exporter;

pub use excel_exporter::{
    ExcelExporter, ExportError, ExportResult, CHAT_SHEET, EVENTS_SHEET, HISTORY_SHEET,
    SHEEP_SHEET, XLSX_MAX_CELL_CHARS,
};
