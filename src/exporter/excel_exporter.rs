// ==========================================
// 羊群档案系统 - Excel 导出
// ==========================================
// 职责: owner 的全部数据 → 多工作表 xlsx（内存字节）
// 工作表:
// - Sheep_Basic_Info       羊只主档（耳号升序）
// - Sheep_Events_Log       事件（耳号升序，日期倒序）
// - Sheep_Historical_Data  历史数据（耳号升序，日期升序）
// - Chat_History           对话记录（时间升序）
// 约束: 事件/历史表以耳号代替内部 id，不输出 id/sheep_id/owner_id；
//       无数据的工作表不输出
// ==========================================

use crate::domain::{FieldValue, SheepField};
use crate::repository::{
    ChatHistoryRepository, HistoricalDataRepository, RepositoryError, SheepEventRepository,
    SheepRepository,
};
use rusqlite::Connection;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const SHEEP_SHEET: &str = "Sheep_Basic_Info";
pub const EVENTS_SHEET: &str = "Sheep_Events_Log";
pub const HISTORY_SHEET: &str = "Sheep_Historical_Data";
pub const CHAT_SHEET: &str = "Chat_History";

/// xlsx 单元格文本上限（字符数）
pub const XLSX_MAX_CELL_CHARS: usize = 32_767;

const EVENT_COLUMNS: &[&str] = &[
    "EarNum",
    "event_date",
    "event_type",
    "description",
    "notes",
    "recorded_at",
];
const HISTORY_COLUMNS: &[&str] = &[
    "EarNum",
    "record_date",
    "record_type",
    "value",
    "notes",
    "recorded_at",
];
const CHAT_COLUMNS: &[&str] = &[
    "session_id",
    "role",
    "content",
    "timestamp",
    "ear_num_context",
];

/// 导出错误
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("读取导出数据失败: {0}")]
    Storage(#[from] RepositoryError),

    #[error("工作簿生成失败: {0}")]
    Xlsx(#[from] XlsxError),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// 导出单元格
#[derive(Debug, Clone, PartialEq)]
enum ExportCell {
    Text(String),
    Number(f64),
    Empty,
}

impl ExportCell {
    fn text(value: impl Into<String>) -> Self {
        ExportCell::Text(value.into())
    }

    fn optional_text(value: Option<&str>) -> Self {
        value.map(ExportCell::text).unwrap_or(ExportCell::Empty)
    }
}

impl From<Option<&FieldValue>> for ExportCell {
    fn from(value: Option<&FieldValue>) -> Self {
        match value {
            Some(FieldValue::Integer(n)) => ExportCell::Number(*n as f64),
            Some(FieldValue::Float(n)) => ExportCell::Number(*n),
            Some(FieldValue::Text(s)) => ExportCell::Text(s.clone()),
            None => ExportCell::Empty,
        }
    }
}

// ==========================================
// ExcelExporter - Excel 导出器
// ==========================================
pub struct ExcelExporter;

impl ExcelExporter {
    /// 导出 owner 的全部数据
    #[instrument(skip(conn))]
    pub fn export_owner(conn: &Connection, owner_id: i64) -> ExportResult<Vec<u8>> {
        let sheep = SheepRepository::list_by_owner(conn, owner_id)?;
        let events = SheepEventRepository::list_for_export(conn, owner_id)?;
        let history = HistoricalDataRepository::list_for_export(conn, owner_id)?;
        let chats = ChatHistoryRepository::list_by_owner(conn, owner_id)?;

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        if !sheep.is_empty() {
            let mut columns = vec!["id", "owner_id", SheepField::EarNum.name()];
            columns.extend(SheepField::attributes().map(|f| f.name()));
            columns.push("last_updated");

            let rows = sheep.iter().map(|s| {
                let mut row = vec![
                    ExportCell::Number(s.id as f64),
                    ExportCell::Number(s.owner_id as f64),
                    ExportCell::text(s.ear_num.as_str()),
                ];
                row.extend(SheepField::attributes().map(|f| ExportCell::from(s.get(f))));
                row.push(ExportCell::text(s.last_updated.to_rfc3339()));
                row
            });
            write_sheet(&mut workbook, SHEEP_SHEET, &columns, rows, &header_format)?;
        }

        if !events.is_empty() {
            let rows = events.iter().map(|(ear_num, e)| {
                vec![
                    ExportCell::text(ear_num.as_str()),
                    ExportCell::text(e.event_date.as_str()),
                    ExportCell::text(e.event_type.as_str()),
                    ExportCell::optional_text(e.description.as_deref()),
                    ExportCell::optional_text(e.notes.as_deref()),
                    ExportCell::text(e.recorded_at.to_rfc3339()),
                ]
            });
            write_sheet(&mut workbook, EVENTS_SHEET, EVENT_COLUMNS, rows, &header_format)?;
        }

        if !history.is_empty() {
            let rows = history.iter().map(|(ear_num, h)| {
                vec![
                    ExportCell::text(ear_num.as_str()),
                    ExportCell::text(h.record_date.as_str()),
                    ExportCell::text(h.metric.as_str()),
                    ExportCell::Number(h.value),
                    ExportCell::optional_text(h.notes.as_deref()),
                    ExportCell::text(h.recorded_at.to_rfc3339()),
                ]
            });
            write_sheet(&mut workbook, HISTORY_SHEET, HISTORY_COLUMNS, rows, &header_format)?;
        }

        if !chats.is_empty() {
            let rows = chats.iter().map(|c| {
                vec![
                    ExportCell::text(c.session_id.as_str()),
                    ExportCell::text(c.role.as_str()),
                    ExportCell::text(c.content.as_str()),
                    ExportCell::text(c.timestamp.to_rfc3339()),
                    ExportCell::optional_text(c.ear_num_context.as_deref()),
                ]
            });
            write_sheet(&mut workbook, CHAT_SHEET, CHAT_COLUMNS, rows, &header_format)?;
        }

        let bytes = workbook.save_to_buffer()?;
        info!(
            owner_id,
            sheep = sheep.len(),
            events = events.len(),
            history = history.len(),
            chats = chats.len(),
            bytes = bytes.len(),
            "导出完成"
        );
        Ok(bytes)
    }
}

fn write_sheet<I>(
    workbook: &mut Workbook,
    name: &str,
    columns: &[&str],
    rows: I,
    header_format: &Format,
) -> ExportResult<()>
where
    I: IntoIterator<Item = Vec<ExportCell>>,
{
    let worksheet = workbook.add_worksheet().set_name(name)?;

    for (col, title) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, header_format)?;
    }

    for (idx, row) in rows.into_iter().enumerate() {
        let row_num = (idx + 1) as u32;
        for (col, cell) in row.into_iter().enumerate() {
            let col = col as u16;
            match cell {
                ExportCell::Text(s) => {
                    let s = clamp_cell_text(name, row_num, col, s);
                    worksheet.write_string(row_num, col, s)?;
                }
                ExportCell::Number(n) => {
                    worksheet.write_number(row_num, col, n)?;
                }
                ExportCell::Empty => {}
            }
        }
    }

    worksheet.autofit();
    Ok(())
}

/// 超长文本截断到单元格上限，否则整个导出会失败
fn clamp_cell_text(sheet: &str, row: u32, col: u16, text: String) -> String {
    match text.char_indices().nth(XLSX_MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                sheet,
                row,
                col,
                chars = text.chars().count(),
                "单元格文本超过 xlsx 上限，已截断"
            );
            text[..cut].to_string()
        }
        None => text,
    }
}
