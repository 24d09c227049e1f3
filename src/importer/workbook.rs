// ==========================================
// 羊群档案系统 - 工作簿解析
// ==========================================
// 职责: 内存字节 → 多工作表的无类型文本表格
// 支持: Excel (.xlsx/.xls，按内容自动识别)
// 约定:
// - 第一行为表头；空表头命名为 "Unnamed: <列号>"
// - 重复表头依次改名为 "<列名>.1"、"<列名>.2"…
// - 单元格一律转为去空白文本；空串视为缺失 (None)
// - 日期单元格转为 "YYYY-MM-DD HH:MM:SS"
// - 完全空白的行跳过
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::collections::HashMap;
use std::io::Cursor;

// ==========================================
// SheetTable - 单个工作表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    column_index: HashMap<String, usize>,
}

impl SheetTable {
    pub fn new(name: &str, columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let mut column_index = HashMap::new();
        for (idx, col) in columns.iter().enumerate() {
            // 重复表头以第一次出现为准
            column_index.entry(col.clone()).or_insert(idx);
        }
        Self {
            name: name.to_string(),
            columns,
            rows,
            column_index,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index.contains_key(column)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 逐行视图（行号从 1 开始，不含表头）
    pub fn records(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().enumerate().map(move |(idx, cells)| RowView {
            table: self,
            row_number: idx + 1,
            cells,
        })
    }
}

// ==========================================
// RowView - 行视图（按列名取值）
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a SheetTable,
    pub row_number: usize,
    cells: &'a [Option<String>],
}

impl<'a> RowView<'a> {
    /// 按源列名取值；列不存在或单元格为空均返回 None
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = *self.table.column_index.get(column)?;
        self.cells.get(idx)?.as_deref()
    }

    /// 按可选列名取值（列未配置时返回 None）
    pub fn get_opt(&self, column: Option<&str>) -> Option<&'a str> {
        column.and_then(|c| self.get(c))
    }
}

// ==========================================
// ParsedWorkbook - 解析后的工作簿
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ParsedWorkbook {
    pub sheets: Vec<SheetTable>,
}

impl ParsedWorkbook {
    /// 从内存字节解析工作簿
    pub fn from_bytes(bytes: &[u8]) -> ImportResult<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

        let mut sheets = Vec::new();
        for sheet_name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(|e| ImportError::WorkbookParse(format!("{}: {}", sheet_name, e)))?;

            let mut rows = range.rows();
            let header_row = match rows.next() {
                Some(r) => r,
                None => {
                    // 空工作表：保留表名，无列无行
                    sheets.push(SheetTable::new(&sheet_name, Vec::new(), Vec::new()));
                    continue;
                }
            };

            let columns = dedupe_columns(
                header_row
                    .iter()
                    .enumerate()
                    .map(|(idx, cell)| {
                        cell_to_text(cell).unwrap_or_else(|| format!("Unnamed: {}", idx))
                    })
                    .collect(),
            );

            let mut records = Vec::new();
            for data_row in rows {
                let cells: Vec<Option<String>> = (0..columns.len())
                    .map(|idx| data_row.get(idx).and_then(cell_to_text))
                    .collect();

                // 跳过完全空白的行
                if cells.iter().all(Option::is_none) {
                    continue;
                }
                records.push(cells);
            }

            sheets.push(SheetTable::new(&sheet_name, columns, records));
        }

        Ok(Self { sheets })
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetTable> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// 重复表头改名，保证列名唯一且保持原顺序
fn dedupe_columns(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::with_capacity(raw.len());
    for name in raw {
        let mut candidate = name.clone();
        while let Some(count) = seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{}.{}", name, count);
        }
        seen.insert(candidate.clone(), 0);
        columns.push(candidate);
    }
    columns
}

/// 单元格 → 文本（空则 None）
fn cell_to_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        other => other.to_string(),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn build_xlsx() -> Vec<u8> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("Basic").unwrap();
        ws.write_string(0, 0, "EarNum").unwrap();
        ws.write_string(0, 1, "Breed").unwrap();
        ws.write_string(1, 0, " G001 ").unwrap();
        ws.write_number(1, 1, 2.0).unwrap();
        // 第 3 行完全空白，第 4 行只有耳号
        ws.write_string(3, 0, "G002").unwrap();
        wb.add_worksheet().set_name("Empty").unwrap();
        wb.save_to_buffer().unwrap()
    }

    #[test]
    fn test_parse_sheets_and_cells() {
        let workbook = ParsedWorkbook::from_bytes(&build_xlsx()).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Basic", "Empty"]);

        let basic = workbook.sheet("Basic").unwrap();
        assert_eq!(basic.columns, vec!["EarNum", "Breed"]);
        assert_eq!(basic.row_count(), 2);

        let rows: Vec<_> = basic.records().collect();
        assert_eq!(rows[0].get("EarNum"), Some("G001"));
        assert_eq!(rows[0].get("Breed"), Some("2"));
        assert_eq!(rows[1].get("Breed"), None);
        assert_eq!(rows[1].get("Missing"), None);
    }

    #[test]
    fn test_empty_sheet_has_no_rows() {
        let workbook = ParsedWorkbook::from_bytes(&build_xlsx()).unwrap();
        let empty = workbook.sheet("Empty").unwrap();
        assert!(empty.columns.is_empty());
        assert_eq!(empty.row_count(), 0);
    }

    #[test]
    fn test_duplicate_headers_are_renamed_in_order() {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("Dup").unwrap();
        for (col, name) in ["EarNum", "Milk", "Milk", "Milk.1", "Milk"].iter().enumerate() {
            ws.write_string(0, col as u16, *name).unwrap();
        }
        for col in 0..5u16 {
            ws.write_number(1, col, f64::from(col)).unwrap();
        }
        let bytes = wb.save_to_buffer().unwrap();

        let workbook = ParsedWorkbook::from_bytes(&bytes).unwrap();
        let dup = workbook.sheet("Dup").unwrap();
        assert_eq!(dup.columns, vec!["EarNum", "Milk", "Milk.1", "Milk.1.1", "Milk.2"]);

        let row = dup.records().next().unwrap();
        assert_eq!(row.get("Milk"), Some("1"));
        assert_eq!(row.get("Milk.1"), Some("2"));
        assert_eq!(row.get("Milk.2"), Some("4"));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let err = ParsedWorkbook::from_bytes(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, ImportError::WorkbookParse(_)));
    }
}
