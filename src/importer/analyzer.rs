// ==========================================
// 羊群档案系统 - 工作簿结构分析
// ==========================================
// 职责: 在编写映射配置前预览工作簿（表名 / 列名 / 行数 / 前几行）
// 约束: 只读，不触碰数据库
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::workbook::ParsedWorkbook;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// 每个工作表预览的行数
pub const PREVIEW_ROWS: usize = 3;

// ==========================================
// PreviewRow - 预览行（保持源列顺序）
// ==========================================
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreviewRow(pub Vec<(String, Option<String>)>);

impl PreviewRow {
    /// 按列名取值；列不存在返回 None，单元格为空返回 Some(None)
    pub fn get(&self, column: &str) -> Option<&Option<String>> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }
}

/// 序列化为 JSON 对象，键顺序与源列一致
impl Serialize for PreviewRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetPreview {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub preview_rows: Vec<PreviewRow>,
}

/// 表名 → 预览
pub type WorkbookAnalysis = BTreeMap<String, SheetPreview>;

/// 分析工作簿结构
pub fn analyze_workbook(bytes: &[u8]) -> ImportResult<WorkbookAnalysis> {
    let workbook = ParsedWorkbook::from_bytes(bytes)?;

    let analysis = workbook
        .sheets
        .iter()
        .map(|table| {
            let preview_rows = table
                .rows
                .iter()
                .take(PREVIEW_ROWS)
                .map(|cells| {
                    PreviewRow(
                        table
                            .columns
                            .iter()
                            .cloned()
                            .zip(cells.iter().cloned())
                            .collect(),
                    )
                })
                .collect();

            (
                table.name.clone(),
                SheetPreview {
                    columns: table.columns.clone(),
                    row_count: table.row_count(),
                    preview_rows,
                },
            )
        })
        .collect();

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn test_analyze_previews_first_rows() {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("Milk").unwrap();
        ws.write_string(0, 0, "EarNum").unwrap();
        ws.write_string(0, 1, "Milk").unwrap();
        for i in 1..=5u32 {
            ws.write_string(i, 0, format!("G{:03}", i)).unwrap();
        }
        ws.write_number(1, 1, 2.5).unwrap();
        let bytes = wb.save_to_buffer().unwrap();

        let analysis = analyze_workbook(&bytes).unwrap();
        let milk = &analysis["Milk"];
        assert_eq!(milk.columns, vec!["EarNum", "Milk"]);
        assert_eq!(milk.row_count, 5);
        assert_eq!(milk.preview_rows.len(), PREVIEW_ROWS);
        assert_eq!(milk.preview_rows[0].get("Milk"), Some(&Some("2.5".to_string())));
        assert_eq!(milk.preview_rows[1].get("Milk"), Some(&None));
        assert_eq!(milk.preview_rows[1].get("Fat"), None);
    }

    #[test]
    fn test_preview_keeps_source_column_order_and_duplicates() {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("Weights").unwrap();
        for (col, name) in ["Weight", "EarNum", "Weight", "Date"].iter().enumerate() {
            ws.write_string(0, col as u16, *name).unwrap();
        }
        ws.write_number(1, 0, 40.0).unwrap();
        ws.write_string(1, 1, "G001").unwrap();
        ws.write_number(1, 2, 42.0).unwrap();
        ws.write_string(1, 3, "2024-01-01").unwrap();
        let bytes = wb.save_to_buffer().unwrap();

        let analysis = analyze_workbook(&bytes).unwrap();
        let weights = &analysis["Weights"];
        let row = &weights.preview_rows[0];
        assert_eq!(
            row.columns().collect::<Vec<_>>(),
            vec!["Weight", "EarNum", "Weight.1", "Date"]
        );
        assert_eq!(row.get("Weight"), Some(&Some("40".to_string())));
        assert_eq!(row.get("Weight.1"), Some(&Some("42".to_string())));

        let json = serde_json::to_string(row).unwrap();
        assert_eq!(
            json,
            r#"{"Weight":"40","EarNum":"G001","Weight.1":"42","Date":"2024-01-01"}"#
        );
    }
}
