// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库 / 应用状态 / 内存工作簿构造
// ==========================================

#![allow(dead_code)]

use flock_ledger::app::AppState;
use flock_ledger::db::open_and_migrate;
use rusqlite::Connection;
use rust_xlsxwriter::Workbook;
use std::error::Error;
use tempfile::NamedTempFile;

/// 单元格
#[derive(Debug, Clone)]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Blank,
}

pub use Cell::{Blank, Number, Text};

/// 工作表: (表名, 行集合)，首行为表头
pub type SheetRows = (&'static str, Vec<Vec<Cell>>);

/// 创建临时测试数据库（已建表）
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径非 UTF-8")?.to_string();

    // 建表后立即关闭，由被测代码重新打开
    let conn = open_and_migrate(&db_path)?;
    drop(conn);

    Ok((temp_file, db_path))
}

/// 创建基于临时数据库的应用状态
///
/// 返回的 NamedTempFile 必须在测试期间保持存活
pub fn create_test_state() -> (NamedTempFile, String, AppState) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let state = AppState::new(db_path.clone()).expect("初始化应用状态失败");
    (temp_file, db_path, state)
}

/// 打开独立连接（用于断言 / 安装触发器）
pub fn open_conn(db_path: &str) -> Connection {
    open_and_migrate(db_path).expect("打开测试数据库失败")
}

/// 统计表行数（限定 owner）
pub fn count_rows(db_path: &str, table: &str, owner_id: i64) -> i64 {
    let conn = open_conn(db_path);
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE owner_id = ?1", table),
        [owner_id],
        |row| row.get(0),
    )
    .expect("统计行数失败")
}

/// 构造内存 xlsx 工作簿
pub fn build_workbook(sheets: &[SheetRows]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(*name)
            .expect("非法工作表名");
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match cell {
                    Cell::Text(s) => {
                        worksheet.write_string(r, c, *s).expect("写入文本失败");
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(r, c, *n).expect("写入数字失败");
                    }
                    Cell::Blank => {}
                }
            }
        }
    }
    workbook.save_to_buffer().expect("生成工作簿失败")
}

/// 表头行
pub fn header(columns: &[&'static str]) -> Vec<Cell> {
    columns.iter().map(|&c| Cell::Text(c)).collect()
}
