// ==========================================
// 羊群档案系统 - 命令行入口
// ==========================================
// 用法:
//   flock-ledger import <owner_id> <工作簿> [映射JSON文件 | --profile <方案名>]
//   flock-ledger export <owner_id> <输出文件>
//   flock-ledger analyze <工作簿>
//   flock-ledger default-mapping
//   flock-ledger event-options <owner_id>
// 数据库路径: 环境变量 FLOCK_LEDGER_DB_PATH，否则用户数据目录
// ==========================================

use anyhow::{bail, Context, Result};
use flock_ledger::app::{get_default_db_path, AppState};
use flock_ledger::importer::MappingSource;
use std::path::Path;

const USAGE: &str = "用法:
  flock-ledger import <owner_id> <workbook.xlsx> [mapping.json | --profile <name>]
  flock-ledger export <owner_id> <output.xlsx>
  flock-ledger analyze <workbook.xlsx>
  flock-ledger default-mapping
  flock-ledger event-options <owner_id>";

fn main() -> Result<()> {
    flock_ledger::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match args.first() {
        Some(c) => c.as_str(),
        None => bail!("{}", USAGE),
    };

    match command {
        "import" => run_import(&args[1..]),
        "export" => run_export(&args[1..]),
        "analyze" => run_analyze(&args[1..]),
        "default-mapping" => {
            println!("{}", flock_ledger::config::default_mapping_json()?);
            Ok(())
        }
        "event-options" => run_event_options(&args[1..]),
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }
}

fn open_state() -> Result<AppState> {
    let db_path = get_default_db_path();
    tracing::info!("{} v{}，数据库: {}", flock_ledger::APP_NAME, flock_ledger::VERSION, db_path);
    AppState::new(db_path).context("无法初始化数据库")
}

fn parse_owner(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .with_context(|| format!("owner_id 必须是整数: {}", raw))
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    std::fs::read(Path::new(path)).with_context(|| format!("无法读取文件: {}", path))
}

fn run_import(args: &[String]) -> Result<()> {
    let (owner, workbook) = match args {
        [owner, workbook, ..] => (parse_owner(owner)?, workbook),
        _ => bail!("{}", USAGE),
    };

    let source = match &args[2..] {
        [] => MappingSource::Default,
        [flag, name] if flag == "--profile" => MappingSource::Profile(name.clone()),
        [mapping_path] => {
            let text = std::fs::read_to_string(mapping_path)
                .with_context(|| format!("无法读取映射配置: {}", mapping_path))?;
            MappingSource::Custom(text)
        }
        _ => bail!("{}", USAGE),
    };

    let bytes = read_file(workbook)?;
    let state = open_state()?;
    let report = state.data_api.import_workbook(owner, &bytes, &source)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_export(args: &[String]) -> Result<()> {
    let (owner, output) = match args {
        [owner, output] => (parse_owner(owner)?, output),
        _ => bail!("{}", USAGE),
    };

    let state = open_state()?;
    let bytes = state.data_api.export_workbook(owner)?;
    std::fs::write(output, &bytes).with_context(|| format!("无法写入文件: {}", output))?;
    println!("已导出 {} 字节到 {}", bytes.len(), output);
    Ok(())
}

fn run_analyze(args: &[String]) -> Result<()> {
    let workbook = match args {
        [workbook] => workbook,
        _ => bail!("{}", USAGE),
    };

    let bytes = read_file(workbook)?;
    let analysis = flock_ledger::importer::analyze_workbook(&bytes)?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn run_event_options(args: &[String]) -> Result<()> {
    let owner = match args {
        [owner] => parse_owner(owner)?,
        _ => bail!("{}", USAGE),
    };

    let state = open_state()?;
    let options = state.event_option_api.list_event_options(owner)?;
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}
