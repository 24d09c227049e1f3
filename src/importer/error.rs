// ==========================================
// 羊群档案系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层:
// - ImportError: 终止整个导入（事务整体回滚）
// - RowError:    行级错误，只跳过该行，永不向上传播
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型（批次级）
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 配置错误（任何写入之前失败）=====
    #[error("映射配置格式错误: {0}")]
    Configuration(String),

    // ===== 文件错误 =====
    #[error("工作簿解析失败: {0}")]
    WorkbookParse(String),

    // ===== 存储错误（触发整体回滚）=====
    #[error("耳号冲突: {0}")]
    Conflict(String),

    #[error("存储暂不可用: {0}")]
    TransientIo(String),

    #[error("数据库操作失败: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueConstraintViolation(msg) => ImportError::Conflict(msg),
            RepositoryError::Busy(msg) => ImportError::TransientIo(msg),
            other => ImportError::Storage(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::from(RepositoryError::from(err))
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::WorkbookParse(err.to_string())
    }
}

/// 行级错误：只导致该行被跳过
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("第 {row} 行缺少耳号")]
    MissingEarNum { row: usize },

    #[error("第 {row} 行字段 {field} 无法解析: {value:?}")]
    Parse {
        row: usize,
        field: String,
        value: Option<String>,
    },
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_mapping() {
        assert!(matches!(
            ImportError::from(RepositoryError::UniqueConstraintViolation("x".into())),
            ImportError::Conflict(_)
        ));
        assert!(matches!(
            ImportError::from(RepositoryError::Busy("x".into())),
            ImportError::TransientIo(_)
        ));
        assert!(matches!(
            ImportError::from(RepositoryError::DatabaseQueryError("x".into())),
            ImportError::Storage(_)
        ));
    }
}
