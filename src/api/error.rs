// ==========================================
// 羊群档案系统 - API 层错误类型
// ==========================================
// 职责: 把仓储 / 导入 / 导出错误转换为调用方可区分的错误
// 约定: 冲突、未找到、输入错误、暂时不可用分别对应独立变体
// ==========================================

use crate::exporter::ExportError;
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方错误
    // ==========================================
    #[error("映射配置错误: {0}")]
    Configuration(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("耳号冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 存储错误
    // ==========================================
    /// 可重试
    #[error("数据库暂时不可用: {0}")]
    TransientIo(String),

    /// 导入失败，事务已回滚
    #[error("导入失败（已回滚）: {0}")]
    ImportFailed(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("导出失败: {0}")]
    ExportFailed(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}({})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::Conflict(msg),
            RepositoryError::Busy(msg) => ApiError::TransientIo(msg),
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::from(RepositoryError::from(err))
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Configuration(msg) => ApiError::Configuration(msg),
            ImportError::WorkbookParse(msg) => ApiError::InvalidInput(msg),
            ImportError::Conflict(msg) => ApiError::Conflict(msg),
            ImportError::TransientIo(msg) => ApiError::TransientIo(msg),
            ImportError::Storage(msg) => ApiError::ImportFailed(msg),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Storage(repo_err) => ApiError::from(repo_err),
            ExportError::Xlsx(e) => ApiError::ExportFailed(e.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
