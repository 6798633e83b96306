//! 配置模块，负责加载REPL的JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置文件错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    Missing(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// REPL配置结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// 输入提示符
    pub prompt: String,
    /// 历史记录文件, 为空时不保存历史
    pub history_file: Option<PathBuf>,
    /// 是否同时输出解析后的选择树 (JSON)
    pub emit_selection: bool,
    /// 预设过滤器：名称到构建脚本的映射
    pub presets: BTreeMap<String, String>,
}

impl Default for ReplConfig {
    /// 默认配置（用于测试或fallback）
    fn default() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert("smoke".to_string(), "cat Smoke and not cat Slow".to_string());
        presets.insert("all".to_string(), String::new());

        Self {
            prompt: "filter> ".to_string(),
            history_file: Some(PathBuf::from(".test_filter_history")),
            emit_selection: false,
            presets,
        }
    }
}

impl ReplConfig {
    /// 从JSON文件加载配置, 未出现的字段使用默认值
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::Missing(path_ref.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;

        // 解析JSON
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path_ref.to_path_buf(),
            source,
        })
    }

    /// 获取预设的构建脚本
    pub fn preset(&self, name: &str) -> Option<&str> {
        self.presets.get(name).map(String::as_str)
    }
}
