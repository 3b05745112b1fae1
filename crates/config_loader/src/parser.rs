//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式。解析错误带上出错位置，便于定位齿盘参数。

use std::path::Path;

use contracts::{ContractError, EngineBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式，大小写不敏感
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ContractError::config_parse("config file has no extension"))?;

        match ext.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ContractError::config_parse(format!(
                "unsupported config format '.{ext}' (expected .toml or .json)"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<EngineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| {
            let line = e.span().map(|span| line_of(content, span.start));
            let message = e.message().to_string();
            parse_error(format, line, &message, e)
        }),
        // serde_json already reports line and column
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| {
            let message = e.to_string();
            parse_error(format, None, &message, e)
        }),
    }
}

/// 序列化为与输入相同的格式
pub fn render(blueprint: &EngineBlueprint, format: ConfigFormat) -> Result<String, ContractError> {
    let rendered = match format {
        ConfigFormat::Toml => toml::to_string_pretty(blueprint).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::to_string_pretty(blueprint).map_err(|e| e.to_string()),
    };
    rendered
        .map_err(|e| ContractError::config_parse(format!("{} render error: {e}", format.name())))
}

fn parse_error<E>(
    format: ConfigFormat,
    line: Option<usize>,
    message: &str,
    source: E,
) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = match line {
        Some(line) => format!("{} line {line}: {}", format.name(), message.trim()),
        None => format!("{}: {}", format.name(), message.trim()),
    };
    ContractError::ConfigParse {
        message,
        source: Some(Box::new(source)),
    }
}

/// 1-based line of a byte offset
fn line_of(content: &str, offset: usize) -> usize {
    let offset = offset.min(content.len());
    content.as_bytes()[..offset]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}
