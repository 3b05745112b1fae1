//! 边沿记录文件
//!
//! - `.bin` / `.trace`：小端二进制记录，每条 16 字节 ([`RawEdge`])
//! - `.json`：[`TraceEdge`] 数组

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use contracts::Polarity;
use tracing::debug;

use crate::error::{IngestionError, Result};
use crate::wheel::TraceEdge;

/// 二进制记录格式
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct RawEdge {
    pub time: u64,
    /// 0 = falling, 1 = rising
    pub polarity: u32,
    pub reserved: u32,
}

const RAW_EDGE_SIZE: usize = std::mem::size_of::<RawEdge>();

impl From<TraceEdge> for RawEdge {
    fn from(edge: TraceEdge) -> Self {
        let polarity = match edge.polarity {
            Polarity::Falling => 0u32,
            Polarity::Rising => 1u32,
        };
        Self {
            time: edge.time.to_le(),
            polarity: polarity.to_le(),
            reserved: 0,
        }
    }
}

impl RawEdge {
    fn decode(self, index: usize) -> std::result::Result<TraceEdge, String> {
        let polarity = match u32::from_le(self.polarity) {
            0 => Polarity::Falling,
            1 => Polarity::Rising,
            other => return Err(format!("record {index}: invalid polarity {other}")),
        };
        Ok(TraceEdge::new(u64::from_le(self.time), polarity))
    }
}

/// 记录文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    Binary,
    Json,
}

impl TraceFormat {
    /// 从文件扩展名推断格式
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match extension.as_str() {
            "bin" | "trace" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            _ => Err(IngestionError::UnsupportedFormat { extension }),
        }
    }
}

/// 解码二进制记录
pub fn decode_binary(bytes: &[u8], source_name: &str) -> Result<Vec<TraceEdge>> {
    if bytes.len() % RAW_EDGE_SIZE != 0 {
        return Err(IngestionError::trace_format(
            source_name,
            format!(
                "length {} is not a multiple of {RAW_EDGE_SIZE} bytes",
                bytes.len()
            ),
        ));
    }
    bytes
        .chunks_exact(RAW_EDGE_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            bytemuck::pod_read_unaligned::<RawEdge>(chunk)
                .decode(index)
                .map_err(|message| IngestionError::trace_format(source_name, message))
        })
        .collect()
}

/// 编码为二进制记录
pub fn encode_binary(edges: &[TraceEdge]) -> Vec<u8> {
    let raw: Vec<RawEdge> = edges.iter().copied().map(RawEdge::from).collect();
    bytemuck::cast_slice(&raw).to_vec()
}

/// 读取记录文件，边沿时间必须单调不减
pub fn read_trace(path: &Path) -> Result<Vec<TraceEdge>> {
    let source_name = path.display().to_string();
    let edges = match TraceFormat::from_path(path)? {
        TraceFormat::Binary => decode_binary(&std::fs::read(path)?, &source_name)?,
        TraceFormat::Json => {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| IngestionError::trace_format(&source_name, e.to_string()))?
        }
    };

    if let Some(index) = edges.windows(2).position(|w| w[1].time < w[0].time) {
        return Err(IngestionError::trace_format(
            source_name,
            format!("edge {} goes back in time", index + 1),
        ));
    }
    debug!(path = %source_name, edges = edges.len(), "trace loaded");
    Ok(edges)
}

/// 写入记录文件
pub fn write_trace(path: &Path, edges: &[TraceEdge]) -> Result<()> {
    match TraceFormat::from_path(path)? {
        TraceFormat::Binary => std::fs::write(path, encode_binary(edges))?,
        TraceFormat::Json => {
            let content = serde_json::to_string_pretty(edges).map_err(|e| {
                IngestionError::trace_format(path.display().to_string(), e.to_string())
            })?;
            std::fs::write(path, content)?;
        }
    }
    debug!(path = %path.display(), edges = edges.len(), "trace written");
    Ok(())
}
