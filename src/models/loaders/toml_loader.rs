use crate::models::spec::ShoppingSpec;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载数据并转换为 ShoppingSpec 对象
pub async fn load_toml_to_spec(toml_file_path: &Path) -> Result<ShoppingSpec> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let spec: ShoppingSpec = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    // 设置文件路径
    let spec = spec.with_file_path(toml_file_path.to_string_lossy().to_string());

    tracing::info!("成功加载需求单 {}，共 {} 个商品", spec.id, spec.items.len());

    Ok(spec)
}
