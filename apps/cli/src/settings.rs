//! CLI 配置文件
//!
//! 默认位置 `~/.config/innova/config.toml`，可用环境变量 `INNOVA_CONFIG` 覆盖。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 覆盖配置文件路径的环境变量
pub const CONFIG_ENV: &str = "INNOVA_CONFIG";

/// 配置文件路径
pub fn config_file() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("innova");
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 默认设备文件（如 /dev/rfcomm0）
    pub device: Option<String>,

    /// 默认 TCP 桥接地址
    pub tcp: Option<String>,

    /// 设备地址（蓝牙 MAC），写入事件和记录
    pub address: Option<String>,

    /// 记录所属用户
    pub owner: Option<String>,
}

impl CliConfig {
    /// 加载配置（文件不存在时返回默认配置）
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }
        let body = toml::to_string_pretty(self).context("序列化配置失败")?;
        let content = format!("# InnovaMotion CLI Configuration\n\n{}", body);
        fs::write(path, content).context("写入配置文件失败")?;
        Ok(())
    }

    /// 按名称读取配置项
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        let value = match key {
            "device" => &self.device,
            "tcp" => &self.tcp,
            "address" => &self.address,
            "owner" => &self.owner,
            _ => return None,
        };
        Some(value.as_deref())
    }
}
