//! 配置管理命令
//!
//! 用于管理 CLI 配置（默认设备、设备地址、所属用户）

use crate::settings::{CliConfig, config_file};
use anyhow::{Result, bail};
use clap::Subcommand;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 默认设备文件（如 /dev/rfcomm0）
        #[arg(short, long)]
        device: Option<String>,

        /// 默认 TCP 桥接地址（host:port）
        #[arg(short, long)]
        tcp: Option<String>,

        /// 设备地址（蓝牙 MAC）
        #[arg(short, long)]
        address: Option<String>,

        /// 记录所属用户
        #[arg(short, long)]
        owner: Option<String>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称（device, tcp, address, owner, all）
        #[arg(default_value = "all")]
        key: String,
    },

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Set {
                device,
                tcp,
                address,
                owner,
            } => Self::set_(device, tcp, address, owner),

            ConfigCommand::Get { key } => Self::get_(&key),

            ConfigCommand::Path => {
                println!("{}", config_file()?.display());
                Ok(())
            },
        }
    }

    fn set_(
        device: Option<String>,
        tcp: Option<String>,
        address: Option<String>,
        owner: Option<String>,
    ) -> Result<()> {
        if device.is_none() && tcp.is_none() && address.is_none() && owner.is_none() {
            bail!("nothing to set (use --device, --tcp, --address or --owner)");
        }

        let mut config = CliConfig::load()?;

        if let Some(device) = device {
            println!("✅ device = {}", device);
            config.device = Some(device);
        }
        if let Some(tcp) = tcp {
            println!("✅ tcp = {}", tcp);
            config.tcp = Some(tcp);
        }
        if let Some(address) = address {
            println!("✅ address = {}", address);
            config.address = Some(address);
        }
        if let Some(owner) = owner {
            println!("✅ owner = {}", owner);
            config.owner = Some(owner);
        }

        config.save()
    }

    fn get_(key: &str) -> Result<()> {
        let config = CliConfig::load()?;

        if key == "all" {
            for name in ["device", "tcp", "address", "owner"] {
                let value = config.get(name).flatten().unwrap_or("(unset)");
                println!("{} = {}", name, value);
            }
            return Ok(());
        }

        match config.get(key) {
            Some(Some(value)) => println!("{}", value),
            Some(None) => println!("(unset)"),
            None => bail!("unknown config key: {} (expected device, tcp, address, owner)", key),
        }
        Ok(())
    }
}
