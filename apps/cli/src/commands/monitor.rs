//! 监控命令
//!
//! 连接设备，实时显示包统计、每个传感器的姿态和跌倒告警。Ctrl-C 关闭会话。

use crate::settings::CliConfig;
use anyhow::{Context, Result, bail};
use clap::Args;
use crossbeam_channel::{Receiver, bounded, select};
use innova_driver::{
    AsyncRawLogHook, ConnectionManager, DisconnectReason, DriverError, LineCallback,
    ManagerEvent, PacketProcessor, RawLogWriter, ReconnectPolicy, RecordSink, SessionBuilder,
    SessionConfig, SessionEvent,
};
#[cfg(unix)]
use innova_link::DeviceAdapter;
#[cfg(not(unix))]
use innova_link::ReaderAdapter;
use innova_link::{Labeled, SerialAdapter, TcpAdapter};
use innova_protocol::{EnergySummary, PersistableRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 设备文件（如 /dev/rfcomm0，覆盖配置）
    #[arg(short, long, conflicts_with = "tcp")]
    pub device: Option<PathBuf>,

    /// TCP 桥接地址（host:port，覆盖配置）
    #[arg(short, long)]
    pub tcp: Option<String>,

    /// 设备地址（蓝牙 MAC，覆盖配置）
    #[arg(short, long)]
    pub address: Option<String>,

    /// 记录所属用户（覆盖配置）
    #[arg(short, long)]
    pub owner: Option<String>,

    /// 原始行日志输出文件
    #[arg(long)]
    pub raw_log: Option<PathBuf>,

    /// 持久化记录输出文件（JSON Lines）
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// 非主动断开时的最大连续重连次数（0 表示不重连）
    #[arg(short, long, default_value_t = 0)]
    pub reconnect: u32,
}

/// 选定的传输
#[derive(Debug, Clone)]
enum Target {
    Device(PathBuf),
    Tcp(String),
}

/// JSON Lines 记录输出
struct JsonlSink {
    out: Option<BufWriter<File>>,
    stored: u64,
}

impl JsonlSink {
    fn open(path: Option<&PathBuf>) -> Result<Self> {
        let out = match path {
            Some(path) => Some(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("无法创建记录文件: {}", path.display()))?,
            )),
            None => None,
        };
        Ok(Self { out, stored: 0 })
    }
}

impl RecordSink for JsonlSink {
    fn store(&mut self, records: Vec<PersistableRecord>) -> Result<(), DriverError> {
        if let Some(out) = self.out.as_mut() {
            for record in &records {
                serde_json::to_writer(&mut *out, record)
                    .map_err(|e| DriverError::Sink(e.to_string()))?;
                writeln!(out).map_err(|e| DriverError::Sink(e.to_string()))?;
            }
            out.flush().map_err(|e| DriverError::Sink(e.to_string()))?;
        }
        self.stored += records.len() as u64;
        Ok(())
    }
}

/// 事件显示和处理
struct Monitor {
    processor: PacketProcessor<JsonlSink>,
    energy: EnergySummary,
}

impl Monitor {
    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { device_address } => {
                println!("✅ connected: {}", device_address);
            },
            SessionEvent::Packet(batch) => match self.processor.process(&batch) {
                Ok(Some(processed)) => {
                    println!("{}", processed.summary);
                    for (reading, posture) in batch.readings.iter().zip(&processed.postures) {
                        println!("  {:<12} {}", reading.sensor_id(), posture.name());
                        self.energy.add(*posture);
                    }
                    for fall in &processed.falls {
                        println!("  ⚠️  FALL DETECTED: sensor {}", fall.sensor_id);
                    }
                },
                Ok(None) => println!("packet #{}: empty", batch.sequence),
                Err(e) => warn!("Failed to process packet #{}: {}", batch.sequence, e),
            },
            SessionEvent::Disconnected {
                device_address,
                reason,
                discarded_readings,
            } => {
                let reason = match reason {
                    DisconnectReason::Closed => "closed".to_string(),
                    DisconnectReason::EndOfStream => "end of stream".to_string(),
                    DisconnectReason::TransportError(e) => format!("transport error: {}", e),
                    DisconnectReason::ConsumerGone => "consumer gone".to_string(),
                };
                println!(
                    "❌ disconnected: {} ({}), {} unterminated readings discarded",
                    device_address, reason, discarded_readings
                );
            },
        }
    }

    fn finish(self) {
        let stored = self.processor.sink().stored;
        println!(
            "📊 {} packets, {} records, {} calories",
            self.processor.packets_processed(),
            stored,
            self.energy.total_calories
        );
    }
}

impl MonitorCommand {
    pub fn execute(&self) -> Result<()> {
        let config = CliConfig::load()?;

        let target = match (&self.device, &self.tcp) {
            (Some(path), _) => Target::Device(path.clone()),
            (None, Some(addr)) => Target::Tcp(addr.clone()),
            (None, None) => match (&config.device, &config.tcp) {
                (Some(device), _) => Target::Device(PathBuf::from(device)),
                (None, Some(addr)) => Target::Tcp(addr.clone()),
                (None, None) => {
                    bail!("no device selected: use --device/--tcp or `innova-cli config set`")
                },
            },
        };
        let address = self.address.clone().or(config.address.clone());
        let owner = self
            .owner
            .clone()
            .or(config.owner.clone())
            .unwrap_or_else(|| "local".to_string());

        // Ctrl-C → 关闭会话
        let (stop_tx, stop_rx) = bounded::<()>(1);
        ctrlc::set_handler(move || {
            let _ = stop_tx.try_send(());
        })
        .context("无法注册 Ctrl-C 处理器")?;

        // 原始行日志
        let mut raw_writer = None;
        let mut hooks: Vec<Arc<dyn LineCallback>> = Vec::new();
        if let Some(path) = &self.raw_log {
            let (hook, rx) = AsyncRawLogHook::new();
            raw_writer = Some((RawLogWriter::spawn(rx, path)?, hook.dropped_lines().clone()));
            hooks.push(Arc::new(hook));
        }

        let mut monitor = Monitor {
            processor: PacketProcessor::new(owner, JsonlSink::open(self.records.as_ref())?),
            energy: EnergySummary::new(),
        };

        if self.reconnect > 0 {
            self.run_managed(target, address, hooks, &stop_rx, &mut monitor)?;
        } else {
            self.run_single(target, address, hooks, &stop_rx, &mut monitor)?;
        }

        monitor.finish();

        if let Some((writer, dropped)) = raw_writer {
            let written = writer.join()?;
            println!(
                "💾 raw log: {} lines written, {} dropped",
                written,
                dropped.load(std::sync::atomic::Ordering::Relaxed)
            );
        }
        Ok(())
    }

    fn run_single(
        &self,
        target: Target,
        address: Option<String>,
        hooks: Vec<Arc<dyn LineCallback>>,
        stop_rx: &Receiver<()>,
        monitor: &mut Monitor,
    ) -> Result<()> {
        let mut builder = match target {
            Target::Device(path) => SessionBuilder::new().device(path),
            Target::Tcp(addr) => SessionBuilder::new().tcp(addr),
        };
        if let Some(address) = address {
            builder = builder.device_address(address);
        }
        for hook in hooks {
            builder = builder.hook(hook);
        }

        let mut session = builder.build().context("无法连接设备")?;
        let events = session.events();

        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => {
                        let done = event.is_disconnect();
                        monitor.handle(event);
                        if done {
                            break;
                        }
                    },
                    Err(_) => break,
                },
                recv(stop_rx) -> _ => {
                    info!("Ctrl-C received, closing session");
                    // 等读线程退出后，处理它留在通道里的事件（包括 Disconnected）
                    session.close();
                    for event in events.try_iter() {
                        monitor.handle(event);
                    }
                    break;
                },
            }
        }

        session.close();
        Ok(())
    }

    fn run_managed(
        &self,
        target: Target,
        address: Option<String>,
        hooks: Vec<Arc<dyn LineCallback>>,
        stop_rx: &Receiver<()>,
        monitor: &mut Monitor,
    ) -> Result<()> {
        let connector = move || -> Result<Box<dyn SerialAdapter + Send>, innova_link::LinkError> {
            let adapter: Box<dyn SerialAdapter + Send> = match &target {
                #[cfg(unix)]
                Target::Device(path) => Box::new(DeviceAdapter::open(path)?),
                #[cfg(not(unix))]
                Target::Device(path) => Box::new(ReaderAdapter::open(path)?),
                Target::Tcp(addr) => Box::new(TcpAdapter::connect(addr.as_str())?),
            };
            let adapter: Box<dyn SerialAdapter + Send> = match &address {
                Some(address) => Box::new(Labeled::new(adapter, address.clone())),
                None => adapter,
            };
            Ok(adapter)
        };

        let mut manager = ConnectionManager::new(connector)
            .config(SessionConfig::default())
            .policy(ReconnectPolicy {
                max_attempts: self.reconnect,
                ..Default::default()
            });
        for hook in hooks {
            manager = manager.hook(hook);
        }

        let mut connection = manager.start()?;
        let events = connection.events();

        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(ManagerEvent::Session(event)) => monitor.handle(event),
                    Ok(ManagerEvent::ConnectFailed { error }) => {
                        println!("❌ connection failed: {}", error);
                    },
                    Ok(ManagerEvent::Reconnecting { attempt }) => {
                        println!("🔄 reconnecting (attempt {}/{})", attempt, self.reconnect);
                    },
                    Ok(ManagerEvent::GaveUp { attempts }) => {
                        println!("❌ giving up after {} reconnection attempts", attempts);
                    },
                    Ok(ManagerEvent::Stopped) | Err(_) => break,
                },
                recv(stop_rx) -> _ => {
                    info!("Ctrl-C received, stopping connection");
                    connection.stop();
                },
            }
        }

        connection.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innova_protocol::Reading;

    #[test]
    fn test_jsonl_sink_writes_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        let mut sink = JsonlSink::open(Some(&path)).unwrap();
        let reading = Reading::new("s1", "0xAB3311", 42).unwrap();
        let record = innova_protocol::RecordBuilder::new("AA:BB", "owner").build(&reading);
        sink.store(vec![record.clone(), record]).unwrap();
        assert_eq!(sink.stored, 2);
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: PersistableRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.sensor_id, "s1");
        assert_eq!(parsed.received_code, "0xAB3311");
    }

    #[test]
    fn test_jsonl_sink_without_file_counts_only() {
        let mut sink = JsonlSink::open(None).unwrap();
        sink.store(Vec::new()).unwrap();
        assert_eq!(sink.stored, 0);
    }
}
