// SPDX-License-Identifier: GPL-3.0-only

//! devwatch - enumerate udev devices and follow hotplug events
//!
//! Logs go to stderr so that stdout stays clean for `--json` consumers.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use devwatch_sys::{
    EventLoop, MountTable, MountWait, SubsystemContext, UdevCatalog, UdevSource, list_devices,
};
use devwatch_types::{DeviceAction, DeviceEvent};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod config;
mod output;

use cli::{Cli, Command};
use config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("devwatch=info,devwatch_sys=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Command::List { subsystem, json } => list(subsystem, json),
        Command::Monitor {
            subsystem,
            devtype,
            resolve_mounts,
            json,
        } => {
            config.override_filter(subsystem, devtype);
            monitor(&config, resolve_mounts, json).await
        }
        Command::MountPoint {
            device,
            wait,
            timeout_ms,
        } => mount_point(&config, &device, wait, timeout_ms).await,
    }
}

fn list(subsystem: Option<String>, json: bool) -> Result<()> {
    let context = SubsystemContext::open()?;

    let mut catalog = UdevCatalog::new(&context);
    if let Some(subsystem) = subsystem {
        catalog = catalog.with_subsystem(subsystem);
    }

    let records = list_devices(&catalog)?;

    let mut stdout = io::stdout().lock();
    for record in &records {
        output::write_record(&mut stdout, record, json)?;
    }
    stdout.flush()?;

    info!(devices = records.len(), "listed devices");
    context.close();
    Ok(())
}

async fn monitor(config: &Config, resolve_mounts: bool, json: bool) -> Result<()> {
    let context = SubsystemContext::open()?;
    let source = UdevSource::open(&context, &config.monitor)?;

    let mut event_loop = EventLoop::new();
    let token = event_loop.open_monitor(source, move |event: &DeviceEvent| {
        let mut stdout = io::stdout().lock();
        output::write_event(&mut stdout, event, json)?;
        stdout.flush()?;
        Ok(())
    })?;

    info!(
        subsystem = %config.monitor.subsystem,
        devtype = config.monitor.devtype.as_deref().unwrap_or("*"),
        "watching for device events, press Ctrl-C to stop"
    );

    let table = config.mounts.table();
    let wait = config.mounts.wait();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome: Result<()> = loop {
        tokio::select! {
            signal = &mut shutdown => {
                info!("received shutdown signal");
                break signal.map_err(Into::into);
            }
            delivery = event_loop.turn() => match delivery {
                Ok(delivery) => {
                    if resolve_mounts
                        && matches!(delivery.event.action, DeviceAction::Add)
                        && let Some(devnode) = delivery.event.devnode.as_deref()
                    {
                        let lookup = report_mount(&table, devnode, &wait, json);
                        match unless_shutdown(shutdown.as_mut(), lookup).await {
                            Finished::Done(Ok(())) => {}
                            Finished::Done(Err(error)) => break Err(error.into()),
                            Finished::Shutdown(signal) => {
                                info!(devnode, "received shutdown signal during mount lookup");
                                break signal.map_err(Into::into);
                            }
                        }
                    }
                }
                Err(error) => break Err(error.into()),
            },
        }
    };

    event_loop.close(token)?;
    drop(event_loop);
    context.close();

    outcome
}

enum Finished<T> {
    Done(T),
    Shutdown(io::Result<()>),
}

/// Run `work` to completion unless `shutdown` resolves first
async fn unless_shutdown<S, W>(shutdown: Pin<&mut S>, work: W) -> Finished<W::Output>
where
    S: Future<Output = io::Result<()>>,
    W: Future,
{
    tokio::select! {
        signal = shutdown => Finished::Shutdown(signal),
        output = work => Finished::Done(output),
    }
}

async fn report_mount(table: &MountTable, devnode: &str, wait: &MountWait, json: bool) -> io::Result<()> {
    let mount_dir = match table.wait_for(devnode, wait).await {
        Ok(dir) => Some(dir),
        Err(error) => {
            warn!(devnode, %error, "mount point lookup failed");
            None
        }
    };

    let mut stdout = io::stdout().lock();
    output::write_mount(&mut stdout, devnode, mount_dir.as_deref(), json)?;
    stdout.flush()
}

async fn mount_point(config: &Config, device: &str, wait: bool, timeout_ms: Option<u64>) -> Result<()> {
    let table = config.mounts.table();

    let mount_dir: PathBuf = if wait {
        let mut wait = config.mounts.wait();
        if let Some(timeout_ms) = timeout_ms {
            wait.timeout = Duration::from_millis(timeout_ms);
        }
        table.wait_for(device, &wait).await?
    } else {
        table.resolve(device)?
    };

    println!("{}", mount_dir.display());
    Ok(())
}
