// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `simulate` command.
//!
//! Serves every configured item from an in-memory server, changes input
//! nodes on a timer, writes output items and logs what the host would be
//! asked to do.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};
use uabridge::{
    Bridge, BridgeConfig, ChannelHooks, HostRequest, InMemorySession, ItemIndex, ItemPath,
    ItemSpec, LocalScalar, LocalType, NodeId, UaValue,
};

use crate::cli::{Cli, SimulateArgs};
use crate::commands::load_config;
use crate::error::{BinError, BinResult};
use crate::logging::LogHandle;

/// Namespace used for nodes created behind browse paths.
const SIMULATED_NAMESPACE: u16 = 1;

/// One configured item as served by the in-memory server.
#[derive(Debug, Clone)]
pub(crate) struct SimulatedItem {
    pub index: ItemIndex,
    pub node: NodeId,
    pub spec: ItemSpec,
}

/// Creates a node for every item with a parseable path.
///
/// Items whose path does not parse are left out so the bridge reports them.
pub(crate) fn populate(session: &InMemorySession, config: &BridgeConfig) -> Vec<SimulatedItem> {
    let mut served = Vec::with_capacity(config.items.len());
    for (i, spec) in config.items.iter().enumerate() {
        let initial = sample(spec, 0);
        let node = match ItemPath::parse(&spec.path) {
            Ok(ItemPath::Direct(node)) => {
                session.add_node(node.clone(), initial);
                node
            }
            Ok(ItemPath::Browse(_)) => {
                let node = NodeId::string(SIMULATED_NAMESPACE, spec.path.clone());
                if let Err(e) = session.add_browse_node(&spec.path, node.clone(), initial) {
                    warn!(item = %spec.name, error = %e, "Cannot serve item");
                    continue;
                }
                node
            }
            Err(e) => {
                warn!(item = %spec.name, error = %e, "Item path does not parse");
                continue;
            }
        };
        served.push(SimulatedItem {
            index: ItemIndex::new(i as u32),
            node,
            spec: spec.clone(),
        });
    }
    served
}

/// Value of `spec` at simulation step `tick`, in the item's natural wire type.
pub(crate) fn sample(spec: &ItemSpec, tick: u64) -> UaValue {
    match spec.array_size {
        Some(capacity) => UaValue::Array(
            (0..capacity as u64)
                .map(|offset| to_wire(local_sample(spec.local_type, tick + offset)))
                .collect(),
        ),
        None => to_wire(local_sample(spec.local_type, tick)),
    }
}

fn local_sample(local_type: LocalType, tick: u64) -> LocalScalar {
    let small = (tick % 100) as i64;
    match local_type {
        LocalType::Int8 => LocalScalar::Int8(small as i8),
        LocalType::UInt8 => LocalScalar::UInt8(small as u8),
        LocalType::Int16 => LocalScalar::Int16(small as i16),
        LocalType::UInt16 => LocalScalar::UInt16(small as u16),
        LocalType::Int32 => LocalScalar::Int32(small as i32),
        LocalType::UInt32 => LocalScalar::UInt32(small as u32),
        LocalType::Float32 => LocalScalar::Float32(small as f32 * 0.5),
        LocalType::Float64 => LocalScalar::Float64(small as f64 * 0.25),
        LocalType::String => LocalScalar::String(format!("tick {}", tick)),
    }
}

fn to_wire(value: LocalScalar) -> UaValue {
    match value {
        LocalScalar::Int8(v) => UaValue::SByte(v),
        LocalScalar::UInt8(v) => UaValue::Byte(v),
        LocalScalar::Int16(v) => UaValue::Int16(v),
        LocalScalar::UInt16(v) => UaValue::UInt16(v),
        LocalScalar::Int32(v) => UaValue::Int32(v),
        LocalScalar::UInt32(v) => UaValue::UInt32(v),
        LocalScalar::Float32(v) => UaValue::Float(v),
        LocalScalar::Float64(v) => UaValue::Double(v),
        LocalScalar::String(v) => UaValue::String(v),
    }
}

/// Executes the `simulate` command.
pub async fn simulate(cli: &Cli, args: SimulateArgs, log: LogHandle) -> BinResult<()> {
    if args.tick_ms == 0 {
        return Err(BinError::config("--tick-ms must be positive"));
    }
    let config = load_config(&cli.config)?;
    log.set_debug_level(cli.debug_level)?;

    let session = Arc::new(InMemorySession::new(config.server_url.clone()));
    let served = populate(&session, &config);
    info!(
        endpoint = %config.server_url,
        configured = config.items.len(),
        served = served.len(),
        "Simulated server ready"
    );

    let (hooks, mut requests) = ChannelHooks::with_channel();
    let bridge = Bridge::builder(config)
        .session(session.clone())
        .hooks(Arc::new(hooks))
        .build()?;
    bridge.start().await?;

    run(&bridge, &session, &served, &mut requests, &args).await;

    bridge.shutdown().await;
    println!("{}", bridge.report(args.verbosity));
    println!("{}", serde_json::to_string_pretty(&bridge.stats())?);
    Ok(())
}

async fn run(
    bridge: &Bridge,
    session: &InMemorySession,
    served: &[SimulatedItem],
    requests: &mut mpsc::UnboundedReceiver<HostRequest>,
    args: &SimulateArgs,
) {
    let deadline = sleep(Duration::from_secs(args.seconds));
    tokio::pin!(deadline);
    let mut ticker = interval(Duration::from_millis(args.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!(ticks = tick, "Simulation finished");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                tick += 1;
                step(bridge, session, served, tick).await;
            }
            Some(request) = requests.recv() => {
                let item = bridge.item(request.index()).ok();
                let reading = bridge.read(request.index()).ok();
                info!(
                    %request,
                    item = item.as_ref().map(|i| i.name().to_string()).unwrap_or_default(),
                    value = reading.as_ref().map(|r| r.value.to_string()).unwrap_or_default(),
                    status = reading.as_ref().map(|r| r.status.to_string()).unwrap_or_default(),
                    "Host request"
                );
            }
        }
    }
}

async fn step(bridge: &Bridge, session: &InMemorySession, served: &[SimulatedItem], tick: u64) {
    for item in served {
        if item.spec.direction.is_output() {
            if item.spec.array_size.is_some() {
                continue;
            }
            let value = local_sample(item.spec.local_type, tick);
            if let Err(e) = bridge.write(item.index, value).await {
                debug!(item = %item.spec.name, error = %e, "Simulated write failed");
            }
        } else {
            session.notify_change(&item.node, sample(&item.spec, tick));
        }
    }
}
