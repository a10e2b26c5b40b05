//! Listener registration.
//!
//! Turns the `[listeners.*]` sections of a validated configuration into
//! routes on a table under construction. Every handler gets freshly built
//! stage instances; nothing is shared with the live generation.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AuthConfig, GatewayConfig};
use crate::pipeline::{Chain, StageRegistry};
use crate::routing::error::BuildError;
use crate::routing::handler::{AuthRequirement, Handler};
use crate::routing::table::{Protocol, RouteKey, RouteTable, RouteTableBuilder};
use crate::sink::Sink;

/// Build a complete table for `generation` without publishing it.
pub fn build_route_table(
    config: &GatewayConfig,
    registry: &StageRegistry,
    sink: Arc<dyn Sink>,
    generation: u64,
) -> Result<RouteTable, BuildError> {
    let mut builder = RouteTable::builder(generation);

    match populate(&mut builder, config, registry, &sink) {
        Ok(()) => {
            let table = builder.build();
            debug!(generation, routes = table.len(), "Route table built");
            Ok(table)
        }
        Err(e) => {
            builder.abandon();
            Err(e)
        }
    }
}

fn populate(
    builder: &mut RouteTableBuilder,
    config: &GatewayConfig,
    registry: &StageRegistry,
    sink: &Arc<dyn Sink>,
) -> Result<(), BuildError> {
    // Unreferenced preprocessors must still be valid.
    for (name, pre) in &config.preprocessors {
        registry
            .load_config(&pre.kind, &pre.options)
            .map_err(|source| BuildError::Stage {
                name: name.clone(),
                source,
            })?;
    }

    if let Some(path) = config.health_check() {
        builder.set_health_check(path)?;
    }

    include_std(builder, config, registry, sink)?;
    include_hec(builder, config, registry, sink)?;
    include_firehose(builder, config, registry, sink)
}

/// Register `[listeners.std.*]`.
pub fn include_std(
    builder: &mut RouteTableBuilder,
    config: &GatewayConfig,
    registry: &StageRegistry,
    sink: &Arc<dyn Sink>,
) -> Result<(), BuildError> {
    for (name, listener) in &config.listeners.std {
        let auth = match &listener.auth {
            AuthConfig::None => AuthRequirement::None,
            AuthConfig::Basic { username, password } => AuthRequirement::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            AuthConfig::Token { token } => AuthRequirement::Bearer(token.clone()),
        };
        let chain = build_chain(config, registry, Protocol::Std, name, &listener.preprocessors)?;
        builder.insert(
            RouteKey::new(Protocol::Std, &listener.url),
            Handler::new(name, Protocol::Std, &listener.tag, auth, chain, sink.clone()),
        )?;
    }
    Ok(())
}

/// Register `[listeners.hec.*]`.
pub fn include_hec(
    builder: &mut RouteTableBuilder,
    config: &GatewayConfig,
    registry: &StageRegistry,
    sink: &Arc<dyn Sink>,
) -> Result<(), BuildError> {
    for (name, listener) in &config.listeners.hec {
        let chain = build_chain(config, registry, Protocol::Hec, name, &listener.preprocessors)?;
        builder.insert(
            RouteKey::new(Protocol::Hec, &listener.url),
            Handler::new(
                name,
                Protocol::Hec,
                &listener.tag,
                AuthRequirement::HecToken(listener.token.clone()),
                chain,
                sink.clone(),
            ),
        )?;
    }
    Ok(())
}

/// Register `[listeners.firehose.*]`.
pub fn include_firehose(
    builder: &mut RouteTableBuilder,
    config: &GatewayConfig,
    registry: &StageRegistry,
    sink: &Arc<dyn Sink>,
) -> Result<(), BuildError> {
    for (name, listener) in &config.listeners.firehose {
        let chain = build_chain(
            config,
            registry,
            Protocol::Firehose,
            name,
            &listener.preprocessors,
        )?;
        builder.insert(
            RouteKey::new(Protocol::Firehose, &listener.url),
            Handler::new(
                name,
                Protocol::Firehose,
                &listener.tag,
                AuthRequirement::FirehoseKey(listener.access_key.clone()),
                chain,
                sink.clone(),
            ),
        )?;
    }
    Ok(())
}

fn build_chain(
    config: &GatewayConfig,
    registry: &StageRegistry,
    protocol: Protocol,
    listener: &str,
    names: &[String],
) -> Result<Chain, BuildError> {
    let mut chain = Chain::new();
    for name in names {
        let stage = config
            .preprocessors
            .get(name)
            .ok_or_else(|| BuildError::UnknownPreprocessor {
                listener: format!("listeners.{protocol}.{listener}"),
                name: name.clone(),
            })
            .and_then(|pre| {
                registry
                    .build(&pre.kind, &pre.options)
                    .map_err(|source| BuildError::Stage {
                        name: name.clone(),
                        source,
                    })
            });
        match stage {
            Ok(stage) => chain.push(name, stage),
            Err(e) => {
                // stages built so far never reach the table
                for err in chain.close() {
                    warn!(error = %err, "Failed to close stage of abandoned chain");
                }
                return Err(e);
            }
        }
    }
    Ok(chain)
}
