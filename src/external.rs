//! External mode: listeners described on the command line.
//!
//! ```text
//! dummy socks 127.0.0.1:1080 obfs2 --dest=10.0.0.1:443 client 127.0.0.1:5000
//! └──── configuration 1 ───┘ └──────────── configuration 2 ──────────────┘
//! ```
//!
//! Preparation happens before any subsystem starts; opening the listeners
//! happens once the reactor exists.

use crate::error::LaunchError;
use crate::lifecycle::reactor::Reactor;
use crate::net::Network;
use crate::protocol::{ListenerConfig, Registry};

/// Cut `args` into configurations. Each one starts at a registered
/// protocol name and runs up to the next one.
pub fn split_configurations<'a>(registry: &Registry, args: &'a [String]) -> Result<Vec<&'a [String]>, LaunchError> {
    match args.first() {
        None => return Err(LaunchError::Usage("no protocol given".into())),
        Some(first) if !registry.is_supported(first) => {
            return Err(LaunchError::Usage(format!("'{first}' is not a supported protocol")));
        }
        Some(_) => {}
    }

    let mut configurations = Vec::new();
    let mut begin = 0;
    while begin < args.len() {
        let end = args[begin + 1..]
            .iter()
            .position(|arg| registry.is_supported(arg))
            .map_or(args.len(), |offset| begin + 1 + offset);

        let configuration = &args[begin..end];
        tracing::debug!("Configuration {}: {}", configurations.len() + 1, configuration.join(" "));
        if configuration.len() == 1 {
            tracing::warn!("No arguments for configuration {}", configurations.len() + 1);
            return Err(LaunchError::Usage(format!(
                "no arguments for configuration {} ({})",
                configurations.len() + 1,
                configuration[0]
            )));
        }

        configurations.push(configuration);
        begin = end;
    }
    Ok(configurations)
}

/// Split and validate every configuration.
pub fn prepare(registry: &Registry, args: &[String]) -> Result<Vec<ListenerConfig>, LaunchError> {
    split_configurations(registry, args)?
        .into_iter()
        .map(|configuration| -> Result<ListenerConfig, LaunchError> {
            // Splitting guarantees the head is a registered name.
            let protocol = registry
                .get(&configuration[0])
                .ok_or_else(|| LaunchError::Usage(format!("'{}' is not a supported protocol", configuration[0])))?;
            Ok(protocol.config(&configuration[1..])?)
        })
        .collect()
}

/// Open one listener per configuration. Any failure is fatal.
pub fn launch(configs: &[ListenerConfig], reactor: &Reactor, network: &Network) -> Result<usize, LaunchError> {
    for (index, config) in configs.iter().enumerate() {
        network
            .open_listener(reactor, config)
            .map_err(|source| LaunchError::Bind { index: index + 1, source })?;
    }
    Ok(configs.len())
}
