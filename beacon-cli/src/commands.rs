//! CLI command implementations

use std::sync::Arc;

use beacon_core::{
    BeaconConfig, BeaconError, DispatchMode, DispatchOutcome, Dispatcher, Hit, PendingRequest,
    Result, SECURE_ENDPOINT, SimulationNetworkLayer, TrackedEvent, Tracker, TrackerConfig,
    TransportError,
};
use clap::{Args, Subcommand};
use tokio::sync::mpsc;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Send a hit built from raw key=value parameters
    Send {
        /// Hit parameter, e.g. `-p t=pageview -p dp=/home`
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Send an event hit
    Event {
        /// Event category
        #[arg(long)]
        category: String,
        /// Event action
        #[arg(long)]
        action: String,
        /// Event label
        #[arg(long)]
        label: Option<String>,
        /// Event value
        #[arg(long)]
        value: Option<u64>,
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Where and how a hit is sent.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Tracking ID (falls back to BEACON_TRACKING_ID)
    #[arg(short, long)]
    tracking_id: Option<String>,
    /// Client ID reported with the hit
    #[arg(long)]
    client_id: Option<String>,
    /// User-Agent header value
    #[arg(long)]
    user_agent: Option<String>,
    /// Collection endpoint URL
    #[arg(long, conflicts_with = "secure")]
    endpoint: Option<String>,
    /// Use the TLS collection endpoint
    #[arg(long)]
    secure: bool,
    /// Send parameters in the URL instead of a POST body
    #[arg(long)]
    get: bool,
    /// Append a random `z` parameter to GET hits
    #[arg(long)]
    cache_busting: bool,
    /// Print the request instead of sending it
    #[arg(long)]
    dry_run: bool,
}

/// Handle the CLI command
///
/// # Errors
/// - `BeaconError::Configuration` - Missing or invalid tracking ID or endpoint
/// - `BeaconError::Transport` - The hit was dispatched but failed
pub async fn handle_command(command: Commands) -> Result<()> {
    run_command(command, BeaconConfig::from_env()).await
}

/// Runs `command` with `base` as the configuration the flags override.
async fn run_command(command: Commands, base: BeaconConfig) -> Result<()> {
    match command {
        Commands::Send { params, target } => send_hit(base, &target, params).await,
        Commands::Event {
            category,
            action,
            label,
            value,
            target,
        } => {
            let mut hit = Hit::event(category, action);
            if let Some(label) = label {
                hit = hit.label(label);
            }
            if let Some(value) = value {
                hit = hit.value(value);
            }
            send_hit(base, &target, hit).await
        }
    }
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

/// Applies command-line overrides on top of `config`.
fn apply_target(mut config: BeaconConfig, target: &TargetArgs) -> Result<BeaconConfig> {
    if let Some(tracking_id) = &target.tracking_id {
        config.tracker.set_tracking_id(tracking_id);
        if config.tracker.tracking_id().is_empty() {
            return Err(BeaconError::Configuration {
                reason: format!("invalid tracking ID {tracking_id:?}"),
            });
        }
    }
    if config.tracker.tracking_id().is_empty() {
        return Err(BeaconError::Configuration {
            reason: "no tracking ID; pass --tracking-id or set BEACON_TRACKING_ID".to_string(),
        });
    }

    if target.secure {
        config.tracker.set_endpoint(SECURE_ENDPOINT);
    }
    if let Some(endpoint) = &target.endpoint {
        if TrackerConfig::parse_endpoint(endpoint).is_none() {
            return Err(BeaconError::Configuration {
                reason: format!("invalid endpoint {endpoint:?}"),
            });
        }
        config.tracker.set_endpoint(endpoint);
    }

    if let Some(client_id) = &target.client_id {
        config.tracker.set_client_id(client_id);
    }
    if let Some(user_agent) = &target.user_agent {
        config.tracker.set_user_agent(user_agent);
    }
    if target.get {
        config.tracker.set_operation(&DispatchMode::Get.as_method());
    }
    if target.cache_busting {
        config.tracker.set_cache_busting(true);
    }

    Ok(config)
}

async fn send_hit<I>(base: BeaconConfig, target: &TargetArgs, parameters: I) -> Result<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    let config = apply_target(base, target)?;

    let simulation = target
        .dry_run
        .then(|| Arc::new(SimulationNetworkLayer::new()));
    let tracker = match &simulation {
        Some(layer) => Tracker::with_transport(
            config.tracker.clone(),
            Arc::new(Dispatcher::new(Arc::clone(layer))),
        ),
        None => Tracker::from_config(&config),
    };

    let mut events = tracker.subscribe();
    let request = tracker.track(parameters);
    let event = wait_for_completion(&mut events, request).await?;

    if let Some(layer) = &simulation {
        for recorded in layer.recorded_requests() {
            println!("{} {}", recorded.mode, recorded.url);
            println!("User-Agent: {}", recorded.user_agent);
            if recorded.mode == DispatchMode::Post {
                println!();
                println!("{}", recorded.payload());
            }
        }
    }

    match event.outcome {
        DispatchOutcome::Delivered { status } => {
            tracing::info!("Hit {} delivered with status {}", request, status);
            if !target.dry_run {
                println!("Hit delivered (HTTP {status})");
            }
            Ok(())
        }
        DispatchOutcome::Failed(error) => Err(error.into()),
    }
}

async fn wait_for_completion(
    events: &mut mpsc::UnboundedReceiver<TrackedEvent>,
    request: PendingRequest,
) -> Result<TrackedEvent> {
    while let Some(event) = events.recv().await {
        if event.request == request {
            return Ok(event);
        }
    }

    Err(TransportError::Request {
        reason: "tracker stopped before the hit completed".to_string(),
    }
    .into())
}
