use clap::ArgMatches;
use relay_channel_handler::ServerState;

use super::{build_gateway, config_path};

pub async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let path = config_path(matches);
    let mut config = crate::config::load(&path)?;
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    let gateway = build_gateway(config)?;
    tracing::info!(
        config = %path.display(),
        channels = gateway.config.channels.len(),
        "starting relay"
    );
    for channel in &gateway.config.channels {
        tracing::info!(
            channel_uuid = %channel.uuid,
            channel_type = %channel.channel_type.as_str(),
            name = %channel.name,
            "webhooks at /c/{}/{}/{{register,receive}}",
            channel.channel_type.path_segment(),
            channel.uuid,
        );
    }

    let state = ServerState::new(gateway.registry.clone(), gateway.logger.clone());
    relay_channel_handler::serve(&gateway.config.server, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested");
    })
    .await?;

    tracing::info!(
        channel_logs = gateway.logger.log_count().await,
        "relay stopped"
    );
    Ok(())
}
