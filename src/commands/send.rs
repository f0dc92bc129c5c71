use anyhow::{anyhow, Context};
use clap::ArgMatches;
use relay_channel_handler::{MsgId, OutgoingMsg, Urn};
use uuid::Uuid;

use super::{build_gateway, config_path};

pub async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = crate::config::load(&config_path(matches))?;

    let channel_uuid: Uuid = matches
        .get_one::<String>("channel")
        .ok_or_else(|| anyhow!("--channel is required"))?
        .parse()
        .context("--channel must be a UUID")?;
    let channel = config
        .channels
        .iter()
        .find(|c| c.uuid == channel_uuid)
        .cloned()
        .ok_or_else(|| anyhow!("channel {} is not configured", channel_uuid))?;

    let to = matches
        .get_one::<String>("to")
        .ok_or_else(|| anyhow!("--to is required"))?;
    let urn = Urn::from_parts(channel.primary_scheme()?, to)?;

    let msg = OutgoingMsg {
        id: MsgId(*matches.get_one::<i64>("id").unwrap_or(&1)),
        channel_uuid: channel.uuid,
        channel_type: channel.channel_type.clone(),
        urn,
        text: matches
            .get_one::<String>("text")
            .cloned()
            .unwrap_or_default(),
        quick_replies: collect(matches, "quick-reply"),
        attachments: collect(matches, "attachment"),
    };

    let gateway = build_gateway(config)?;
    gateway
        .backend
        .insert_outgoing(msg.channel_uuid, msg.id, None)
        .await;

    let status = gateway.registry.send_msg(&msg).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn collect(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}
