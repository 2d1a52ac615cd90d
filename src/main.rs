use anyhow::{Context, Result};

use hms_spacestatus::{
    boot, cli,
    core::Daemon,
    i18n,
    protocol::mqtt::{self, MqttSettings},
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::parse_args();
    boot::init_logger(matches.get_one::<String>("log-file").map(String::as_str));

    let config = cli::load_config(&matches)?;
    i18n::init_i18n(config.language.as_deref());

    if cli::actions::run_one_shot_actions(&matches, &config).await? {
        return Ok(());
    }

    let settings = MqttSettings::from_url(
        &config.bus.url,
        &config.bus.client_id,
        config.bus.keep_alive(),
    )?;
    let (bus, connection) = mqtt::spawn(&settings).context("Cannot connect to the bus")?;

    let mut daemon = Daemon::new(&config.status.file, bus, i18n::lang());
    if config.spaceapi.enabled {
        daemon = daemon.with_spaceapi(config.spaceapi.builder().build())?;
    } else {
        log::info!("SpaceAPI mirroring disabled");
    }
    let daemon = daemon.watch()?;

    let result = daemon.run().await;
    // The daemon has drained its own queues; flush the bus before leaving.
    tokio::task::spawn_blocking(move || connection.shutdown()).await?;
    result
}
