mod floodgate;
mod id_command;
mod playerdb;
mod responder;

#[cfg(test)]
mod testing;

pub use floodgate::{ConvertError, FloodgateId};
pub use playerdb::{Gamertag, LookupError, Player, PlayerDb};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use serenity::all::{
    ActivityData, Command, Context, EventHandler, GatewayIntents, GuildId, Interaction,
    OnlineStatus, Ready,
};
use std::{env, fs, path::PathBuf, time::Duration};
use tracing::{debug, error, info, trace};

use crate::responder::SerenityResponder;

fn default_playerdb_url() -> String {
    playerdb::DEFAULT_ENDPOINT.to_owned()
}

fn default_lookup_timeout_secs() -> u64 {
    playerdb::DEFAULT_TIMEOUT.as_secs()
}

/// The configuration to run a gatekeeper instance with.
#[derive(Deserialize)]
pub struct BotConfig {
    /// the bot token, as given by the Discord developer portal.
    pub discord_token: String,
    /// a guild where commands get registered immediately, on top of the (slower) global
    /// registration.
    pub dev_guild_id: Option<u64>,
    /// base url of the gamertag lookup API.
    #[serde(default = "default_playerdb_url")]
    pub playerdb_url: String,
    /// maximum time given to a single lookup.
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

impl BotConfig {
    /// Generate a `BotConfig` from a TOML config file.
    ///
    /// If `path` matches `None`, will search for a file called `config.toml` in an XDG
    /// compliant configuration directory (e.g ~/.config/gatekeeper/config.toml on Linux).
    pub fn from_config(path: Option<String>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(a) => PathBuf::from(a),
            None => {
                let dirs = directories::ProjectDirs::from("", "", "gatekeeper")
                    .context("config file not found")?;
                dirs.config_dir().join("config.toml")
            }
        };
        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.to_string_lossy()))?;
        let config: BotConfig = toml::from_str(&contents)?;

        debug!(
            "Using configuration from {}",
            config_path.to_string_lossy()
        );
        Ok(config)
    }

    /// Generate a `BotConfig` from the process' environment.
    pub fn from_env() -> anyhow::Result<Self> {
        // override environment variables with contents of .env file, unless they were already set
        // explicitly.
        dotenvy::dotenv().ok();

        let discord_token =
            env::var("DISCORD_TOKEN").context("missing bot token in DISCORD_TOKEN")?;

        let dev_guild_id = match env::var("DEV_GUILD_ID") {
            Ok(id) => Some(
                id.trim()
                    .parse()
                    .context("impossible to parse guild id in DEV_GUILD_ID")?,
            ),
            Err(_) => None,
        };

        let playerdb_url = env::var("PLAYERDB_URL").unwrap_or_else(|_| default_playerdb_url());

        let lookup_timeout_secs = match env::var("LOOKUP_TIMEOUT_SECS") {
            Ok(secs) => secs
                .trim()
                .parse()
                .context("LOOKUP_TIMEOUT_SECS must be a number of seconds")?,
            Err(_) => default_lookup_timeout_secs(),
        };

        debug!("Using configuration from environment");
        Ok(Self {
            discord_token,
            dev_guild_id,
            playerdb_url,
            lookup_timeout_secs,
        })
    }

    fn dev_guild(&self) -> anyhow::Result<Option<GuildId>> {
        match self.dev_guild_id {
            Some(0) => anyhow::bail!("the dev guild id can't be 0"),
            Some(id) => Ok(Some(GuildId::new(id))),
            None => Ok(None),
        }
    }
}

/// The bot itself: created once at startup, then shared by every event.
struct Gatekeeper {
    playerdb: PlayerDb,
    dev_guild: Option<GuildId>,
}

impl Gatekeeper {
    /// Publish the command set, to the development guild first (immediate), then globally.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        if let Some(guild) = self.dev_guild {
            guild
                .set_commands(&ctx.http, vec![id_command::definition()])
                .await
                .with_context(|| format!("registering commands in guild {guild}"))?;
            info!("\u{2705} Synced to dev guild {guild}");
        }

        Command::set_global_commands(&ctx.http, vec![id_command::definition()])
            .await
            .context("registering global commands")?;
        info!("\u{1f310} Synced globally!");

        Ok(())
    }
}

#[async_trait]
impl EventHandler for Gatekeeper {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            "\u{2705} Logged in as {} (ID: {})",
            ready.user.name, ready.user.id
        );

        ctx.set_presence(
            Some(ActivityData::custom("Gathering Floodgate IDs")),
            OnlineStatus::Online,
        );

        if let Err(err) = self.register_commands(&ctx).await {
            error!("\u{274c} Sync failed: {err:#}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            // Ignore components, autocompletes and the like.
            return;
        };

        if command.data.name != id_command::NAME {
            debug!("ignoring unknown command /{}", command.data.name);
            return;
        }

        let gamertag = command
            .data
            .options
            .iter()
            .find(|opt| opt.name == id_command::GAMERTAG_OPTION)
            .and_then(|opt| opt.value.as_str())
            .unwrap_or_default()
            .to_owned();

        trace!(
            "Received /{} from {} in {}: {gamertag:?}",
            id_command::NAME,
            command.user.id,
            command.channel_id,
        );

        let responder = SerenityResponder::new(ctx.http.clone(), command);
        id_command::handle(&responder, &self.playerdb, &gamertag).await;
    }
}

/// Run the bot for the given `BotConfig`.
pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    let dev_guild = config.dev_guild()?;

    let playerdb = PlayerDb::new(
        &config.playerdb_url,
        Duration::from_secs(config.lookup_timeout_secs),
    )?;

    debug!("setting up client...");
    let handler = Gatekeeper {
        playerdb,
        dev_guild,
    };

    // Slash commands don't need any privileged intent.
    let mut client = serenity::Client::builder(&config.discord_token, GatewayIntents::GUILDS)
        .event_handler(handler)
        .await
        .context("creating the discord client")?;

    let shard_manager = client.shard_manager.clone();

    debug!("setup ready! now connecting to the gateway.");
    tokio::select! {
        res = handle_signals() => {
            res?;
        }

        Err(err) = client.start() => {
            anyhow::bail!(err);
        }
    }

    shard_manager.shutdown_all().await;

    info!("properly exited, have a nice day!");
    Ok(())
}

async fn handle_signals() -> anyhow::Result<()> {
    use futures::StreamExt as _;
    use signal_hook::consts::signal::*;
    use signal_hook_tokio::*;

    let mut signals = Signals::new([SIGINT, SIGHUP, SIGQUIT, SIGTERM])?;
    let handle = signals.handle();

    // Only the registered signals are ever delivered, so the first one ends the bot.
    if let Some(signal) = signals.next().await {
        info!("received {}, shutting down", signal_name(signal));
    }
    handle.close();

    Ok(())
}

fn signal_name(signal: std::os::raw::c_int) -> &'static str {
    use signal_hook::consts::signal::*;
    match signal {
        SIGINT => "SIGINT",
        SIGHUP => "SIGHUP",
        SIGQUIT => "SIGQUIT",
        SIGTERM => "SIGTERM",
        _ => "an unexpected signal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_signals_are_named() {
        use signal_hook::consts::signal::*;
        assert_eq!(signal_name(SIGINT), "SIGINT");
        assert_eq!(signal_name(SIGHUP), "SIGHUP");
        assert_eq!(signal_name(SIGQUIT), "SIGQUIT");
        assert_eq!(signal_name(SIGTERM), "SIGTERM");
        assert_eq!(signal_name(SIGUSR1), "an unexpected signal");
    }

    #[test]
    fn toml_config_defaults() {
        let config: BotConfig = toml::from_str(r#"discord_token = "abc""#).unwrap();
        assert_eq!(config.discord_token, "abc");
        assert_eq!(config.dev_guild_id, None);
        assert_eq!(config.playerdb_url, "https://playerdb.co/api/player/xbox/");
        assert_eq!(config.lookup_timeout_secs, 5);
        assert_eq!(config.dev_guild().unwrap(), None);
    }

    #[test]
    fn toml_config_full() {
        let config: BotConfig = toml::from_str(
            r#"
            discord_token = "abc"
            dev_guild_id = 1234
            playerdb_url = "http://localhost:8080/xbox/"
            lookup_timeout_secs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.dev_guild().unwrap(), Some(GuildId::new(1234)));
        assert_eq!(config.playerdb_url, "http://localhost:8080/xbox/");
        assert_eq!(config.lookup_timeout_secs, 2);
    }

    #[test]
    fn zero_guild_is_rejected() {
        let config: BotConfig =
            toml::from_str("discord_token = \"abc\"\ndev_guild_id = 0").unwrap();
        assert!(config.dev_guild().is_err());
    }

    #[test]
    fn missing_config_file() {
        let err = BotConfig::from_config(Some("/nonexistent/gatekeeper.toml".to_owned()));
        assert!(err.is_err());
    }
}
