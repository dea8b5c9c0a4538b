//! The `/id` command: resolve an Xbox gamertag into a Floodgate ID.

use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption};
use tracing::{debug, error, trace, warn};

use crate::{
    playerdb::{Gamertag, LookupError, Player, PlayerDb},
    responder::{DeliveryError, Embed, Reply, Responder},
};

pub const NAME: &str = "id";

/// Name of the single option of the command.
pub const GAMERTAG_OPTION: &str = "user";

const EMOJI_CONTROLLER: &str = "\u{1f3ae}";
const EMOJI_X: &str = "\u{274c}";

/// Discord's "blurple".
const EMBED_COLOUR: u32 = 0x5865F2;

/// Definition of the command, to register with the platform.
pub fn definition() -> CreateCommand {
    CreateCommand::new(NAME)
        .description("Get Floodgate ID for an Xbox user")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                GAMERTAG_OPTION,
                "Xbox gamertag (spaces are allowed)",
            )
            .required(true),
        )
}

fn invalid_gamertag() -> Reply {
    Reply::ephemeral(format!("{EMOJI_X} Please enter a valid gamertag"))
}

fn found(player: &Player) -> Reply {
    Reply::Embed(Embed {
        title: format!("{EMOJI_CONTROLLER} Floodgate ID Lookup"),
        description: format!(
            "**Gamertag:** `{}`\n**Floodgate ID:** `{}`",
            player.gamertag, player.floodgate_id
        ),
        colour: EMBED_COLOUR,
    })
}

/// User-facing message for a failed lookup. Only status codes and the gamertag are ever shown;
/// everything else is logged.
fn lookup_failed(gamertag: &Gamertag, err: &LookupError) -> Reply {
    let content = match err {
        LookupError::Status(status) => {
            format!("{EMOJI_X} API Error (Status {})", status.as_u16())
        }
        LookupError::NotFound => format!("{EMOJI_X} Gamertag '{gamertag}' not found"),
        LookupError::Timeout(_) => format!("{EMOJI_X} Request timed out. Try again later."),
        LookupError::Request(_) | LookupError::Payload(_) | LookupError::InvalidId(_) => {
            error!(kind = err.kind(), "processing error: {err:#}");
            format!("{EMOJI_X} Service unavailable. Try again later.")
        }
    };
    Reply::ephemeral(content)
}

/// Runs a platform call whose failure can't be reported anywhere, and logs it.
async fn best_effort(
    what: &str,
    fut: impl std::future::Future<Output = Result<(), DeliveryError>>,
) {
    if let Err(err) = fut.await {
        warn!("giving up on {what}: {err}");
    }
}

/// Delivers replies for one invocation, picking the right channel for the interaction's state.
struct Delivery<'a, R: ?Sized> {
    responder: &'a R,
    deferred: bool,
}

impl<'a, R: Responder + ?Sized> Delivery<'a, R> {
    async fn send(&self, reply: Reply) {
        let result = if self.deferred {
            self.responder.follow_up(reply).await
        } else if !self.responder.is_responded() {
            self.responder.respond(reply).await
        } else {
            // Answered elsewhere without being deferred; the interaction can't take more.
            debug!("interaction already answered, posting in the channel instead");
            self.responder.send_to_channel(reply).await
        };

        // The reply itself is never re-sent; the channel gets a generic notice instead.
        if let Err(err) = result {
            match err {
                DeliveryError::Expired => {
                    warn!("interaction expired before the reply could be delivered")
                }
                err => error!("response handling error: {err}"),
            }
            best_effort(
                "error notice",
                self.responder.send_to_channel(Reply::public(
                    "An error occurred while processing your request.",
                )),
            )
            .await;
        }
    }
}

/// Handle an `/id` invocation, end to end. Never fails: every error ends up either in the logs or
/// in front of the user.
pub async fn handle<R: Responder + ?Sized>(
    responder: &R,
    playerdb: &PlayerDb,
    raw_gamertag: &str,
) {
    if let Err(err) = try_handle(responder, playerdb, raw_gamertag).await {
        error!("unexpected error: {err}");
        notify_failure(responder).await;
    }
}

async fn try_handle<R: Responder + ?Sized>(
    responder: &R,
    playerdb: &PlayerDb,
    raw_gamertag: &str,
) -> Result<(), DeliveryError> {
    let Some(gamertag) = Gamertag::parse(raw_gamertag) else {
        if !responder.is_responded() {
            responder.respond(invalid_gamertag()).await?;
        }
        return Ok(());
    };

    let deferred = match responder.acknowledge().await {
        Ok(()) => true,
        Err(DeliveryError::Expired) => {
            debug!("interaction for {gamertag} expired before it could be acknowledged");
            return Ok(());
        }
        Err(err) => {
            warn!("deferral error: {err}");
            false
        }
    };

    let delivery = Delivery {
        responder,
        deferred,
    };

    let reply = match playerdb.lookup(&gamertag).await {
        Ok(player) => {
            trace!("{gamertag} resolved to {}", player.floodgate_id);
            found(&player)
        }
        Err(err) => {
            trace!("lookup for {gamertag} failed: {err}");
            lookup_failed(&gamertag, &err)
        }
    };

    delivery.send(reply).await;
    Ok(())
}

/// Last resort, once the regular flow broke down.
async fn notify_failure<R: Responder + ?Sized>(responder: &R) {
    if responder.is_responded() {
        return;
    }

    let notice = Reply::ephemeral(format!("{EMOJI_X} Command failed. Please try again."));
    if let Err(err) = responder.respond(notice).await {
        warn!("couldn't report the failure to the user: {err}");
        best_effort(
            "failure notice",
            responder.send_to_channel(Reply::public(format!(
                "{EMOJI_X} Bot encountered an error processing your request."
            ))),
        )
        .await;
    }
}
