//! The few platform calls a command needs to answer a user, behind a trait.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use serenity::{
    all::{
        Colour, CommandInteraction, CreateEmbed, CreateInteractionResponse,
        CreateInteractionResponseFollowup, CreateInteractionResponseMessage, CreateMessage, Http,
    },
    http::HttpError,
};

/// A rich message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub colour: u32,
}

impl From<Embed> for CreateEmbed {
    fn from(embed: Embed) -> Self {
        CreateEmbed::new()
            .title(embed.title)
            .description(embed.description)
            .colour(Colour::new(embed.colour))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Plain text; ephemeral messages are only shown to the user who ran the command.
    Text { content: String, ephemeral: bool },
    Embed(Embed),
}

impl Reply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Reply::Text {
            content: content.into(),
            ephemeral: true,
        }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Reply::Text {
            content: content.into(),
            ephemeral: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The platform doesn't know about the interaction anymore, usually because its token
    /// expired.
    #[error("unknown or expired interaction")]
    Expired,
    #[error("platform error: {0}")]
    Platform(#[source] serenity::Error),
}

impl From<serenity::Error> for DeliveryError {
    fn from(err: serenity::Error) -> Self {
        match &err {
            serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
                if response.status_code.as_u16() == 404 =>
            {
                DeliveryError::Expired
            }
            _ => DeliveryError::Platform(err),
        }
    }
}

/// Ways to answer a single command invocation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Responder: Send + Sync {
    /// Whether the interaction already received its initial response (including a deferral).
    fn is_responded(&self) -> bool;

    /// Tell the platform the answer will come later, extending the reply deadline.
    async fn acknowledge(&self) -> Result<(), DeliveryError>;

    /// Answer an acknowledged interaction.
    async fn follow_up(&self, reply: Reply) -> Result<(), DeliveryError>;

    /// Answer an interaction that wasn't responded to yet.
    async fn respond(&self, reply: Reply) -> Result<(), DeliveryError>;

    /// Post a message in the channel the command came from, outside of the interaction.
    async fn send_to_channel(&self, reply: Reply) -> Result<(), DeliveryError>;
}

/// [`Responder`] backed by a Discord slash command interaction.
pub struct SerenityResponder {
    http: Arc<Http>,
    command: CommandInteraction,
    responded: AtomicBool,
}

impl SerenityResponder {
    pub fn new(http: Arc<Http>, command: CommandInteraction) -> Self {
        Self {
            http,
            command,
            responded: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Responder for SerenityResponder {
    fn is_responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    async fn acknowledge(&self) -> Result<(), DeliveryError> {
        self.command.defer(&self.http).await?;
        self.responded.store(true, Ordering::Release);
        Ok(())
    }

    async fn follow_up(&self, reply: Reply) -> Result<(), DeliveryError> {
        let builder = match reply {
            Reply::Text { content, ephemeral } => CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(ephemeral),
            Reply::Embed(embed) => CreateInteractionResponseFollowup::new().embed(embed.into()),
        };
        self.command.create_followup(&self.http, builder).await?;
        Ok(())
    }

    async fn respond(&self, reply: Reply) -> Result<(), DeliveryError> {
        let message = match reply {
            Reply::Text { content, ephemeral } => CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(ephemeral),
            Reply::Embed(embed) => CreateInteractionResponseMessage::new().embed(embed.into()),
        };
        self.command
            .create_response(&self.http, CreateInteractionResponse::Message(message))
            .await?;
        self.responded.store(true, Ordering::Release);
        Ok(())
    }

    async fn send_to_channel(&self, reply: Reply) -> Result<(), DeliveryError> {
        // Visibility only exists within interactions.
        let message = match reply {
            Reply::Text { content, .. } => CreateMessage::new().content(content),
            Reply::Embed(embed) => CreateMessage::new().embed(embed.into()),
        };
        self.command
            .channel_id
            .send_message(&self.http, message)
            .await?;
        Ok(())
    }
}
