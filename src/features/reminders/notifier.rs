//! Reminder rendering and delivery
//!
//! The scheduler only knows about [`Notifier`] and [`MessageRenderer`]; the
//! Discord embed format lives entirely in [`DiscordNotifier`].
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Split rendering from delivery so the embed format stays out of the engine
//! - 1.0.0: Initial channel delivery with occurrence fields

use async_trait::async_trait;
use log::debug;
use serenity::builder::CreateEmbed;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use serenity::utils::Color;
use std::sync::Arc;

use super::model::{Reminder, ReminderKind};
use crate::core::{
    truncate_for_embed, truncate_for_message, truncate_for_title, truncate_to, ReminderError,
    ReminderResult, EMBED_FIELD_LIMIT,
};

pub const REMINDER_FOOTER: &str = "Scrum Owl Reminder";
const REMINDER_COLOR: (u8, u8, u8) = (0x00, 0x99, 0xff);

/// Platform-neutral reminder payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Plain message content (owner mention)
    pub content: String,
    pub title: String,
    pub body: String,
    /// `(name, value)` pairs shown inline
    pub fields: Vec<(String, String)>,
    pub footer: String,
}

/// Turns a reminder into a human-readable payload
pub trait MessageRenderer: Send + Sync {
    fn render(&self, reminder: &Reminder) -> RenderedMessage;
}

/// Delivers a rendered reminder to a destination channel
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, destination_id: &str, message: &RenderedMessage) -> ReminderResult<()>;
}

/// Renders the reminder as it is about to fire (occurrence numbers are 1-based)
#[derive(Debug, Clone, Default)]
pub struct DefaultRenderer;

impl MessageRenderer for DefaultRenderer {
    fn render(&self, reminder: &Reminder) -> RenderedMessage {
        let mut fields = Vec::new();

        if let ReminderKind::Recurring(recurrence) = &reminder.kind {
            let occurrence = recurrence.occurrence_count + 1;
            fields.push(("Type".to_string(), recurrence.interval.label()));
            fields.push(("Count".to_string(), format!("Occurrence: {occurrence}")));
            if let Some(max) = recurrence.max_occurrences {
                fields.push(("Progress".to_string(), format!("{occurrence}/{max}")));
            }
        }

        RenderedMessage {
            content: format!("<@{}>", reminder.user_id),
            title: truncate_for_title(&format!("🔔 {}", reminder.title)),
            body: truncate_for_embed(&reminder.message),
            fields,
            footer: REMINDER_FOOTER.to_string(),
        }
    }
}

/// Sends reminders to Discord channels as a mention plus an embed
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    fn build_embed(message: &RenderedMessage) -> CreateEmbed {
        let (r, g, b) = REMINDER_COLOR;
        let mut embed = CreateEmbed::default();
        embed
            .title(&message.title)
            .description(&message.body)
            .color(Color::from_rgb(r, g, b));
        for (name, value) in &message.fields {
            embed.field(name, truncate_to(value, EMBED_FIELD_LIMIT), true);
        }
        embed.footer(|f| f.text(&message.footer));
        embed
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, destination_id: &str, message: &RenderedMessage) -> ReminderResult<()> {
        let channel_id = destination_id
            .parse::<u64>()
            .map(ChannelId)
            .map_err(|_| ReminderError::delivery(destination_id, "not a Discord channel id"))?;

        let embed = Self::build_embed(message);
        let content = truncate_for_message(&message.content);
        channel_id
            .send_message(&self.http, |m| m.content(content).set_embed(embed))
            .await
            .map_err(|e| ReminderError::delivery(destination_id, e.to_string()))?;

        debug!("Delivered reminder '{}' to channel {}", message.title, destination_id);
        Ok(())
    }
}
