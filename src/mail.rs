use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use regex::Regex;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig, username: &str, password: &str) -> anyhow::Result<Self> {
        let builder = if cfg.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.server)
                .with_context(|| format!("smtp relay {}", cfg.server))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.server)
        };
        let transport = builder
            .port(cfg.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(message.from.parse().context("parse sender address")?)
            .to(message.to.parse().context("parse recipient address")?)
            .subject(message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)
            .context("build email")?;
        self.transport.send(email).await.context("smtp send")?;
        Ok(())
    }
}

/// Used when no SMTP credentials are configured. Reset links are masked
/// before the body is logged.
pub struct LogMailer;

pub(crate) fn mask_reset_links(body: &str) -> String {
    lazy_static! {
        static ref RESET_LINK_RE: Regex = Regex::new(r"/auth/reset_password/\S+").unwrap();
    }
    RESET_LINK_RE
        .replace_all(body, "/auth/reset_password/<token>")
        .into_owned()
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "mail transport not configured; logging message instead"
        );
        debug!(body = %mask_reset_links(&message.body), "unsent mail body");
        Ok(())
    }
}

pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Box<dyn Mailer>> {
    match (&cfg.username, &cfg.password) {
        (Some(user), Some(pass)) => Ok(Box::new(SmtpMailer::new(cfg, user, pass)?)),
        _ => Ok(Box::new(LogMailer)),
    }
}
