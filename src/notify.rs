// --------------------------------------------------
// Outbound notifications.
//
// Delivers a message to an address through the transport
// chosen at startup from MailConfig. Handlers only see Notifier.
// --------------------------------------------------

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{MailConfig, TransportKind};
use crate::models::{Priority, Task};

const DEFAULT_SENDER_NAME: &str = "Task Board";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },
    #[error("message build error: {0}")]
    Build(#[from] lettre::error::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync + 'static {
    fn transport_tag(&self) -> &'static str {
        "unknown"
    }

    async fn deliver(&self, message: &Notification) -> Result<(), NotifyError>;
}

// Logs and drops. Used when no transport is configured.
#[derive(Debug, Default)]
pub struct DisabledTransport;

#[async_trait]
impl MailTransport for DisabledTransport {
    fn transport_tag(&self) -> &'static str {
        "disabled"
    }

    async fn deliver(&self, message: &Notification) -> Result<(), NotifyError> {
        debug!(to = %message.to, subject = %message.subject, "mail transport disabled; dropping message");
        Ok(())
    }
}

// Transactional-mail HTTP API (Brevo-compatible JSON payload)
#[derive(Debug)]
pub struct HttpApiTransport {
    endpoint: String,
    api_key: String,
    sender_name: String,
    sender_email: String,
    client: reqwest::Client,
}

impl HttpApiTransport {
    pub fn new(host: &str, api_key: String, sender: &str) -> Result<Self, NotifyError> {
        let (name, email) = split_sender(sender);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            endpoint: format!("{}/v3/smtp/email", host.trim_end_matches('/')),
            api_key,
            sender_name: name.unwrap_or(DEFAULT_SENDER_NAME).to_string(),
            sender_email: email.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn payload(&self, message: &Notification) -> serde_json::Value {
        json!({
            "sender": { "email": self.sender_email, "name": self.sender_name },
            "to": [{ "email": message.to }],
            "subject": message.subject,
            "htmlContent": message.html_body,
        })
    }
}

#[async_trait]
impl MailTransport for HttpApiTransport {
    fn transport_tag(&self) -> &'static str {
        "http-api"
    }

    #[instrument(name = "mail_http_api_deliver", skip_all, fields(to = %message.to))]
    async fn deliver(&self, message: &Notification) -> Result<(), NotifyError> {
        self.client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&self.payload(message))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// SMTP, either upgraded with STARTTLS or wrapped in TLS from the first byte
pub struct SmtpTransport {
    tag: &'static str,
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(cfg: &MailConfig) -> Result<Self, NotifyError> {
        let (tag, builder) = match cfg.transport {
            TransportKind::ImplicitTls => (
                "implicit-tls",
                AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?,
            ),
            _ => (
                "starttls",
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?,
            ),
        };
        let mut builder = match cfg.port {
            Some(port) => builder.port(port),
            None => builder,
        };
        if let Some(creds) = &cfg.credentials {
            let username = creds
                .username
                .clone()
                .unwrap_or_else(|| split_sender(&cfg.sender).1.to_string());
            builder = builder.credentials(Credentials::new(username, creds.secret.clone()));
        }

        Ok(Self {
            tag,
            from: parse_mailbox(&cfg.sender)?,
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    fn transport_tag(&self) -> &'static str {
        self.tag
    }

    #[instrument(name = "mail_smtp_deliver", skip_all, fields(to = %message.to))]
    async fn deliver(&self, message: &Notification) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&message.to)?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())?;
        self.mailer.send(email).await?;
        Ok(())
    }
}

pub fn transport_from_config(cfg: &MailConfig) -> Result<Arc<dyn MailTransport>, NotifyError> {
    Ok(match cfg.transport {
        TransportKind::Disabled => Arc::new(DisabledTransport),
        TransportKind::HttpApi => Arc::new(HttpApiTransport::new(
            &cfg.host,
            cfg.credentials
                .as_ref()
                .map(|c| c.secret.clone())
                .unwrap_or_default(),
            &cfg.sender,
        )?),
        TransportKind::StartTls | TransportKind::ImplicitTls => Arc::new(SmtpTransport::new(cfg)?),
    })
}

// What the application sends, and to whom
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn MailTransport>,
    notify_address: String,
}

impl Notifier {
    pub fn new(transport: Arc<dyn MailTransport>, notify_address: impl Into<String>) -> Self {
        Self {
            transport,
            notify_address: notify_address.into(),
        }
    }

    pub fn from_config(cfg: &MailConfig) -> Result<Self, NotifyError> {
        let transport = transport_from_config(cfg)?;
        info!(transport = transport.transport_tag(), "mail transport ready");
        Ok(Self::new(transport, cfg.notify_address.clone()))
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledTransport), String::new())
    }

    pub fn transport_tag(&self) -> &'static str {
        self.transport.transport_tag()
    }

    pub async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        self.transport.deliver(message).await
    }

    pub async fn task_created(&self, task: &Task) -> Result<(), NotifyError> {
        self.send(&self.task_message("New Task Added", "New Task Created", task, None))
            .await
    }

    pub async fn task_overdue(&self, task: &Task) -> Result<(), NotifyError> {
        self.send(&self.task_message(
            "Overdue Task Reminder",
            "Overdue Task",
            task,
            Some("Please review and take action."),
        ))
        .await
    }

    pub fn task_message(
        &self,
        subject: &str,
        heading: &str,
        task: &Task,
        footer: Option<&str>,
    ) -> Notification {
        let mut html_body = format!(
            "<h3>{heading}</h3>\n<p><b>Title:</b> {}</p>\n<p><b>Planned Time:</b> {}</p>\n<p><b>Priority:</b> {}</p>\n",
            escape_html(&task.title),
            format_planned(task.planned_at),
            priority_label(task.priority),
        );
        if let Some(footer) = footer {
            html_body.push_str(&format!("<p>{footer}</p>\n"));
        }
        Notification {
            to: self.notify_address.clone(),
            subject: subject.to_string(),
            html_body,
        }
    }
}

fn format_planned(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

fn priority_label(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
    }
}

// "Name <addr@x>" -> (Some("Name"), "addr@x"); bare address passes through
pub fn split_sender(raw: &str) -> (Option<&str>, &str) {
    match raw.rsplit_once('<') {
        Some((name, rest)) => {
            let name = name.trim().trim_matches('"').trim();
            let email = rest.trim_end().trim_end_matches('>').trim();
            ((!name.is_empty()).then_some(name), email)
        }
        None => (None, raw.trim()),
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, NotifyError> {
    raw.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: raw.to_string(),
        reason: e.to_string(),
    })
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
