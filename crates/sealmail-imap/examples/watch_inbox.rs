#![allow(clippy::expect_used, clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: log in, list unseen messages, then watch INBOX for new mail
//!
//! The connection enters IDLE by itself once nothing is queued; new mail
//! shows up as EXISTS updates on the handler.
//!
//! ## Running
//!
//! ```bash
//! RUST_LOG=sealmail_imap=debug cargo run --package sealmail-imap --example watch_inbox -- imap.example.com
//! ```

use std::io::{self, Write};
use std::time::Duration;

use sealmail_imap::{
    Auth, Client, Config, FetchAttribute, FetchItems, FetchOptions, SearchCriteria, Security,
    UpdateHandler,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct PrintUpdates;

impl UpdateHandler for PrintUpdates {
    fn on_exists(&mut self, mailbox: &str, count: u32) {
        println!("{mailbox}: {count} messages");
    }

    fn on_expunge(&mut self, mailbox: &str, seq: u32) {
        println!("{mailbox}: message {seq} removed");
    }

    fn on_alert(&mut self, text: &str) {
        println!("ALERT: {text}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealmail_imap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "outlook.office365.com".to_string());

    print!("Username: ");
    io::stdout().flush()?;
    let mut username = String::new();
    io::stdin().read_line(&mut username)?;

    print!("Password: ");
    io::stdout().flush()?;
    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    let config = Config::builder(host)
        .security(Security::Implicit)
        .enable_compression(true)
        .auth(Auth::Login {
            username: username.trim().to_string(),
            password: password.trim().to_string(),
        })
        .build();

    println!("\nConnecting to {}:{}...", config.host, config.port);
    let client = Client::connect_with_handler(config, PrintUpdates).await?;
    println!("✓ Connected ({})", client.capabilities());

    let unseen = client
        .search("INBOX", SearchCriteria::Unseen, true)
        .await?;
    println!("{} unseen messages", unseen.len());

    if let Some(last) = unseen.last() {
        let fetched = client
            .list_messages(
                "INBOX",
                &last.to_string(),
                FetchItems::Items(vec![FetchAttribute::Uid, FetchAttribute::Envelope]),
                FetchOptions {
                    by_uid: true,
                    ..FetchOptions::default()
                },
            )
            .await?;
        for message in fetched {
            println!("  {:?}", message.attributes);
        }
    }

    println!("\nWatching INBOX for two minutes...");
    tokio::time::sleep(Duration::from_secs(120)).await;

    client.logout().await?;
    println!("✓ Disconnected");
    Ok(())
}
