//! Integration tests for the IMAP client.
//!
//! Servers are scripted either with `tokio_test::io::Builder` (fixed
//! conversations) or with an in-memory duplex pipe (when the test has to
//! react to what the client sends).

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio_test::io::Builder;

use sealmail_imap::{
    Auth, Client, CollectingHandler, CommandOptions, Config, Connection, ConnectionState, Error,
    FetchItems, FetchOptions, ImapStream, NoopHandler, Request, SearchCriteria, UpdateEvent,
};

/// Server side of a duplex pipe, read line by line.
struct Server {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Server {
    async fn expect(&mut self, line: &str) {
        let mut got = String::new();
        self.reader.read_line(&mut got).await.unwrap();
        assert_eq!(got, format!("{line}\r\n"));
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }
}

fn pipe() -> (ImapStream, Server) {
    let (client, server) = tokio::io::duplex(16 * 1024);
    let (read, write) = tokio::io::split(server);
    (
        ImapStream::other(client),
        Server {
            reader: BufReader::new(read),
            writer: write,
        },
    )
}

fn quiet_config() -> Config {
    Config::builder("imap.example.com")
        .enter_idle_delay(Duration::from_secs(3600))
        .build()
}

#[tokio::test]
async fn test_login_requeries_capabilities() {
    let mock = Builder::new()
        .read(b"* OK IMAP4rev1 Service Ready\r\n")
        .write(b"W1 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 AUTH=LOGIN\r\nW1 OK CAPABILITY completed\r\n")
        .write(b"W2 LOGIN \"me\" \"secret\"\r\n")
        .read(b"W2 OK LOGIN completed\r\n")
        .write(b"W3 CAPABILITY\r\n")
        .read(b"* CAPABILITY IMAP4rev1 IDLE MOVE\r\nW3 OK CAPABILITY completed\r\n")
        .wait(Duration::from_secs(3600))
        .build();

    let config = Config::builder("imap.example.com")
        .enter_idle_delay(Duration::from_secs(3600))
        .auth(Auth::Login {
            username: "me".to_string(),
            password: "secret".to_string(),
        })
        .build();
    let client = Client::from_stream(ImapStream::other(mock), config, NoopHandler)
        .await
        .unwrap();

    assert_eq!(client.state(), ConnectionState::Authenticated);
    assert!(client.has_capability("IDLE"));
    assert!(client.has_capability("MOVE"));
    assert!(!client.has_capability("AUTH=LOGIN"));
    client.close();
}

#[tokio::test]
async fn test_login_with_inline_capabilities_skips_requery() {
    let mock = Builder::new()
        .read(b"* OK [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"W1 LOGIN \"me\" \"secret\"\r\n")
        .read(b"W1 OK [CAPABILITY IMAP4rev1 UIDPLUS] logged in\r\n")
        .wait(Duration::from_secs(3600))
        .build();

    let config = Config::builder("imap.example.com")
        .enter_idle_delay(Duration::from_secs(3600))
        .auth(Auth::Login {
            username: "me".to_string(),
            password: "secret".to_string(),
        })
        .build();
    let client = Client::from_stream(ImapStream::other(mock), config, NoopHandler)
        .await
        .unwrap();
    assert!(client.has_capability("UIDPLUS"));
    client.close();
}

#[tokio::test]
async fn test_literal_split_across_reads() {
    let mock = Builder::new()
        .read(b"* PREAUTH [CAPABILITY IMAP4rev1] ready\r\n")
        .write(b"W1 SELECT \"INBOX\"\r\n")
        .read(b"* 1 EXISTS\r\nW1 OK [READ-WRITE] done\r\n")
        .write(b"W2 FETCH 1 BODY[]\r\n")
        .read(b"* 1 FETCH (BODY[] {11}\r\nHello")
        .read(b" world)\r\nW2 OK FETCH completed\r\n")
        .wait(Duration::from_secs(3600))
        .build();

    let client = Client::from_stream(ImapStream::other(mock), quiet_config(), NoopHandler)
        .await
        .unwrap();
    client
        .select_mailbox("INBOX", sealmail_imap::SelectOptions::default())
        .await
        .unwrap();
    let fetched = client
        .list_messages(
            "INBOX",
            "1",
            FetchItems::Items(vec![sealmail_imap::FetchAttribute::Body {
                section: None,
                peek: false,
                partial: None,
            }]),
            FetchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].nr, Some(1));
    let body = fetched[0]
        .attributes
        .first()
        .and_then(sealmail_imap::Attribute::as_list)
        .and_then(|items| items.get(1))
        .and_then(sealmail_imap::Attribute::as_str)
        .unwrap();
    assert_eq!(body, "Hello world");
    client.close();
}

#[tokio::test]
async fn test_message_commands_select_their_mailbox() {
    let (stream, mut server) = pipe();
    let collected = CollectingHandler::new();
    let script = tokio::spawn(async move {
        server.send("* PREAUTH [CAPABILITY IMAP4rev1] ready").await;

        // The SELECT is spliced ahead of the FETCH that needed it.
        server.expect("W2.p SELECT \"INBOX\"").await;
        server.send("* 2 EXISTS").await;
        server.send("W2.p OK [READ-WRITE] SELECT completed").await;
        server.expect("W1.p FETCH 1:2 FAST").await;
        server.send("* 1 FETCH (FLAGS (\\Seen))").await;
        server.send("* 2 FETCH (FLAGS ())").await;
        server.send("W1.p OK FETCH completed").await;

        // Already selected.
        server.expect("W3 SEARCH UNSEEN").await;
        server.send("* SEARCH 2").await;
        server.send("W3 OK SEARCH completed").await;

        // A different mailbox.
        server.expect("W5.p SELECT \"Archive\"").await;
        server.send("W5.p OK [READ-WRITE] SELECT completed").await;
        server.expect("W4.p SEARCH UNSEEN").await;
        server.send("* SEARCH").await;
        server.send("W4.p OK SEARCH completed").await;
        server
    });

    let client = Client::from_stream(stream, quiet_config(), collected.clone())
        .await
        .unwrap();
    let fetched = client
        .list_messages("INBOX", "1:2", FetchItems::Fast, FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(fetched.len(), 2);
    assert_eq!(fetched[1].nr, Some(2));

    let unseen = client
        .search("INBOX", SearchCriteria::Unseen, false)
        .await
        .unwrap();
    assert_eq!(unseen, [2]);

    let archived = client
        .search("Archive", SearchCriteria::Unseen, false)
        .await
        .unwrap();
    assert!(archived.is_empty());
    assert_eq!(
        client.state().selected_mailbox(),
        Some("Archive"),
        "state follows the last SELECT"
    );

    assert_eq!(
        collected.take(),
        [
            UpdateEvent::Selected {
                mailbox: "INBOX".to_string(),
                read_only: false
            },
            UpdateEvent::Closed {
                mailbox: "INBOX".to_string()
            },
            UpdateEvent::Selected {
                mailbox: "Archive".to_string(),
                read_only: false
            },
        ]
    );
    script.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_idle_is_left_before_next_command() {
    let (stream, mut server) = pipe();
    server.send("* PREAUTH [CAPABILITY IMAP4rev1 IDLE] ready").await;
    let config = Config::builder("imap.example.com")
        .enter_idle_delay(Duration::from_secs(1))
        .build();
    let connection = Connection::from_stream(stream, &config).await.unwrap();

    // Nothing queued: after the delay the connection idles on its own.
    server.expect("W1 IDLE").await;
    server.send("+ idling").await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(connection.state().is_authenticated());

    let noop = tokio::spawn({
        let connection = connection.clone();
        async move {
            connection
                .exec(Request::new("NOOP"), &[], CommandOptions::new())
                .await
        }
    });
    server.expect("DONE").await;
    server.send("W1 OK IDLE terminated").await;
    server.expect("W2 NOOP").await;
    server.send("W2 OK NOOP completed").await;
    assert_eq!(noop.await.unwrap().unwrap().command, "OK");
    connection.close();
}

#[tokio::test(start_paused = true)]
async fn test_noop_keep_alive_without_idle() {
    let (stream, mut server) = pipe();
    server.send("* PREAUTH [CAPABILITY IMAP4rev1] ready").await;
    let config = Config::builder("imap.example.com")
        .enter_idle_delay(Duration::from_secs(1))
        .keep_alive(Duration::from_secs(60), Duration::from_secs(30))
        .build();
    let connection = Connection::from_stream(stream, &config).await.unwrap();

    server.expect("W1 NOOP").await;
    server.send("W1 OK NOOP completed").await;
    server.expect("W2 NOOP").await;
    server.send("W2 OK NOOP completed").await;
    connection.close();
}

#[tokio::test]
async fn test_upload_returns_appended_uid() {
    let (stream, mut server) = pipe();
    let script = tokio::spawn(async move {
        server.send("* PREAUTH [CAPABILITY IMAP4rev1 UIDPLUS] ready").await;
        server.expect("W1 APPEND \"Sent\" (\\Seen) {5}").await;
        server.send("+ Ready for literal data").await;
        server.expect("hello").await;
        server
            .send("W1 OK [APPENDUID 38505 3955] APPEND completed")
            .await;
        server
    });

    let client = Client::from_stream(stream, quiet_config(), NoopHandler)
        .await
        .unwrap();
    let uid = client
        .upload("Sent", &b"hello"[..], vec!["\\Seen".to_string()])
        .await
        .unwrap();
    assert_eq!(uid, Some(3955));
    script.await.unwrap();
}

#[tokio::test]
async fn test_move_falls_back_to_copy_and_delete() {
    let (stream, mut server) = pipe();
    let script = tokio::spawn(async move {
        server
            .send("* PREAUTH [CAPABILITY IMAP4rev1 UIDPLUS] ready")
            .await;
        server.expect("W2.p SELECT \"INBOX\"").await;
        server.send("W2.p OK [READ-WRITE] SELECT completed").await;
        server.expect("W1.p UID COPY 7 \"Trash\"").await;
        server.send("W1.p OK [COPYUID 1 7 42] COPY completed").await;
        server.expect("W3 UID STORE 7 +FLAGS.SILENT (\\Deleted)").await;
        server.send("W3 OK STORE completed").await;
        server.expect("W4 UID EXPUNGE 7").await;
        server.send("* 1 EXPUNGE").await;
        server.send("W4 OK EXPUNGE completed").await;
        server
    });

    let collected = CollectingHandler::new();
    let client = Client::from_stream(stream, quiet_config(), collected.clone())
        .await
        .unwrap();
    client
        .move_messages("INBOX", "7", "Trash", true)
        .await
        .unwrap();
    assert!(collected.take().contains(&UpdateEvent::Expunge {
        mailbox: "INBOX".to_string(),
        seq: 1
    }));
    script.await.unwrap();
}

#[tokio::test]
async fn test_logout() {
    let (stream, mut server) = pipe();
    let script = tokio::spawn(async move {
        server.send("* PREAUTH [CAPABILITY IMAP4rev1] ready").await;
        server.expect("W1 LOGOUT").await;
        server.send("* BYE logging out").await;
        server.send("W1 OK LOGOUT completed").await;
        server
    });

    let client = Client::from_stream(stream, quiet_config(), NoopHandler)
        .await
        .unwrap();
    client.logout().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Logout);
    assert!(client.connection().is_closed());
    script.await.unwrap();
}

#[tokio::test]
async fn test_server_hangup_fails_pending_command() {
    let (stream, mut server) = pipe();
    server.send("* PREAUTH [CAPABILITY IMAP4rev1] ready").await;
    let client = Client::from_stream(stream, quiet_config(), NoopHandler)
        .await
        .unwrap();

    let pending = tokio::spawn({
        let connection = client.connection().clone();
        async move {
            connection
                .exec(Request::new("NOOP"), &[], CommandOptions::new())
                .await
        }
    });
    server.expect("W1 NOOP").await;
    drop(server);

    let err = pending.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed(_) | Error::Io(_)));
    assert_eq!(client.state(), ConnectionState::Logout);

    // Commands queued after teardown fail straight away.
    let err = client
        .search("INBOX", SearchCriteria::All, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed(_)));
}
