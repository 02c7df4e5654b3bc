//! Minimal IRC client: registration, keep-alive and channel messages.

use std::time::Duration;

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::config::ChatSettings;

use super::{ChatMessage, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Handles to a live connection.
///
/// Drop `outbound` to close the writer; `inbound` yields `None` once the
/// server hangs up.
pub struct IrcConnection {
    /// Text to post in the joined channel.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Channel messages from other users.
    pub inbound: mpsc::UnboundedReceiver<ChatMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl IrcConnection {
    /// Connect, register and join the configured channel.
    pub async fn connect(settings: &ChatSettings) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", settings.host, settings.port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout(addr.clone()))??;
        let (read_half, mut write_half) = stream.into_split();

        if !settings.pass.is_empty() {
            write_line(&mut write_half, &format!("PASS {}", settings.pass)).await?;
        }
        write_line(&mut write_half, &format!("NICK {}", settings.nick)).await?;
        write_line(&mut write_half, &format!("JOIN {}", settings.channel)).await?;
        info!(%addr, channel = %settings.channel, nick = %settings.nick, "joined chat channel");

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (control_tx, mut control_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<ChatMessage>();

        let channel = settings.channel.clone();
        let writer = tokio::spawn(async move {
            loop {
                let line = tokio::select! {
                    Some(text) = outbound_rx.recv() => format!("PRIVMSG {channel} :{text}"),
                    Some(raw) = control_rx.recv() => raw,
                    else => break,
                };
                if let Err(err) = write_line(&mut write_half, &line).await {
                    warn!(error = %err, "chat writer stopped");
                    break;
                }
            }
        });

        let reader = tokio::spawn(read_lines(BufReader::new(read_half), control_tx, inbound_tx));

        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            reader,
            writer,
        })
    }

    /// Stop reading, then give the writer a moment to flush queued lines.
    ///
    /// Every other clone of the outbound sender must be dropped first.
    pub async fn shutdown(self) {
        let Self {
            outbound,
            inbound,
            reader,
            writer,
        } = self;
        drop(outbound);
        drop(inbound);
        reader.abort();
        let _ = reader.await;
        if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
            warn!("chat writer did not flush in time");
        }
    }
}

/// Forward channel messages and answer keep-alives until the server hangs up.
///
/// Lines are decoded lossily so a stray non-UTF-8 byte never ends the session.
async fn read_lines<R>(
    mut reader: R,
    control_tx: mpsc::UnboundedSender<String>,
    inbound_tx: mpsc::UnboundedSender<ChatMessage>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                warn!("chat server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "chat reader stopped");
                break;
            }
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some(payload) = line.strip_prefix("PING ") {
            if control_tx.send(format!("PONG {payload}")).is_err() {
                break;
            }
            continue;
        }
        match parse_privmsg(line) {
            Some(message) => {
                if inbound_tx.send(message).is_err() {
                    break;
                }
            }
            None => debug!(%line, "ignoring server line"),
        }
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await
}

/// Extract the author and text of a `PRIVMSG`, skipping an optional tags prefix.
pub fn parse_privmsg(line: &str) -> Option<ChatMessage> {
    let line = line.trim_end_matches(['\r', '\n']);
    let line = match line.strip_prefix('@') {
        Some(tagged) => tagged.split_once(' ')?.1,
        None => line,
    };
    let rest = line.strip_prefix(':')?;
    let (prefix, rest) = rest.split_once(' ')?;
    let rest = rest.strip_prefix("PRIVMSG ")?;
    let (_target, text) = rest.split_once(" :")?;
    let sender = prefix.split('!').next()?.trim();
    if sender.is_empty() {
        return None;
    }
    Some(ChatMessage {
        sender: sender.to_owned(),
        text: text.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_privmsg() {
        let message =
            parse_privmsg(":alice!alice@alice.tmi.twitch.tv PRIVMSG #trivia :Super Mario\r\n")
                .unwrap();
        assert_eq!(message.sender, "alice");
        assert_eq!(message.text, "Super Mario");
    }

    #[test]
    fn skips_tags_prefix() {
        let message = parse_privmsg(
            "@badge-info=;color=#FF0000 :bob!bob@bob.tmi.twitch.tv PRIVMSG #trivia :!score",
        )
        .unwrap();
        assert_eq!(message.sender, "bob");
        assert_eq!(message.text, "!score");
    }

    #[test]
    fn keeps_colons_inside_text() {
        let message = parse_privmsg(":carol!c@host PRIVMSG #trivia :time: 10:30").unwrap();
        assert_eq!(message.text, "time: 10:30");
    }

    #[test]
    fn ignores_other_commands() {
        assert!(parse_privmsg(":tmi.twitch.tv 001 bot :Welcome, GLHF!").is_none());
        assert!(parse_privmsg("PING :tmi.twitch.tv").is_none());
        assert!(parse_privmsg(":bot!bot@host JOIN #trivia").is_none());
    }

    fn local_settings(port: u16) -> ChatSettings {
        ChatSettings {
            host: "127.0.0.1".into(),
            port,
            nick: "triviabot".into(),
            pass: String::new(),
            channel: "#trivia".into(),
        }
    }

    #[tokio::test]
    async fn invalid_utf8_does_not_end_the_session() {
        use tokio::{io::AsyncWriteExt, net::TcpListener};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b":eve!eve@host PRIVMSG #trivia :caf\xe9\r\n")
                .await
                .unwrap();
            socket
                .write_all(b":bob!bob@host PRIVMSG #trivia :Luigi\r\n")
                .await
                .unwrap();
            socket.flush().await.unwrap();
            socket
        });

        let mut connection = IrcConnection::connect(&local_settings(port)).await.unwrap();
        let _socket = server.await.unwrap();

        let first = connection.inbound.recv().await.unwrap();
        assert_eq!(first.sender, "eve");
        assert_eq!(first.text, "caf\u{FFFD}");
        let second = connection.inbound.recv().await.unwrap();
        assert_eq!(second.sender, "bob");
        assert_eq!(second.text, "Luigi");
        connection.shutdown().await;
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let input: &[u8] = b"PING :tmi.twitch.tv\r\n:amy!amy@host PRIVMSG #trivia :hi\n";

        read_lines(input, control_tx, inbound_tx).await;

        assert_eq!(control_rx.recv().await.unwrap(), "PONG :tmi.twitch.tv");
        assert_eq!(inbound_rx.recv().await.unwrap().text, "hi");
    }
}
