//! Interactive console for talking to a single node.
//!
//! [`ConsoleCommand::parse`] turns a line of input into a command and
//! [`run_session`] drives the read-eval-print loop over any reader/writer
//! pair, so tests can run it against in-memory pipes.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::cli::ClientArgs;
use crate::client::NodeClient;

pub const HELP_TEXT: &[&str] = &[
    "Commands:",
    " put <key> <value>  - Add or update a key",
    " get <key>          - Retrieve a key",
    " delete <key>       - Remove a key",
    " list               - Show all keys",
    " exit               - Quit the program",
];

/// Commands that can be entered at the prompt.
#[derive(Debug, PartialEq)]
pub enum ConsoleCommand {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    List,
    Help,
    Exit,
}

impl ConsoleCommand {
    /// Parses a line of user input into a command.
    ///
    /// Commands are case-insensitive and accept one-letter aliases
    /// (`p`, `g`, `d`, `l`, `h`, `e`). Everything after the key of a `put`
    /// is the value, spaces included.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("empty command"));
        }

        let (cmd, args) = split_word(trimmed);
        let (key, rest) = split_word(args);
        let cmd = cmd.to_lowercase();
        let key = Some(key).filter(|key| !key.is_empty());
        let rest = Some(rest).filter(|rest| !rest.is_empty());

        let normalized = match cmd.as_str() {
            "p" => "put",
            "g" => "get",
            "d" | "del" => "delete",
            "l" | "ls" => "list",
            "h" | "?" => "help",
            "e" | "q" | "quit" => "exit",
            other => other,
        };

        // Words past the ones a command needs are ignored.
        match (normalized, key, rest) {
            ("list", _, _) => Ok(ConsoleCommand::List),
            ("help", _, _) => Ok(ConsoleCommand::Help),
            ("exit", _, _) => Ok(ConsoleCommand::Exit),
            ("get", Some(key), _) => Ok(ConsoleCommand::Get {
                key: key.to_string(),
            }),
            ("delete", Some(key), _) => Ok(ConsoleCommand::Delete {
                key: key.to_string(),
            }),
            ("put", Some(key), Some(value)) => Ok(ConsoleCommand::Put {
                key: key.to_string(),
                value: value.to_string(),
            }),
            ("put", _, _) => Err(anyhow!("Usage: put <key> <value>")),
            ("get", _, _) => Err(anyhow!("Usage: get <key>")),
            ("delete", _, _) => Err(anyhow!("Usage: delete <key>")),
            _ => Err(anyhow!("Unknown command. Type 'help' for commands.")),
        }
    }
}

/// Splits off the first whitespace-delimited word.
fn split_word(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (input, ""),
    }
}

/// Connects to `args.server` and runs the console on stdin/stdout.
pub async fn run(args: ClientArgs) -> Result<()> {
    let client = NodeClient::connect(&args.server, args.timeouts())
        .await
        .with_context(|| format!("could not connect to {}", args.server))?;

    let mut stdout = io::stdout();
    write_line(&mut stdout, &format!("Connected to key-value store at {}", args.server)).await?;
    write_line(&mut stdout, "Type 'help' for commands.").await?;

    let stdin = BufReader::new(io::stdin());
    run_session(client, stdin, stdout).await
}

/// Reads commands from `input` until EOF or `exit`, printing results to `output`.
///
/// Request failures are reported and the session carries on.
pub async fn run_session<R, W>(mut client: NodeClient, mut input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Exit) => {
                write_line(&mut output, "Bye!").await?;
                break;
            }
            Ok(command) => execute(&mut client, command, &mut output).await?,
            Err(err) => write_line(&mut output, &err.to_string()).await?,
        }
    }

    if let Err(err) = client.close().await {
        warn!(error = ?err, "failed to close connection cleanly");
    }
    Ok(())
}

async fn execute<W>(client: &mut NodeClient, command: ConsoleCommand, output: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match command {
        ConsoleCommand::Put { key, value } => match client.put(key, value, false).await {
            Ok(_) => write_line(output, "Stored successfully").await,
            Err(err) => report(output, "put", err).await,
        },
        ConsoleCommand::Get { key } => match client.get(key.clone()).await {
            Ok(Some(value)) => write_line(output, &format!("{key} = {value}")).await,
            Ok(None) => write_line(output, "Key not found").await,
            Err(err) => report(output, "get", err).await,
        },
        ConsoleCommand::Delete { key } => match client.delete(key, false).await {
            Ok(_) => write_line(output, "Deleted successfully").await,
            Err(err) => report(output, "delete", err).await,
        },
        ConsoleCommand::List => match client.list().await {
            Ok(entries) if entries.is_empty() => write_line(output, "(empty)").await,
            Ok(entries) => {
                write_line(output, "Current store contents:").await?;
                let sorted: BTreeMap<_, _> = entries.into_iter().collect();
                for (key, value) in sorted {
                    write_line(output, &format!("{key} = {value}")).await?;
                }
                Ok(())
            }
            Err(err) => report(output, "list", err).await,
        },
        ConsoleCommand::Help => {
            for line in HELP_TEXT {
                write_line(output, line).await?;
            }
            Ok(())
        }
        ConsoleCommand::Exit => Ok(()),
    }
}

async fn report<W>(output: &mut W, op: &str, err: anyhow::Error) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_line(output, &format!("Error on {op}: {err:#}")).await
}

async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
