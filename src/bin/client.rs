//! Chat Relay Client - Entry Point
//!
//! Asks for whatever connection details were not given on the command line,
//! joins with a nickname and relays terminal lines until `exit`.

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use chat_relay::{ChatClient, ClientArgs, ExitReason, MessageCodec};
use chat_relay::transport::DEFAULT_BUFFER_SIZE;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut input = BufReader::new(tokio::io::stdin());

    let host = match args.host {
        Some(host) => host,
        None => prompt(&mut input, "Server IP: ").await?,
    };
    let port = match args.port {
        Some(port) => port,
        None => loop {
            match prompt(&mut input, "Port: ").await?.parse::<u16>() {
                Ok(port) => break port,
                Err(_) => println!("Not a valid port number"),
            }
        },
    };
    let nickname = match args.nickname {
        Some(nickname) => nickname,
        None => prompt(&mut input, "Nickname: ").await?,
    };

    let addr = format!("{host}:{port}");
    let codec = MessageCodec::new(args.framing, DEFAULT_BUFFER_SIZE);
    let mut client = match ChatClient::connect(&addr, codec).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Could not connect to the server: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = client.join(&nickname).await {
        eprintln!("Could not send nickname: {e}");
        std::process::exit(1);
    }

    println!("Connected! Type messages, 'exit' to quit.");
    let reason = client.run(input, tokio::io::stdout()).await?;
    match reason {
        ExitReason::Disconnected => println!("Disconnected from server"),
        ExitReason::UserExit | ExitReason::InputClosed => println!("Left the chat"),
    }

    // Stdin reads block a runtime thread; exit instead of waiting on it
    std::process::exit(0);
}

/// Ask until a non-empty answer arrives
async fn prompt<R>(input: &mut R, question: &str) -> Result<String, Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;

        let mut line = String::new();
        if input.read_line(&mut line).await? == 0 {
            return Err("input closed".into());
        }
        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
    }
}
