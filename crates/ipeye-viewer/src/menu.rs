use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::error;

use crate::{Result, context::Context, server::open_browser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    View,
    Exit,
}

pub fn parse_action(input: &str) -> Option<Action> {
    match input.trim().to_lowercase().as_str() {
        "1" | "u" | "update" => Some(Action::Update),
        "2" | "v" | "view" => Some(Action::View),
        "3" | "q" | "quit" | "exit" => Some(Action::Exit),
        _ => None,
    }
}

pub async fn run(context: &Context) -> Result<()> {
    run_with(context, BufReader::new(tokio::io::stdin())).await
}

/// Menu loop over an arbitrary input; end of input behaves like "Exit".
pub async fn run_with<R: AsyncBufRead + Unpin>(context: &Context, input: R) -> Result<()> {
    let mut lines = input.lines();

    loop {
        print_menu()?;

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };

        match parse_action(&line) {
            Some(Action::Update) => match context.catalog.update().await {
                Ok(summary) => println!(
                    "Cameras updated: {} of {} streams resolved",
                    summary.resolved, summary.total
                ),
                Err(err) => error!(err = ?err, "Failed to update cameras"),
            },
            Some(Action::View) => view(context, &mut lines).await?,
            Some(Action::Exit) => return Ok(()),
            None => println!("Unknown choice: {}", line.trim()),
        }
    }
}

fn print_menu() -> Result<()> {
    println!();
    println!("*** IPEYE cameras ***");
    println!("1. Update cameras");
    println!("2. View cameras");
    println!("3. Exit");
    print!("Choose an action [1-3]: ");
    io::stdout()
        .flush()
        .map_err(|e| io::Error::new(e.kind(), format!("Failed to flush stdout: {e}")))?;
    Ok(())
}

async fn view<R: AsyncBufRead + Unpin>(context: &Context, lines: &mut Lines<R>) -> Result<()> {
    let server = match context.web_server().start().await {
        Ok(server) => server,
        Err(err) => {
            error!(err = ?err, "Failed to start web server");
            return Ok(());
        }
    };

    let page = format!("{}/index.html", server.url());
    println!("Serving cameras at {page}");
    if context.config.server.open_browser {
        open_browser(&page);
    }

    println!("Press Enter to return to the menu...");
    lines.next_line().await?;

    if let Err(err) = server.stop().await {
        error!(err = ?err, "Web server terminated abnormally");
    }
    Ok(())
}
