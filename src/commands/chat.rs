use std::io::{BufRead, Write};

use colored::Colorize;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::error::Result;
use crate::history::History;
use crate::index::ChunkIndex;

const EMPTY_INPUT: &str = "Input cannot be empty. Please try again.";
const GOODBYE: &str = "Session terminated. Goodbye!";

pub fn cmd_chat(config: &Config) -> Result<()> {
    let index = super::load_index(&config.index_path)?;
    let assistant = super::build_assistant(config, &index);
    let rt = super::runtime()?;

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let history = run_session(&rt, &assistant, &index, stdin.lock(), &mut stdout)?;

    tracing::debug!(turns = history.len(), "session ended");
    Ok(())
}

/// Line-oriented read loop. Ends on `exit`/`quit` (any case) or end of input.
pub fn run_session<R: BufRead, W: Write>(
    rt: &tokio::runtime::Runtime,
    assistant: &Assistant,
    index: &ChunkIndex,
    mut input: R,
    out: &mut W,
) -> Result<History> {
    let mut history = History::new();

    writeln!(
        out,
        "{} Type 'exit' to end the session.\n",
        "Chat assistant is active!".green().bold()
    )?;

    loop {
        write!(out, "{} ", "User:".cyan().bold())?;
        out.flush()?;

        // Invalid UTF-8 is replaced rather than ending the session
        let mut buf = Vec::new();
        if input.read_until(b'\n', &mut buf)? == 0 {
            writeln!(out)?;
            writeln!(out, "{}", GOODBYE)?;
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            writeln!(out, "{}", GOODBYE)?;
            break;
        }
        if query.is_empty() {
            writeln!(out, "{}", EMPTY_INPUT.yellow())?;
            continue;
        }

        let reply = rt.block_on(assistant.respond(query, index, &mut history));
        writeln!(out, "{} {}", "Assistant:".green().bold(), reply)?;
    }

    Ok(history)
}
