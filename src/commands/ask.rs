use colored::Colorize;

use crate::assistant::Answer;
use crate::config::Config;
use crate::error::Result;
use crate::llm::prompts::error_response;

pub fn cmd_ask(config: &Config, query: &str, verbose: bool) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        println!("{}", "Input cannot be empty. Please try again.".yellow());
        return Ok(());
    }

    let index = super::load_index(&config.index_path)?;
    let assistant = super::build_assistant(config, &index);
    let rt = super::runtime()?;

    match rt.block_on(assistant.answer(query, &index)) {
        Ok(Answer::Generated { text, source }) => {
            if verbose {
                eprintln!(
                    "{} [{}#{}] ({:.1}%)",
                    "Context:".cyan(),
                    source.section,
                    source.position,
                    source.score * 100.0
                );
                if let Some(ref reference) = source.chunk.reference {
                    eprintln!("{} {}", "Source:".cyan(), reference.dimmed());
                }
            }
            println!("{}", text);
        }
        Ok(answer @ Answer::NoMatch) => {
            if verbose {
                eprintln!(
                    "{} nothing scored at least {:.2}",
                    "Context:".yellow(),
                    assistant.policy().threshold
                );
            }
            println!("{}", answer.text());
        }
        Err(err) => println!("{}", error_response(&err.to_string()).red()),
    }

    Ok(())
}
