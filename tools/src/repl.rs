//! Line-oriented editing session.
//!
//! Plain lines are typed into the memo. Lines starting with `:` are commands.

use crate::{describe, print_candidates};
use anyhow::Result;
use softkey_core::{Config, KeyEvent, KeyResult};
use std::io::{self, BufRead, Write};

const HELP: &str = "\
commands:
  :bs              backspace
  :nl              line break (commits pending input first)
  :commit          commit pending input
  :cancel          drop pending input
  :clear           empty the memo
  :pick N          accept candidate N on this page
  :key N KIND      press bound key N (Emoji or Literal)
  :next / :prev    candidate page
  :save            write the history file
  :help            this text
  :quit            save and exit";

fn parse(line: &str) -> Option<KeyEvent> {
    let Some(command) = line.strip_prefix(':') else {
        return Some(KeyEvent::Text(line.to_string()));
    };
    let mut parts = command.split_whitespace();
    let event = match parts.next()? {
        "bs" => KeyEvent::Backspace,
        "nl" => KeyEvent::LineBreak,
        "commit" => KeyEvent::Commit,
        "cancel" => KeyEvent::Cancel,
        "clear" => KeyEvent::Clear,
        "next" => KeyEvent::PageDown,
        "prev" => KeyEvent::PageUp,
        "pick" => KeyEvent::Select(parts.next()?.parse().ok()?),
        "key" => KeyEvent::Key {
            key_no: parts.next()?.parse().ok()?,
            kind: parts.next().unwrap_or("Literal").to_string(),
        },
        _ => return None,
    };
    Some(event)
}

pub fn run(config: Config) -> Result<()> {
    let mut session = softkey_core::init(config)?;

    println!("softkey REPL. Type text, or :help for commands. Ctrl-D to exit.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{}> ", describe(&session));
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }

        match line {
            ":quit" | ":q" => break,
            ":help" => {
                println!("{HELP}");
                continue;
            }
            ":save" => {
                match session.persist_history() {
                    Ok(()) => println!("history saved"),
                    Err(e) => eprintln!("error: {e}"),
                }
                continue;
            }
            _ => {}
        }

        let result = match parse(line) {
            Some(event) => session.handle_key(event),
            None => {
                eprintln!("unknown command; :help lists them");
                continue;
            }
        };

        match result {
            KeyResult::Handled => {}
            KeyResult::Rejected => println!("(rejected: memo is full)"),
            KeyResult::NotHandled => println!("(nothing to do)"),
        }
        print_candidates(session.suggestions().list().current_page_candidates());
    }

    softkey_core::shutdown(session)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_commands() {
        assert_eq!(parse("hello"), Some(KeyEvent::Text("hello".into())));
        assert_eq!(parse(":bs"), Some(KeyEvent::Backspace));
        assert_eq!(parse(":pick 3"), Some(KeyEvent::Select(3)));
        assert_eq!(
            parse(":key 10 emoji"),
            Some(KeyEvent::Key { key_no: 10, kind: "emoji".into() })
        );
        assert_eq!(parse(":pick x"), None);
        assert_eq!(parse(":bogus"), None);
    }
}
