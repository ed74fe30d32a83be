//! Styled terminal output utilities.
//!
//! Reports and SQL go to stdout so they can be piped; status lines and
//! prompts go to stderr.

use std::io::{self, BufRead, Write};

use owo_colors::OwoColorize;

/// Print a header/title
pub fn header(text: &str) {
    eprintln!();
    eprintln!("{}", text.bold().cyan());
    eprintln!("{}", "─".repeat(text.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    eprintln!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    eprintln!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a list item
pub fn list_item(text: &str) {
    eprintln!("  {} {}", "•".dimmed(), text);
}

/// Print a statement list as a script on stdout.
pub fn script(statements: &[String]) {
    for stmt in statements {
        println!("{stmt};");
    }
}

/// Ask for an exact phrase. Anything else (including end of input) is a
/// refusal.
pub fn confirm_typed(prompt: &str, expected: &str) -> io::Result<bool> {
    confirm_typed_from(&mut io::stdin().lock(), prompt, expected)
}

/// [`confirm_typed`] over any reader.
pub fn confirm_typed_from<R: BufRead>(reader: &mut R, prompt: &str, expected: &str) -> io::Result<bool> {
    eprint!("{} {} ", prompt, format!("Type '{expected}' to continue:").dimmed());
    io::stderr().flush()?;

    let mut input = String::new();
    if reader.read_line(&mut input)? == 0 {
        return Ok(false);
    }
    Ok(input.trim_end_matches(['\r', '\n']) == expected)
}
