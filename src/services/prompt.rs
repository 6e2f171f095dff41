//! Prompt collaborator for interactive runs
//!
//! The pipeline only needs four primitives: confirm, single-select,
//! multi-select, and bounded number entry. They are behind a trait so the
//! interactive flow stays testable with a scripted implementation; the
//! terminal implementation is plain line-based stdin.

use std::io::{self, Write};

/// Operator interaction boundary. Every call is cancellable: `None` / an
/// empty selection means the operator backed out.
pub trait Prompt {
    fn confirm(&mut self, message: &str, default: bool) -> io::Result<bool>;
    fn select(&mut self, message: &str, items: &[String]) -> io::Result<Option<usize>>;
    fn multi_select(&mut self, message: &str, items: &[String]) -> io::Result<Vec<usize>>;
    fn number(&mut self, message: &str, min: u32, max: u32) -> io::Result<Option<u32>>;
}

/// Line-based terminal prompt
#[derive(Default)]
pub struct TermPrompt;

impl TermPrompt {
    fn read_line(&self) -> io::Result<String> {
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }

    fn print_items(items: &[String]) {
        for (index, item) in items.iter().enumerate() {
            println!("  {}. {}", index + 1, item);
        }
    }
}

impl Prompt for TermPrompt {
    fn confirm(&mut self, message: &str, default: bool) -> io::Result<bool> {
        loop {
            if default {
                print!("{} (Y/n): ", message);
            } else {
                print!("{} (y/N): ", message);
            }
            io::stdout().flush()?;

            match self.read_line()?.to_uppercase().as_str() {
                "Y" | "YES" => return Ok(true),
                "N" | "NO" => return Ok(false),
                "" => return Ok(default),
                _ => continue,
            }
        }
    }

    fn select(&mut self, message: &str, items: &[String]) -> io::Result<Option<usize>> {
        println!("{}", message);
        Self::print_items(items);

        loop {
            print!("Choice (1-{}, empty to cancel): ", items.len());
            io::stdout().flush()?;

            let input = self.read_line()?;
            if input.is_empty() {
                return Ok(None);
            }
            match input.parse::<usize>() {
                Ok(n) if n >= 1 && n <= items.len() => return Ok(Some(n - 1)),
                _ => continue,
            }
        }
    }

    fn multi_select(&mut self, message: &str, items: &[String]) -> io::Result<Vec<usize>> {
        println!("{}", message);
        Self::print_items(items);

        loop {
            print!(
                "Choices (comma-separated, 1-{}, empty for none): ",
                items.len()
            );
            io::stdout().flush()?;

            let input = self.read_line()?;
            if input.is_empty() {
                return Ok(Vec::new());
            }

            let parsed: Option<Vec<usize>> = input
                .split(',')
                .map(|token| {
                    token
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .filter(|&n| n >= 1 && n <= items.len())
                        .map(|n| n - 1)
                })
                .collect();

            match parsed {
                Some(mut indices) => {
                    indices.sort_unstable();
                    indices.dedup();
                    return Ok(indices);
                }
                None => continue,
            }
        }
    }

    fn number(&mut self, message: &str, min: u32, max: u32) -> io::Result<Option<u32>> {
        loop {
            print!("{} ({}-{}, empty to cancel): ", message, min, max);
            io::stdout().flush()?;

            let input = self.read_line()?;
            if input.is_empty() {
                return Ok(None);
            }
            match input.parse::<u32>() {
                Ok(n) if n >= min && n <= max => return Ok(Some(n)),
                _ => continue,
            }
        }
    }
}
