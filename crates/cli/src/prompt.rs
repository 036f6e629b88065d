use std::io::{self, BufRead, Write};

use survive_core::DecisionPort;
use tracing::warn;

/// Answers engine questions on the terminal.
#[derive(Debug, Default)]
pub struct TerminalDecisions;

impl DecisionPort for TerminalDecisions {
    fn confirm(&mut self, question: &str) -> bool {
        ask_yes_no(&mut io::stdin().lock(), &mut io::stdout(), question)
    }

    fn choose_one(&mut self, prompt: &str, options: &[String]) -> Option<usize> {
        ask_index(&mut io::stdin().lock(), &mut io::stdout(), prompt, options)
    }
}

/// Ask until the answer is yes or no. End of input counts as no.
pub fn ask_yes_no(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> bool {
    loop {
        let Some(answer) = read_answer(input, output, &format!("{question} [y/n] ")) else {
            return false;
        };
        match answer.to_lowercase().as_str() {
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => {
                let _ = writeln!(output, "Please answer y or n.");
            }
        }
    }
}

/// Ask for one of `options` by number. A blank line or end of input cancels.
pub fn ask_index(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
    options: &[String],
) -> Option<usize> {
    let _ = writeln!(output, "{prompt}");
    for (index, option) in options.iter().enumerate() {
        let _ = writeln!(output, "  {}. {option}", index + 1);
    }
    loop {
        let answer = read_answer(input, output, "Number (blank to cancel): ")?;
        if answer.is_empty() {
            return None;
        }
        match answer.parse::<usize>() {
            Ok(number) if (1..=options.len()).contains(&number) => return Some(number - 1),
            _ => {
                let _ = writeln!(output, "Pick a number between 1 and {}.", options.len());
            }
        }
    }
}

fn read_answer(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> Option<String> {
    let _ = write!(output, "{prompt}");
    let _ = output.flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_string()),
        Err(err) => {
            warn!("Failed to read answer: {err}");
            None
        }
    }
}
