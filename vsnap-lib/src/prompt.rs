//! Interactive questions asked on the terminal.
//!
//! Readers and writers are generic so the prompts can be driven from byte
//! buffers in tests.

use std::io::{self, BufRead, Write};

use crate::filter::DEFAULT_AGE_DAYS;

pub const CONFIRM_PROMPT: &str = "Proceed with deleting old snapshots? (y/n): ";
pub const AGE_PROMPT: &str =
    "Enter the age (in days) of snapshots to remove (default: 30, 'q' to quit): ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeAnswer {
    Days(u32),
    Quit,
}

/// Read one line; `None` at end of input.
fn read_answer<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Ask once. Only `y` or `yes` (any case) counts as consent.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<bool> {
    write!(output, "{CONFIRM_PROMPT}")?;
    output.flush()?;
    let answer = read_answer(input)?.unwrap_or_default().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Ask until a positive number of days, an empty answer (the default) or `q`.
///
/// End of input is treated as `q`.
pub fn ask_age<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<AgeAnswer> {
    loop {
        write!(output, "{AGE_PROMPT}")?;
        output.flush()?;
        let Some(answer) = read_answer(input)? else {
            return Ok(AgeAnswer::Quit);
        };

        if answer.is_empty() {
            return Ok(AgeAnswer::Days(DEFAULT_AGE_DAYS));
        }
        if answer.eq_ignore_ascii_case("q") {
            return Ok(AgeAnswer::Quit);
        }
        match answer.parse::<i64>() {
            Ok(days) if days > 0 => match u32::try_from(days) {
                Ok(days) => return Ok(AgeAnswer::Days(days)),
                Err(_) => writeln!(output, "Invalid input. Please enter a number or 'q' to quit.")?,
            },
            Ok(_) => writeln!(output, "Please enter a positive number.")?,
            Err(_) => writeln!(output, "Invalid input. Please enter a number or 'q' to quit.")?,
        }
    }
}
