//! Line-oriented prompts for `interactive`.
//!
//! Readers and writers are generic so the prompts can be driven from tests.
//! `None` means the input ended (EOF, e.g. Ctrl-D).

use std::io::{self, BufRead, Write};

/// Print `prompt` and read one trimmed line.
pub fn prompt_line<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Yes/no question. An empty answer takes `default`; without a default the
/// question is repeated.
pub fn prompt_confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    default: Option<bool>,
) -> io::Result<Option<bool>> {
    let hint = match default {
        Some(true) => "(Y/n)",
        Some(false) | None => "(y/N)",
    };
    loop {
        let Some(answer) = prompt_line(input, output, &format!("{} {}: ", prompt, hint))? else {
            return Ok(None);
        };
        match answer.to_uppercase().as_str() {
            "Y" | "YES" => return Ok(Some(true)),
            "N" | "NO" => return Ok(Some(false)),
            "" => {
                if let Some(default) = default {
                    return Ok(Some(default));
                }
            }
            _ => {}
        }
    }
}

/// Pick a 1-based entry out of `count`. `q` (or EOF) yields `None`; bad input
/// is reported and asked again.
pub fn prompt_choice<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    count: usize,
) -> io::Result<Option<usize>> {
    loop {
        let Some(answer) = prompt_line(input, output, prompt)? else {
            return Ok(None);
        };
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => return Ok(Some(n - 1)),
            _ => writeln!(output, "Enter a number between 1 and {}, or q to quit.", count)?,
        }
    }
}
