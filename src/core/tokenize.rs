use crate::core::error::JobError;

/// Splits a raw-args template into tokens, honoring single quotes,
/// double quotes and backslash escapes. Quote characters only toggle
/// state and never reach the token text. Backslash escaping stays
/// active inside double quotes (but not inside single quotes), which
/// is what existing raw templates rely on.
pub fn split_command_line(text: &str) -> Result<Vec<String>, JobError> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;

    for ch in text.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if !in_single_quote => escape_next = true,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            ch if ch.is_whitespace() && !in_single_quote && !in_double_quote => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }

    if escape_next {
        return Err(JobError::TrailingEscape);
    }

    if in_single_quote || in_double_quote {
        return Err(JobError::UnclosedQuote);
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}
