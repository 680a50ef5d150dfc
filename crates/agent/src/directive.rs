//! Session directives typed at the prompt

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `exit`, `quit`, `q` or an empty line
    Exit,
    /// `clear`
    Clear,
    /// `show prompt`
    ShowPrompt,
    /// `set prompt` or `change prompt`; the next line is the new prompt
    SetPrompt,
    /// Anything else, passed to the endpoint as a user turn
    Message(String),
}

/// Classify a line. Reserved words are matched case-insensitively with
/// surrounding and repeated inner whitespace ignored.
pub fn parse_directive(line: &str) -> Directive {
    let trimmed = line.trim();
    let normalized = trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match normalized.as_str() {
        "" | "exit" | "quit" | "q" => Directive::Exit,
        "clear" => Directive::Clear,
        "show prompt" => Directive::ShowPrompt,
        "set prompt" | "change prompt" => Directive::SetPrompt,
        _ => Directive::Message(trimmed.to_string()),
    }
}
