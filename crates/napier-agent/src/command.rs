//! Classification of raw user input.

/// Prefix marking a control directive.
pub const DIRECTIVE_PREFIX: char = '/';

/// What a line of user input turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    /// `/name arg1 arg2 ...`. The name is lowercased; arguments keep their case.
    Directive { name: String, args: Vec<String> },
    /// Anything else, exactly as typed.
    Text(String),
}

impl ParsedInput {
    pub fn is_directive(&self) -> bool {
        matches!(self, Self::Directive { .. })
    }
}

/// Classify `input`. Directive names are not validated here.
pub fn parse_input(input: &str) -> ParsedInput {
    let Some(rest) = input.trim().strip_prefix(DIRECTIVE_PREFIX) else {
        return ParsedInput::Text(input.to_string());
    };

    let mut tokens = rest.split_whitespace();
    let name = tokens.next().unwrap_or_default().to_lowercase();
    let args = tokens.map(str::to_string).collect();
    ParsedInput::Directive { name, args }
}
