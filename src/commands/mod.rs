// src/commands/mod.rs
// Command parser: recognizes `/stock=SYMBOL` and `/hello`, rejects
// everything else as ordinary chat content.

/// Tagged variant for slash-command dispatch, rather than a string-typed
/// discriminator at call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stock { code: String },
    Hello,
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.'
}

/// Parses trimmed content. Match is total-string (anchored both ends after
/// trimming) and case-sensitive for the leading keyword. Returns `None` if
/// the content is not a recognized command, in which case the caller should
/// treat it as ordinary chat content.
pub fn parse(content: &str) -> Option<Command> {
    let trimmed = content.trim();

    if trimmed == "/hello" {
        return Some(Command::Hello);
    }

    if let Some(symbol) = trimmed.strip_prefix("/stock=") {
        if !symbol.is_empty()
            && symbol.len() <= 20
            && symbol.chars().all(is_symbol_char)
        {
            return Some(Command::Stock {
                code: symbol.to_uppercase(),
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello() {
        assert_eq!(parse("/hello"), Some(Command::Hello));
        assert_eq!(parse("  /hello  "), Some(Command::Hello));
    }

    #[test]
    fn parses_stock_and_normalizes_case() {
        assert_eq!(
            parse("/stock=aapl.us"),
            Some(Command::Stock {
                code: "AAPL.US".to_string()
            })
        );
        assert_eq!(
            parse("/stock=MSFT"),
            Some(Command::Stock {
                code: "MSFT".to_string()
            })
        );
    }

    #[test]
    fn rejects_overlong_or_invalid_symbol() {
        let too_long = format!("/stock={}", "A".repeat(21));
        assert_eq!(parse(&too_long), None);
        assert_eq!(parse("/stock="), None);
        assert_eq!(parse("/stock=AA PL"), None);
    }

    #[test]
    fn plain_chat_is_not_a_command() {
        assert_eq!(parse("hello there"), None);
        assert_eq!(parse("/Hello"), None); // case-sensitive keyword
        assert_eq!(parse("/stocks=AAPL"), None);
    }
}
