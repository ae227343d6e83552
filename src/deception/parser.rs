//! Shell-like command line parsing: redirect split, pipeline split, tokenizing.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnterminatedQuote,
    MissingRedirectTarget,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnterminatedQuote => write!(f, "No closing quotation"),
            ParseError::MissingRedirectTarget => {
                write!(f, "syntax error near unexpected token `newline'")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// One command of a pipeline after tokenizing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub name: String,
    /// Every token after the name, flags included, in order.
    pub args: Vec<String>,
    /// Tokens that are not flag bundles.
    pub operands: Vec<String>,
    flags: BTreeSet<char>,
    long_flags: Vec<String>,
}

impl Invocation {
    pub fn from_tokens(tokens: Vec<String>) -> Option<Self> {
        let mut iter = tokens.into_iter();
        let name = iter.next()?;
        let mut invocation = Invocation {
            name,
            ..Default::default()
        };
        for arg in iter {
            if let Some(long) = arg.strip_prefix("--").filter(|l| !l.is_empty()) {
                invocation.long_flags.push(long.to_string());
            } else if arg.len() > 1 && arg.starts_with('-') {
                invocation.flags.extend(arg[1..].chars());
            } else {
                invocation.operands.push(arg.clone());
            }
            invocation.args.push(arg);
        }
        Some(invocation)
    }

    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(&flag)
    }

    pub fn has_long_flag(&self, flag: &str) -> bool {
        self.long_flags.iter().any(|f| f == flag)
    }

    /// Value following an option such as `-n 5` or `-o out.bin`.
    pub fn option_value(&self, option: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == option)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Trimmed source text of the stage, used by `sudo` to re-run its tail.
    pub raw: String,
    pub invocation: Invocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub stages: Vec<Stage>,
    pub redirect: Option<String>,
}

pub fn parse(line: &str) -> Result<CommandLine, ParseError> {
    let (command, target) = match unquoted_positions(line, '>').first() {
        Some(&pos) => (&line[..pos], Some(&line[pos + 1..])),
        None => (line, None),
    };

    let redirect = match target {
        Some(target) => {
            // `>>` lands here too and is handled as a plain overwrite.
            let target = target.strip_prefix('>').unwrap_or(target);
            let first = tokenize(target)?.into_iter().next();
            Some(first.ok_or(ParseError::MissingRedirectTarget)?)
        }
        None => None,
    };

    let mut stages = Vec::new();
    let mut start = 0;
    let mut bounds = unquoted_positions(command, '|');
    bounds.push(command.len());
    for end in bounds {
        let raw = command[start..end].trim();
        start = end + 1;
        if let Some(invocation) = Invocation::from_tokens(tokenize(raw)?) {
            stages.push(Stage {
                raw: raw.to_string(),
                invocation,
            });
        }
    }

    Ok(CommandLine { stages, redirect })
}

/// Byte offsets of `target` outside quotes and not escaped.
fn unquoted_positions(input: &str, target: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c == target && !in_single && !in_double => positions.push(i),
            _ => {}
        }
    }
    positions
}

pub fn tokenize(input: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(ParseError::UnterminatedQuote),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(ParseError::UnterminatedQuote),
                    }
                }
            }
            '\\' => {
                in_token = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_quotes_and_escapes() {
        assert_eq!(
            tokenize(r#"echo 'a b' "c \"d\"" e\ f"#).unwrap(),
            vec!["echo", "a b", "c \"d\"", "e f"]
        );
        assert_eq!(tokenize("echo ''").unwrap(), vec!["echo", ""]);
        assert_eq!(tokenize("echo 'open"), Err(ParseError::UnterminatedQuote));
    }

    #[test]
    fn test_flags_and_operands() {
        let inv = Invocation::from_tokens(tokenize("ls -la --color /tmp -").unwrap()).unwrap();
        assert_eq!(inv.name, "ls");
        assert!(inv.has_flag('l'));
        assert!(inv.has_flag('a'));
        assert!(inv.has_long_flag("color"));
        assert_eq!(inv.operands, vec!["/tmp", "-"]);
    }

    #[test]
    fn test_pipeline_and_redirect() {
        let line = parse("cat /etc/passwd | grep root > 'out file.txt'").unwrap();
        assert_eq!(line.stages.len(), 2);
        assert_eq!(line.stages[1].invocation.name, "grep");
        assert_eq!(line.redirect.as_deref(), Some("out file.txt"));
    }

    #[test]
    fn test_quoted_operators_are_literal() {
        let line = parse("echo 'a|b>c'").unwrap();
        assert_eq!(line.stages.len(), 1);
        assert_eq!(line.redirect, None);
        assert_eq!(line.stages[0].invocation.operands, vec!["a|b>c"]);
    }

    #[test]
    fn test_empty_stages_skipped() {
        let line = parse("| ls ||").unwrap();
        assert_eq!(line.stages.len(), 1);
        assert_eq!(line.stages[0].raw, "ls");
    }

    #[test]
    fn test_redirect_target_required() {
        assert_eq!(parse("echo hi >"), Err(ParseError::MissingRedirectTarget));
        assert_eq!(parse("echo hi >> log").unwrap().redirect.as_deref(), Some("log"));
    }
}
