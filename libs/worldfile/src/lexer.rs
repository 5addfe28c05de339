//! The world-file tokeniser.

use std::path::Path;

use nom::branch::alt;
use nom::bytes::complete::{take_till, take_while, take_while1};
use nom::character::complete::{char, satisfy};
use nom::combinator::{map, recognize};
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;

use crate::{Error, Result, MAX_INCLUDE_DEPTH};

/// One lexical item of a world file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `# …` to end of line.
    Comment(String),
    /// An identifier: a letter followed by letters, digits or `.-_[]`.
    Word(String),
    /// A number drawn from the characters `+-.0123456789`.
    Num(String),
    /// A double-quoted string (no escapes).
    Str(String),
    /// `(`.
    OpenEntity,
    /// `)`.
    CloseEntity,
    /// `[`.
    OpenTuple,
    /// `]`.
    CloseTuple,
    /// A run of spaces or tabs.
    Space,
    /// A line break.
    Eol,
}

impl Token {
    /// A short printable form for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Comment(_) => "#comment".into(),
            Token::Word(w) => w.clone(),
            Token::Num(n) => n.clone(),
            Token::Str(s) => format!("\"{s}\""),
            Token::OpenEntity => "(".into(),
            Token::CloseEntity => ")".into(),
            Token::OpenTuple => "[".into(),
            Token::CloseTuple => "]".into(),
            Token::Space => "<space>".into(),
            Token::Eol => "<eol>".into(),
        }
    }
}

fn comment(i: &str) -> IResult<&str, Token> {
    map(preceded(char('#'), take_till(|c| c == '\n')), |s: &str| {
        Token::Comment(s.to_owned())
    })(i)
}

fn word(i: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(
            satisfy(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric() || ".-_[]".contains(c)),
        )),
        |s: &str| Token::Word(s.to_owned()),
    )(i)
}

fn num(i: &str) -> IResult<&str, Token> {
    map(
        take_while1(|c: char| "+-.0123456789".contains(c)),
        |s: &str| Token::Num(s.to_owned()),
    )(i)
}

fn string(i: &str) -> IResult<&str, Token> {
    map(
        delimited(
            char('"'),
            take_while(|c: char| c != '"' && c != '\n'),
            char('"'),
        ),
        |s: &str| Token::Str(s.to_owned()),
    )(i)
}

fn space(i: &str) -> IResult<&str, Token> {
    map(take_while1(|c: char| c == ' ' || c == '\t' || c == '\r'), |_| {
        Token::Space
    })(i)
}

fn token(i: &str) -> IResult<&str, Token> {
    alt((
        comment,
        word,
        num,
        string,
        space,
        map(char('\n'), |_| Token::Eol),
        map(char('('), |_| Token::OpenEntity),
        map(char(')'), |_| Token::CloseEntity),
        map(char('['), |_| Token::OpenTuple),
        map(char(']'), |_| Token::CloseTuple),
    ))(i)
}

/// Tokenises world-file text. `include` directives are left in the stream.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        match token(rest) {
            Ok((r, t)) => {
                tokens.push(t);
                rest = r;
            }
            Err(_) => {
                let consumed = input.len() - rest.len();
                let line = input[..consumed].matches('\n').count() + 1;
                let bad = rest.chars().next().unwrap_or('\0');
                return Err(Error::Syntax {
                    line,
                    token: bad.to_string(),
                });
            }
        }
    }
    Ok(tokens)
}

/// Tokenises a file and splices in included files, resolving their paths
/// relative to the including file.
pub(crate) fn tokenize_file(path: &Path, depth: usize) -> Result<Vec<Token>> {
    let input = std::fs::read_to_string(path)?;
    let tokens = tokenize(&input)?;

    let mut out = Vec::with_capacity(tokens.len());
    let mut line = 1usize;
    let mut i = 0usize;
    while i < tokens.len() {
        if let Token::Word(w) = &tokens[i] {
            if w.eq_ignore_ascii_case("include") {
                let mut j = i + 1;
                while matches!(tokens.get(j), Some(Token::Space)) {
                    j += 1;
                }
                let Some(Token::Str(name)) = tokens.get(j) else {
                    return Err(Error::Syntax {
                        line,
                        token: "include".into(),
                    });
                };
                if depth >= MAX_INCLUDE_DEPTH {
                    return Err(Error::IncludeDepth(name.clone()));
                }
                let target = path.parent().unwrap_or(Path::new(".")).join(name);
                out.extend(tokenize_file(&target, depth + 1)?);
                // Terminate the include line.
                out.push(Token::Eol);
                i = j + 1;
                continue;
            }
        }
        if matches!(tokens[i], Token::Eol) {
            line += 1;
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenises_the_full_alphabet() {
        let tokens = tokenize("# hi\nrobot ( pose [1 -2.5 .3] name \"r2\" )\n").unwrap();
        assert!(tokens.contains(&Token::Comment(" hi".into())));
        assert!(tokens.contains(&Token::Word("robot".into())));
        assert!(tokens.contains(&Token::Num("-2.5".into())));
        assert!(tokens.contains(&Token::Num(".3".into())));
        assert!(tokens.contains(&Token::Str("r2".into())));
        assert!(tokens.contains(&Token::OpenTuple));
        assert!(tokens.contains(&Token::CloseTuple));
    }

    #[test]
    fn rejects_stray_characters() {
        match tokenize("a\nb\n%c").unwrap_err() {
            Error::Syntax { line, token } => {
                assert_eq!(line, 3);
                assert_eq!(token, "%");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn words_may_contain_brackets_and_dashes() {
        let tokens = tokenize("global_map[0]-x 1").unwrap();
        assert_eq!(tokens[0], Token::Word("global_map[0]-x".into()));
    }
}
