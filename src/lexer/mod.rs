use logos::Logos;

use crate::ast::Span;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip(r"--[^\n]*", allow_greedy = true))]
pub enum Token {
    #[token("define")]
    Define,
    #[token("end")]
    End,

    #[token("True")]
    True,
    #[token("False")]
    False,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"'[^']'", |lex| lex.slice().chars().nth(1))]
    Char(char),

    // Operator words and macro names: anything but whitespace, digits,
    // brackets and quotes.
    #[regex(r"[^\s0-9{}\[\]']+", |lex| lex.slice().to_string())]
    Word(String),
}

/// Lex source code into tokens with their byte spans.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, Span::from(lexer.span()))),
            Err(()) => {
                let span = lexer.span();
                let snippet = source[span.clone()].to_string();
                return Err(LexError {
                    position: span.start,
                    suggestion: suggest_fix(&snippet),
                    snippet,
                });
            }
        }
    }

    tracing::debug!(tokens = tokens.len(), "lexed");
    Ok(tokens)
}

fn suggest_fix(bad_token: &str) -> String {
    if bad_token.starts_with('\'') {
        "Character literals hold exactly one character: 'a'".to_string()
    } else if bad_token.chars().all(|c| c.is_ascii_digit()) {
        format!("Integer literal is out of range (max {})", i64::MAX)
    } else {
        format!("Unexpected character(s): '{bad_token}'")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Lex error at position {position}: '{snippet}'. {suggestion}")]
pub struct LexError {
    pub position: usize,
    pub snippet: String,
    pub suggestion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        lex(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn lex_arithmetic() {
        assert_eq!(
            kinds("1 2 + print"),
            vec![
                Token::Int(1),
                Token::Int(2),
                Token::Word("+".into()),
                Token::Word("print".into()),
            ]
        );
    }

    #[test]
    fn lex_quotations_lists_and_literals() {
        assert_eq!(
            kinds("{True 'a'} [False]"),
            vec![
                Token::LBrace,
                Token::True,
                Token::Char('a'),
                Token::RBrace,
                Token::LBracket,
                Token::False,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn brackets_split_words() {
        assert_eq!(
            kinds("{.}~"),
            vec![
                Token::LBrace,
                Token::Word(".".into()),
                Token::RBrace,
                Token::Word("~".into()),
            ]
        );
    }

    #[test]
    fn keywords_and_longer_words() {
        assert_eq!(
            kinds("define defined end <= <:"),
            vec![
                Token::Define,
                Token::Word("defined".into()),
                Token::End,
                Token::Word("<=".into()),
                Token::Word("<:".into()),
            ]
        );
    }

    #[test]
    fn digits_end_a_word() {
        assert_eq!(kinds("x1"), vec![Token::Word("x".into()), Token::Int(1)]);
    }

    #[test]
    fn comments_and_newlines_are_skipped() {
        assert_eq!(
            kinds("1 -- push one\n2 -- and two"),
            vec![Token::Int(1), Token::Int(2)]
        );
    }

    #[test]
    fn comment_runs_to_end_of_line_whatever_it_holds() {
        assert_eq!(
            kinds("1 -- {[ 'x' ]} + print\n2 --"),
            vec![Token::Int(1), Token::Int(2)]
        );
        assert_eq!(kinds("-- nothing else"), vec![]);
    }

    #[test]
    fn minus_is_still_a_word() {
        assert_eq!(
            kinds("3 1 - type?"),
            vec![
                Token::Int(3),
                Token::Int(1),
                Token::Word("-".into()),
                Token::Word("type?".into()),
            ]
        );
    }

    #[test]
    fn spans_point_at_source() {
        let tokens = lex("  print").unwrap();
        assert_eq!(tokens[0].1, Span::new(2, 7));
    }

    #[test]
    fn unicode_char_literal() {
        assert_eq!(kinds("'λ'"), vec![Token::Char('λ')]);
    }

    #[test]
    fn stray_quote_is_an_error() {
        let err = lex("1 'ab' print").unwrap_err();
        assert_eq!(err.position, 2);
        assert!(err.suggestion.contains("exactly one character"));
    }

    #[test]
    fn oversized_int_is_an_error() {
        let err = lex("99999999999999999999").unwrap_err();
        assert!(err.suggestion.contains("out of range"), "{}", err.suggestion);
    }
}
