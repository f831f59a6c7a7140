use rlox::error::LoxError;
use rlox::scanner::Scanner;
use rlox::token::{Token, TokenType};

fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
    let scanner = Scanner::new(source.as_bytes());
    let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

    assert_eq!(tokens.len(), expected.len());

    for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(actual.token_type, *expected_type);
        assert_eq!(actual.lexeme, *expected_lexeme);
    }
}

#[test]
fn symbols() {
    assert_token_sequence(
        "({*.,+*})",
        &[
            (TokenType::LEFT_PAREN, "("),
            (TokenType::LEFT_BRACE, "{"),
            (TokenType::STAR, "*"),
            (TokenType::DOT, "."),
            (TokenType::COMMA, ","),
            (TokenType::PLUS, "+"),
            (TokenType::STAR, "*"),
            (TokenType::RIGHT_BRACE, "}"),
            (TokenType::RIGHT_PAREN, ")"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn one_and_two_character_operators() {
    assert_token_sequence(
        "! != = == < <= > >= /",
        &[
            (TokenType::BANG, "!"),
            (TokenType::BANG_EQUAL, "!="),
            (TokenType::EQUAL, "="),
            (TokenType::EQUAL_EQUAL, "=="),
            (TokenType::LESS, "<"),
            (TokenType::LESS_EQUAL, "<="),
            (TokenType::GREATER, ">"),
            (TokenType::GREATER_EQUAL, ">="),
            (TokenType::SLASH, "/"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn keywords_including_break() {
    assert_token_sequence(
        "and break class else false fun if nil or print return this true var while",
        &[
            (TokenType::AND, "and"),
            (TokenType::BREAK, "break"),
            (TokenType::CLASS, "class"),
            (TokenType::ELSE, "else"),
            (TokenType::FALSE, "false"),
            (TokenType::FUN, "fun"),
            (TokenType::IF, "if"),
            (TokenType::NIL, "nil"),
            (TokenType::OR, "or"),
            (TokenType::PRINT, "print"),
            (TokenType::RETURN, "return"),
            (TokenType::THIS, "this"),
            (TokenType::TRUE, "true"),
            (TokenType::VAR, "var"),
            (TokenType::WHILE, "while"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn for_and_super_are_plain_identifiers() {
    // this dialect has no for loop and no super expression
    assert_token_sequence(
        "for super",
        &[
            (TokenType::IDENTIFIER, "for"),
            (TokenType::IDENTIFIER, "super"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn number_literals_carry_their_values() {
    let tokens: Vec<Token> = Scanner::new(b"123 3.14")
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    match tokens[0].token_type {
        TokenType::NUMBER(n) => assert_eq!(n, 123.0),
        ref other => panic!("expected NUMBER, got {:?}", other),
    }
    match tokens[1].token_type {
        TokenType::NUMBER(n) => assert_eq!(n, 3.14),
        ref other => panic!("expected NUMBER, got {:?}", other),
    }
}

#[test]
fn string_literal_excludes_quotes_and_tracks_lines() {
    let tokens: Vec<Token> = Scanner::new(b"\"hi\nthere\" x")
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    match tokens[0].token_type {
        TokenType::STRING(ref s) => assert_eq!(s, "hi\nthere"),
        ref other => panic!("expected STRING, got {:?}", other),
    }

    // the multi-line string advanced the line counter
    assert_eq!(tokens[1].lexeme, "x");
    assert_eq!(tokens[1].line, 2);
}

#[test]
fn comments_and_whitespace_are_skipped() {
    assert_token_sequence(
        "var x; // a comment\n// whole line\nprint x;",
        &[
            (TokenType::VAR, "var"),
            (TokenType::IDENTIFIER, "x"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::PRINT, "print"),
            (TokenType::IDENTIFIER, "x"),
            (TokenType::SEMICOLON, ";"),
            (TokenType::EOF, ""),
        ],
    );
}

#[test]
fn unexpected_characters_are_reported_without_stopping() {
    let results: Vec<Result<Token, LoxError>> = Scanner::new(b",.$(#").collect();

    // 3 valid tokens, 2 errors, 1 EOF
    assert_eq!(results.len(), 6);

    let error_count = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(error_count, 2);

    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            err.to_string().contains("Unexpected character"),
            "unexpected message: {}",
            err
        );
    }

    assert!(matches!(
        results.last().unwrap().as_ref().unwrap().token_type,
        TokenType::EOF
    ));
}

#[test]
fn invalid_utf8_in_a_string_is_an_error() {
    let results: Vec<Result<Token, LoxError>> = Scanner::new(b"print \"a\xffb\";").collect();

    let err = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("expected a lex error");

    assert!(err.to_string().contains("Invalid UTF-8 in string."));

    // no STRING token with mangled contents sneaks through
    assert!(!results.iter().any(|r| matches!(
        r,
        Ok(Token {
            token_type: TokenType::STRING(_),
            ..
        })
    )));
}

#[test]
fn unterminated_string_is_an_error() {
    let results: Vec<Result<Token, LoxError>> = Scanner::new(b"\"oops").collect();

    let err = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("expected a lex error");

    assert!(err.to_string().contains("Unterminated string"));
}
