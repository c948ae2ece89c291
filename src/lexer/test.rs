use super::*;
use logos::Logos;
use pretty_assertions::assert_eq;

fn texts(input: &str) -> Vec<&str> {
    tokenize(input)
        .expect("tokenize")
        .into_iter()
        .map(|l| l.text)
        .collect()
}

#[test]
fn test_basic_tokens() {
    let mut lexer = Token::lexer("x := 3 + foo: #bar. ^self");

    assert_eq!(lexer.next(), Some(Ok(Token::Identifier)));
    assert_eq!(lexer.next(), Some(Ok(Token::Assign)));
    assert_eq!(lexer.next(), Some(Ok(Token::Number)));
    assert_eq!(lexer.next(), Some(Ok(Token::Operator)));
    assert_eq!(lexer.next(), Some(Ok(Token::Keyword)));
    assert_eq!(lexer.next(), Some(Ok(Token::Hash(HashForm::Symbol))));
    assert_eq!(lexer.next(), Some(Ok(Token::Period)));
    assert_eq!(lexer.next(), Some(Ok(Token::Caret)));
    assert_eq!(lexer.next(), Some(Ok(Token::Identifier)));
    assert_eq!(lexer.next(), None);
}

#[test]
fn test_comments_are_dropped() {
    assert_eq!(
        texts("a \"a comment with \"\"quotes\"\"\" b"),
        vec!["a", "b"]
    );
}

#[test]
fn test_number_shapes() {
    assert_eq!(texts("16r1F 1.5e10 2r11e28 1e-300"), vec!["16r1F", "1.5e10", "2r11e28", "1e-300"]);
    // a period ending a statement is not a fraction
    assert_eq!(texts("x := 3."), vec!["x", ":=", "3", "."]);
    assert_eq!(texts("3 exp"), vec!["3", "exp"]);
}

#[test]
fn test_symbol_forms() {
    assert_eq!(texts("#foo:bar: #+ #( 1 )"), vec!["#foo:bar:", "#", "+", "#", "(", "1", ")"]);
    assert_eq!(texts("#\n 'a b'"), vec!["#\n 'a b'"]);
    assert_eq!(texts("#:x:y"), vec!["#:x:y"]);
}

#[test]
fn test_strings_and_characters() {
    assert_eq!(texts("'it''s' $' $$"), vec!["'it''s'", "$'", "$$"]);
    assert_eq!(texts("$\n"), vec!["$\n"]);
}

#[test]
fn test_operators_and_punctuation() {
    assert_eq!(
        texts("a <= b. [:x | x] {1. 2}"),
        vec!["a", "<=", "b", ".", "[", ":", "x", "|", "x", "]", "{", "1", ".", "2", "}"]
    );
}

#[test]
fn test_error_position() {
    let err = tokenize("foo\n  bar \u{00a7} baz").unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.column, 7);
    assert!(err.message.contains("baz"));
}
