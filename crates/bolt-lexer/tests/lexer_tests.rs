//! Snapshot-style integration tests over the full lex + layout pipeline.

use bolt_common::token::{Token, TokenKind};

fn dump(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| {
            let kind = match &t.kind {
                TokenKind::Identifier(text) => format!("ident({text})"),
                TokenKind::IdentifierAlt(text) => format!("alt({text})"),
                TokenKind::IntegerLiteral(value) => format!("int({value})"),
                TokenKind::StringLiteral(text) => format!("str({text})"),
                TokenKind::CustomOperator(text) => format!("op({text})"),
                TokenKind::Assignment(text) => format!("assign({text})"),
                TokenKind::LetKeyword => "let".to_string(),
                TokenKind::ReturnKeyword => "return".to_string(),
                TokenKind::MatchKeyword => "match".to_string(),
                TokenKind::Equals => "=".to_string(),
                TokenKind::RArrow => "->".to_string(),
                TokenKind::Dot => "dot".to_string(),
                TokenKind::LParen => "(".to_string(),
                TokenKind::RParen => ")".to_string(),
                TokenKind::Comma => ",".to_string(),
                TokenKind::BlockStart => "block-start".to_string(),
                TokenKind::BlockEnd => "block-end".to_string(),
                TokenKind::LineFoldEnd => "fold-end".to_string(),
                TokenKind::EndOfFile => "eof".to_string(),
                other => format!("{other:?}"),
            };
            format!("{kind}@{}:{}", t.range.start.line, t.range.start.column)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn layout(source: &str) -> String {
    let (tokens, diagnostics) = bolt_lexer::tokenize(source);
    assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
    dump(&tokens)
}

#[test]
fn single_declaration() {
    insta::assert_snapshot!(layout("let a = 1"), @r"
    let@1:1
    ident(a)@1:5
    =@1:7
    int(1)@1:9
    fold-end@1:10
    eof@1:10
    ");
}

#[test]
fn block_body_layout() {
    insta::assert_snapshot!(layout("let f x.\n  return x"), @r"
    let@1:1
    ident(f)@1:5
    ident(x)@1:7
    block-start@1:8
    return@2:3
    ident(x)@2:10
    fold-end@2:11
    block-end@2:11
    fold-end@2:11
    eof@2:11
    ");
}

#[test]
fn inline_match_stays_in_one_fold() {
    insta::assert_snapshot!(layout("let swap p = match p\n  (x, y) -> (y, x)"), @r"
    let@1:1
    ident(swap)@1:5
    ident(p)@1:10
    =@1:12
    match@1:14
    ident(p)@1:20
    (@2:3
    ident(x)@2:4
    ,@2:5
    ident(y)@2:7
    )@2:8
    ->@2:10
    (@2:13
    ident(y)@2:14
    ,@2:15
    ident(x)@2:17
    )@2:18
    fold-end@2:19
    eof@2:19
    ");
}

#[test]
fn every_block_start_has_a_matching_end() {
    let (tokens, _) = bolt_lexer::tokenize(
        "let a.\n  let b.\n    let c = 1\n  let d = 2\nlet e = 3",
    );
    let mut depth = 0i64;
    for token in &tokens {
        match token.kind {
            TokenKind::BlockStart => depth += 1,
            TokenKind::BlockEnd => {
                depth -= 1;
                assert!(depth >= 0, "unbalanced block end");
            }
            _ => {}
        }
    }
    assert_eq!(depth, 0, "unbalanced block start");
}
