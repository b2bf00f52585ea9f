//! The `bolt` command-line driver.
//!
//! Wires the pipeline together per input file: read, lex + punctuate,
//! parse, wire parents, build scopes, type-check. Diagnostics are
//! buffered and sorted by position before rendering unless
//! `--direct-diagnostics` asks for immediate output. `verify` checks
//! `@:` type assertions and consumes diagnostics announced with
//! `@expect_diagnostic(N)`; `eval` runs the program after a clean check.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rustc_hash::FxHashMap;

use bolt_common::diagnostics::{
    codes, render_diagnostic, Diagnostic, DiagnosticStore, Severity,
};
use bolt_common::text::TextFile;
use bolt_parser::cst::{AnnotationKind, LitValue, NodeKind};
use bolt_typeck::TypeckResult;

#[derive(Parser)]
#[command(name = "bolt", about = "The Bolt programming language", version)]
struct Cli {
    /// Print diagnostics immediately instead of buffering and sorting.
    #[arg(long, global = true)]
    direct_diagnostics: bool,

    /// Enable the annotation syntax used by `verify`.
    #[arg(long, global = true)]
    additional_syntax: bool,

    /// Emit diagnostics as JSON on standard output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and type-check sources, reporting diagnostics.
    Check { files: Vec<PathBuf> },
    /// Like `check`, but also validate `@:` annotations and honor
    /// `@expect_diagnostic(N)`.
    Verify { files: Vec<PathBuf> },
    /// Evaluate sources after a successful check.
    Eval { files: Vec<PathBuf> },
}

struct CheckedFile {
    file: TextFile,
    parse: bolt_parser::Parse,
    diagnostics: Vec<Diagnostic>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (files, is_verify, is_eval) = match &cli.command {
        Command::Check { files } => (files.clone(), false, false),
        Command::Verify { files } => (files.clone(), true, false),
        Command::Eval { files } => (files.clone(), false, true),
    };
    let additional_syntax = cli.additional_syntax || is_verify;
    let direct = cli.direct_diagnostics && !is_verify;
    let color = std::io::stderr().is_terminal();

    let mut checked = Vec::new();
    let mut had_error = false;

    for path in &files {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) => {
                eprintln!("error: cannot read {}: {error}", path.display());
                return ExitCode::FAILURE;
            }
        };
        let file = TextFile::new(path.display().to_string(), text);
        let parse = bolt_parser::parse(file.text(), additional_syntax);
        let scopes = parse.scopes();
        let typeck = bolt_typeck::check(&parse, &scopes);

        let mut diagnostics = parse.diagnostics.clone();
        diagnostics.extend(typeck.diagnostics.clone());

        if is_verify {
            diagnostics.extend(verify_type_asserts(&parse, &typeck));
            diagnostics = consume_expected(&parse, diagnostics);
        }

        if direct {
            for diagnostic in &diagnostics {
                had_error |= diagnostic.severity == Severity::Error;
                eprint!("{}", render_diagnostic(diagnostic, &file, color));
            }
        }

        checked.push(CheckedFile {
            file,
            parse,
            diagnostics,
        });
    }

    if !direct {
        for entry in &mut checked {
            let mut store = DiagnosticStore::new();
            for diagnostic in entry.diagnostics.drain(..) {
                store.add(diagnostic);
            }
            store.sort();
            had_error |= store.has_error();
            entry.diagnostics = store.take();
            if cli.json {
                for diagnostic in &entry.diagnostics {
                    println!(
                        "{}",
                        serde_json::to_string(diagnostic)
                            .expect("diagnostics serialize cleanly")
                    );
                }
            } else {
                for diagnostic in &entry.diagnostics {
                    eprint!("{}", render_diagnostic(diagnostic, &entry.file, color));
                }
            }
        }
    }

    if had_error {
        return ExitCode::FAILURE;
    }

    if is_eval {
        let env = bolt_eval::global_env();
        for entry in &checked {
            let evaluator = bolt_eval::Evaluator::new(&entry.parse.module);
            if let Err(error) = evaluator.evaluate(&env) {
                eprintln!(
                    "{}:{}: runtime error: {}",
                    entry.file.path(),
                    error.range.start,
                    error
                );
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// Check every `@: T` annotation: the annotated expression's solved type
/// must equal the annotated type expression's solved type.
fn verify_type_asserts(parse: &bolt_parser::Parse, typeck: &TypeckResult) -> Vec<Diagnostic> {
    let module = &parse.module;
    let mut out = Vec::new();
    for id in module.node_ids() {
        for annotation in module.annotations(id) {
            let AnnotationKind::TypeAssert(te) = annotation.kind else {
                continue;
            };
            let (Some(inferred), Some(asserted)) = (typeck.type_of(id), typeck.type_of(te))
            else {
                continue;
            };
            if inferred != asserted {
                out.push(
                    Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        format!(
                            "type assertion failed: inferred {}, asserted {}",
                            typeck.display(inferred),
                            typeck.display(asserted)
                        ),
                    )
                    .with_range(annotation.range)
                    .with_label(annotation.range, "asserted here"),
                );
            }
        }
    }
    out
}

/// Drop one diagnostic per `@expect_diagnostic(N)` annotation whose code
/// is `N` and whose position is on the annotated statement's line.
fn consume_expected(parse: &bolt_parser::Parse, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let module = &parse.module;
    let mut expected: FxHashMap<(u64, u32), usize> = FxHashMap::default();
    for id in module.node_ids() {
        for annotation in module.annotations(id) {
            let AnnotationKind::Expr(expr) = annotation.kind else {
                continue;
            };
            let NodeKind::CallExpr { callee, args } = module.kind(expr) else {
                continue;
            };
            let NodeKind::ReferenceExpr { name, .. } = module.kind(*callee) else {
                continue;
            };
            if name.text != "expect_diagnostic" {
                continue;
            }
            let Some(&arg) = args.first() else { continue };
            let mut arg = arg;
            while let NodeKind::NestedExpr { inner } = module.kind(arg) {
                arg = *inner;
            }
            let NodeKind::LiteralExpr {
                value: LitValue::Int(code),
            } = module.kind(arg)
            else {
                continue;
            };
            let line = module.range(id).start.line;
            *expected.entry((line, *code as u32)).or_insert(0) += 1;
        }
    }

    diagnostics
        .into_iter()
        .filter(|diagnostic| {
            let Some(line) = diagnostic.line() else {
                return true;
            };
            match expected.get_mut(&(line, diagnostic.code)) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    false
                }
                _ => true,
            }
        })
        .collect()
}
