//! Integration tests for word expansion
//! Tests field splitting, quoting, globbing and command substitution

use pretty_assertions::assert_eq;
use shrun_ast::{
    Assign, CallExpr, CaseArm, CaseClause, Command, File, ParExpOp, ParamExp, Stmt, Word,
    WordPart,
};
use shrun_interpreter::{Node, OutStream, RunError, Runner, RunnerConfig};
use std::path::Path;

fn run_in(dir: &Path, stmts: Vec<Stmt>) -> (Runner, String, Result<(), RunError>) {
    let out = OutStream::buffer();
    let mut runner = Runner::new(RunnerConfig {
        env: Some(Vec::new()),
        dir: Some(dir.to_path_buf()),
        stdout: Some(out.clone()),
        stderr: Some(out.clone()),
        ..RunnerConfig::default()
    })
    .unwrap();
    let file = File {
        name: String::new(),
        stmts,
    };
    let result = runner.run(Node::File(&file));
    (runner, out.contents(), result)
}

fn run(stmts: Vec<Stmt>) -> (Runner, String, Result<(), RunError>) {
    run_in(&std::env::temp_dir(), stmts)
}

fn call(args: Vec<Word>) -> Stmt {
    Stmt::new(Command::Call(CallExpr::new(args)))
}

fn set(name: &str, value: Word) -> Stmt {
    Stmt::new(Command::Call(CallExpr {
        assigns: vec![Assign::scalar(name, value)],
        ..CallExpr::default()
    }))
}

/// `printf '[%s]\n' words...` shows exactly which fields a word produced
fn show_fields(words: Vec<Word>) -> Stmt {
    let mut args = vec![Word::lit("printf"), Word::lit("[%s]\\n")];
    args.extend(words);
    call(args)
}

fn param(pe: ParamExp) -> WordPart {
    WordPart::ParamExp(Box::new(pe))
}

#[test]
fn test_empty_double_quotes_make_one_field() {
    let (_, out, _) = run(vec![show_fields(vec![
        Word::lit("a"),
        Word::dbl_quoted(Vec::new()),
        Word::lit("b"),
    ])]);
    assert_eq!(out, "[a]\n[]\n[b]\n");
}

#[test]
fn test_unquoted_expansion_splits() {
    let (_, out, _) = run(vec![
        set("v", Word::lit("  one   two ")),
        show_fields(vec![Word::new(vec![WordPart::param("v")])]),
        show_fields(vec![Word::dbl_quoted(vec![WordPart::param("v")])]),
    ]);
    assert_eq!(out, "[one]\n[two]\n[  one   two ]\n");
}

#[test]
fn test_unset_unquoted_gives_no_field() {
    let (_, out, _) = run(vec![show_fields(vec![
        Word::lit("x"),
        Word::new(vec![WordPart::param("nothing")]),
    ])]);
    assert_eq!(out, "[x]\n");
}

#[test]
fn test_glob_matches_and_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.txt"), "").unwrap();
    std::fs::write(dir.path().join("a.txt"), "").unwrap();
    std::fs::write(dir.path().join(".hidden.txt"), "").unwrap();
    let (_, out, _) = run_in(
        dir.path(),
        vec![
            show_fields(vec![Word::lit("*.txt")]),
            show_fields(vec![Word::lit("*.none")]),
            show_fields(vec![Word::dbl_quoted(vec![WordPart::lit("*.txt")])]),
        ],
    );
    assert_eq!(out, "[a.txt]\n[b.txt]\n[*.none]\n[*.txt]\n");
}

#[test]
fn test_command_substitution() {
    let subst = WordPart::CmdSubst {
        stmts: vec![
            set("inner", Word::lit("changed")),
            Stmt::call(&["echo", "captured"]),
            Stmt::call(&["echo"]),
        ],
    };
    let (runner, out, _) = run(vec![show_fields(vec![Word::new(vec![
        WordPart::lit("<"),
        subst,
        WordPart::lit(">"),
    ])])]);
    assert_eq!(out, "[<captured>]\n");
    assert_eq!(runner.var("inner"), None);
}

#[test]
fn test_default_and_required_values() {
    let default = ParamExp {
        exp: Some(shrun_ast::Expansion {
            op: ParExpOp::DefaultUnsetOrNull,
            word: Word::lit("fallback"),
        }),
        ..ParamExp::braced("missing")
    };
    let required = ParamExp {
        exp: Some(shrun_ast::Expansion {
            op: ParExpOp::ErrorUnsetOrNull,
            word: Word::lit("must be set"),
        }),
        ..ParamExp::braced("missing")
    };
    let (_, out, result) = run(vec![
        call(vec![Word::lit("echo"), Word::new(vec![param(default)])]),
        call(vec![Word::lit("echo"), Word::new(vec![param(required)])]),
        Stmt::call(&["echo", "unreached"]),
    ]);
    assert_eq!(out, "fallback\nmissing: must be set\n");
    assert!(matches!(result, Err(RunError::Exit(1))));
}

#[test]
fn test_case_first_match_wins() {
    let case = Stmt::new(Command::Case(CaseClause {
        word: Word::lit("main.rs"),
        arms: vec![
            CaseArm {
                patterns: vec![Word::lit("*.py"), Word::lit("*.rs")],
                stmts: vec![Stmt::call(&["echo", "source"])],
            },
            CaseArm {
                patterns: vec![Word::lit("main.*")],
                stmts: vec![Stmt::call(&["echo", "main"])],
            },
        ],
    }));
    let quoted = Stmt::new(Command::Case(CaseClause {
        word: Word::lit("x"),
        arms: vec![
            CaseArm {
                patterns: vec![Word::dbl_quoted(vec![WordPart::lit("*")])],
                stmts: vec![Stmt::call(&["echo", "star"])],
            },
            CaseArm {
                patterns: vec![Word::lit("*")],
                stmts: vec![Stmt::call(&["echo", "any"])],
            },
        ],
    }));
    let (_, out, _) = run(vec![case, quoted]);
    assert_eq!(out, "source\nany\n");
}
