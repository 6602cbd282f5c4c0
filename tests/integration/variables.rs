//! Integration tests for the value store
//! Tests arrays, appends, declarations and name references

use pretty_assertions::assert_eq;
use shrun_ast::{
    ArithmExpr, ArrayElem, Assign, CallExpr, Command, DeclClause, File, ParamExp, Stmt, Word,
    WordPart,
};
use shrun_interpreter::{AssocArray, Node, OutStream, RunError, Runner, RunnerConfig, Value};

fn run(stmts: Vec<Stmt>) -> (Runner, String, Result<(), RunError>) {
    let out = OutStream::buffer();
    let mut runner = Runner::new(RunnerConfig {
        env: Some(Vec::new()),
        dir: Some(std::env::temp_dir()),
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

fn assigns(list: Vec<Assign>) -> Stmt {
    Stmt::new(Command::Call(CallExpr {
        assigns: list,
        ..CallExpr::default()
    }))
}

fn declare(opts: &[&str], list: Vec<Assign>) -> Stmt {
    Stmt::new(Command::Decl(DeclClause {
        variant: "declare".to_string(),
        opts: opts.iter().map(|o| Word::lit(o)).collect(),
        assigns: list,
        ..DeclClause::default()
    }))
}

fn indexed(name: &str, index: ArithmExpr, value: &str) -> Assign {
    Assign {
        index: Some(index),
        ..Assign::scalar(name, Word::lit(value))
    }
}

fn elems(items: &[&str]) -> Vec<ArrayElem> {
    items
        .iter()
        .map(|item| ArrayElem {
            index: None,
            value: Word::lit(item),
        })
        .collect()
}

fn echo(parts: Vec<WordPart>) -> Stmt {
    Stmt::new(Command::Call(CallExpr::new(vec![
        Word::lit("echo"),
        Word::dbl_quoted(parts),
    ])))
}

#[test]
fn test_sparse_write_pads_with_empty() {
    let (runner, out, _) = run(vec![
        assigns(vec![indexed("arr", ArithmExpr::lit("2"), "x")]),
        echo(vec![WordPart::ParamExp(Box::new(ParamExp {
            index: Some(ArithmExpr::lit("0")),
            ..ParamExp::braced("arr")
        }))]),
    ]);
    assert_eq!(runner.value("arr"), Some(Value::indexed(["", "", "x"])));
    assert_eq!(out, "\n");
}

#[test]
fn test_scalar_append() {
    let (runner, _, _) = run(vec![
        assigns(vec![Assign::scalar("x", Word::lit("a"))]),
        assigns(vec![Assign {
            append: true,
            ..Assign::scalar("x", Word::lit("b"))
        }]),
    ]);
    assert_eq!(runner.var("x"), Some("ab".to_string()));
}

#[test]
fn test_array_literal_append() {
    let (runner, _, _) = run(vec![
        assigns(vec![Assign::array("list", elems(&["a", "b", "c"]))]),
        assigns(vec![Assign {
            append: true,
            ..Assign::array("list", elems(&["d"]))
        }]),
    ]);
    assert_eq!(runner.value("list"), Some(Value::indexed(["a", "b", "c", "d"])));
}

#[test]
fn test_assoc_keeps_first_seen_order() {
    let (runner, out, _) = run(vec![
        declare(&["-A"], vec![Assign {
            name: "m".to_string(),
            ..Assign::default()
        }]),
        assigns(vec![indexed("m", ArithmExpr::lit("foo"), "1")]),
        assigns(vec![indexed("m", ArithmExpr::lit("bar"), "2")]),
        assigns(vec![indexed("m", ArithmExpr::lit("foo"), "3")]),
        echo(vec![WordPart::ParamExp(Box::new(ParamExp::all_elems("m", false)))]),
    ]);
    assert_eq!(out, "3 2\n");
    let expected: AssocArray = [("foo", "3"), ("bar", "2")].into_iter().collect();
    assert_eq!(runner.value("m"), Some(Value::Assoc(expected)));
}

#[test]
fn test_name_reference_cycle_is_empty() {
    let (_, out, result) = run(vec![
        declare(&["-n"], vec![
            Assign::scalar("a", Word::lit("b")),
            Assign::scalar("b", Word::lit("a")),
        ]),
        echo(vec![WordPart::lit("["), WordPart::param("a"), WordPart::lit("]")]),
    ]);
    assert!(result.is_ok());
    assert_eq!(out, "[]\n");
}

#[test]
fn test_name_reference_writes_through() {
    let (runner, _, _) = run(vec![
        assigns(vec![Assign::scalar("target", Word::lit("old"))]),
        declare(&["-n"], vec![Assign::scalar("ptr", Word::lit("target"))]),
        assigns(vec![Assign::scalar("ptr", Word::lit("new"))]),
    ]);
    assert_eq!(runner.var("target"), Some("new".to_string()));
}

#[test]
fn test_bad_declare_option_is_fatal() {
    let stmt = Stmt {
        pos: shrun_ast::Position::new(4, 1),
        ..declare(&["-x"], vec![Assign::scalar("v", Word::lit("1"))])
    };
    let (_, _, result) = run(vec![stmt]);
    let err = result.unwrap_err();
    assert!(err.to_string().contains("unhandled declare opts: -x"));
}
