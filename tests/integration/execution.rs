//! Integration tests for the execution engine
//! Tests control flow, pipelines, subshells and the dispatch hooks

use pretty_assertions::assert_eq;
use shrun_ast::{
    ArithmExpr, BinCmdOp, BinaryCmd, CallExpr, Command, File, ForClause, IfClause, Loop, Stmt,
    WhileClause, Word, WordPart,
};
use shrun_interpreter::{
    CancelToken, ExecError, HookContext, Node, OutStream, RunError, Runner, RunnerConfig,
};
use std::sync::{Arc, Mutex};

fn run_with(config: RunnerConfig, stmts: Vec<Stmt>) -> (Runner, Result<(), RunError>) {
    let mut runner = Runner::new(config).unwrap();
    let file = File {
        name: "test.sh".to_string(),
        stmts,
    };
    let result = runner.run(Node::File(&file));
    (runner, result)
}

fn run(stmts: Vec<Stmt>) -> (Runner, String, Result<(), RunError>) {
    let out = OutStream::buffer();
    let config = RunnerConfig {
        env: Some(Vec::new()),
        dir: Some(std::env::temp_dir()),
        stdout: Some(out.clone()),
        stderr: Some(out.clone()),
        ..RunnerConfig::default()
    };
    let (runner, result) = run_with(config, stmts);
    (runner, out.contents(), result)
}

fn echo_var(name: &str) -> Stmt {
    Stmt::new(Command::Call(CallExpr::new(vec![
        Word::lit("echo"),
        Word::new(vec![WordPart::param(name)]),
    ])))
}

fn binary(op: BinCmdOp, x: Stmt, y: Stmt) -> Stmt {
    Stmt::new(Command::Binary(BinaryCmd {
        op,
        x: Box::new(x),
        y: Box::new(y),
    }))
}

fn for_each(name: &str, items: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::new(Command::For(ForClause {
        loop_kind: Loop::WordIter {
            name: name.to_string(),
            items: Some(items.iter().map(|i| Word::lit(i)).collect()),
        },
        body,
    }))
}

#[test]
fn test_break_two_leaves_both_loops() {
    let inner = for_each(
        "j",
        &["1", "2"],
        vec![
            echo_var("i"),
            Stmt::call(&["break", "2"]),
            Stmt::call(&["echo", "after break"]),
        ],
    );
    let outer = for_each("i", &["a", "b"], vec![inner, Stmt::call(&["echo", "outer tail"])]);
    let (_, out, result) = run(vec![outer, Stmt::call(&["echo", "done"])]);
    assert!(result.is_ok());
    assert_eq!(out, "a\ndone\n");
}

#[test]
fn test_continue_two_skips_to_outer_iteration() {
    let inner = for_each(
        "j",
        &["1", "2"],
        vec![echo_var("j"), Stmt::call(&["continue", "2"])],
    );
    let outer = for_each("i", &["a", "b"], vec![inner, Stmt::call(&["echo", "unreached"])]);
    let (_, out, _) = run(vec![outer]);
    assert_eq!(out, "1\n1\n");
}

#[test]
fn test_pipeline_exit_is_right_side() {
    let (runner, _, result) = run(vec![binary(
        BinCmdOp::Pipe,
        Stmt::call(&["false"]),
        Stmt::call(&["true"]),
    )]);
    assert!(result.is_ok());
    assert_eq!(runner.exit_code(), 0);
}

#[test]
fn test_pipeline_carries_data() {
    let (_, out, _) = run(vec![binary(
        BinCmdOp::Pipe,
        Stmt::call(&["echo", "through", "the", "pipe"]),
        Stmt::new(Command::Block {
            stmts: vec![Stmt::call(&["read", "first", "rest"]), echo_var("rest")],
        }),
    )]);
    assert_eq!(out, "the pipe\n");
}

#[test]
fn test_pipeline_right_side_keeps_variables() {
    let (runner, _, _) = run(vec![binary(
        BinCmdOp::Pipe,
        Stmt::call(&["echo", "value"]),
        Stmt::call(&["read", "got"]),
    )]);
    assert_eq!(runner.var("got"), Some("value".to_string()));
}

#[test]
fn test_subshell_isolation() {
    let assign = Stmt::new(Command::Call(CallExpr {
        assigns: vec![shrun_ast::Assign::scalar("x", Word::lit("inner"))],
        ..CallExpr::default()
    }));
    let subshell = Stmt::new(Command::Subshell {
        stmts: vec![assign, Stmt::call(&["exit", "3"])],
    });
    let (runner, out, result) = run(vec![subshell, echo_var("?")]);
    assert!(result.is_ok());
    assert_eq!(out, "3\n");
    assert_eq!(runner.var("x"), None);
}

#[test]
fn test_if_else_and_while() {
    let if_stmt = Stmt::new(Command::If(IfClause {
        cond: vec![Stmt::call(&["false"])],
        then_stmts: vec![Stmt::call(&["echo", "then"])],
        else_stmts: vec![Stmt::call(&["echo", "else"])],
    }));
    let counter = Stmt::new(Command::Arithm {
        expr: ArithmExpr::Unary {
            op: shrun_ast::UnAritOp::Inc,
            post: false,
            x: Box::new(ArithmExpr::lit("n")),
        },
    });
    let below_three = Stmt::new(Command::Arithm {
        expr: ArithmExpr::binary(
            shrun_ast::BinAritOp::Lss,
            ArithmExpr::lit("n"),
            ArithmExpr::lit("3"),
        ),
    });
    let while_stmt = Stmt::new(Command::While(WhileClause {
        until: false,
        cond: vec![below_three],
        body: vec![counter, echo_var("n")],
    }));
    let (_, out, _) = run(vec![if_stmt, while_stmt]);
    assert_eq!(out, "else\n1\n2\n3\n");
}

#[test]
fn test_errexit_stops_run() {
    let out = OutStream::buffer();
    let mut runner = Runner::new(RunnerConfig {
        env: Some(Vec::new()),
        stdout: Some(out.clone()),
        ..RunnerConfig::default()
    })
    .unwrap();
    let params = runner
        .from_args(&["-e".to_string(), "--".to_string(), "arg".to_string()])
        .unwrap();
    assert_eq!(params, ["arg"]);
    let file = File {
        name: String::new(),
        stmts: vec![
            Stmt::call(&["echo", "before"]),
            Stmt::call(&["false"]),
            Stmt::call(&["echo", "after"]),
        ],
    };
    let result = runner.run(Node::File(&file));
    assert!(matches!(result, Err(RunError::Exit(1))));
    assert_eq!(out.contents(), "before\n");
}

#[test]
fn test_exit_zero_is_success() {
    let (_, out, result) = run(vec![
        Stmt::call(&["exit"]),
        Stmt::call(&["echo", "unreached"]),
    ]);
    assert!(result.is_ok());
    assert_eq!(out, "");
}

#[test]
fn test_run_twice_is_rejected() {
    let mut runner = Runner::new(RunnerConfig {
        env: Some(Vec::new()),
        stdout: Some(OutStream::null()),
        ..RunnerConfig::default()
    })
    .unwrap();
    let stmt = Stmt::call(&["true"]);
    runner.run(Node::Stmt(&stmt)).unwrap();
    assert!(matches!(
        runner.run(Node::Stmt(&stmt)),
        Err(RunError::AlreadyRun)
    ));
}

#[test]
fn test_exec_hook_sees_prefix_assignments() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let exec = move |ctx: &HookContext, name: &str, args: &[String]| -> Result<(), ExecError> {
        let mut seen = recorder.lock().unwrap();
        seen.push(format!("{name} {}", args.join(" ")));
        seen.push(ctx.env_var("GREETING").unwrap_or("<unset>").to_string());
        Err(ExecError::Status(7))
    };
    let call = Stmt::new(Command::Call(CallExpr {
        assigns: vec![shrun_ast::Assign::scalar("GREETING", Word::lit("hi"))],
        ..CallExpr::new(vec![Word::lit("greet"), Word::lit("world")])
    }));
    let out = OutStream::buffer();
    let config = RunnerConfig {
        env: Some(Vec::new()),
        stdout: Some(out.clone()),
        exec: Some(Arc::new(exec)),
        ..RunnerConfig::default()
    };
    let (runner, result) = run_with(config, vec![call, echo_var("GREETING")]);
    assert!(result.is_ok());
    assert_eq!(runner.exit_code(), 0);
    assert_eq!(out.contents(), "\n");
    assert_eq!(*seen.lock().unwrap(), ["greet world", "hi"]);
}

#[test]
fn test_exec_hook_error_is_fatal() {
    let exec = |_: &HookContext, _: &str, _: &[String]| -> Result<(), ExecError> {
        Err(ExecError::Other(anyhow::anyhow!("sandbox refused")))
    };
    let config = RunnerConfig {
        env: Some(Vec::new()),
        stdout: Some(OutStream::null()),
        exec: Some(Arc::new(exec)),
        ..RunnerConfig::default()
    };
    let (_, result) = run_with(
        config,
        vec![Stmt::call(&["anything"]), Stmt::call(&["true"])],
    );
    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "sandbox refused");
}

#[test]
fn test_cancelled_before_start() {
    let cancel = CancelToken::new();
    cancel.cancel("shutting down");
    let config = RunnerConfig {
        env: Some(Vec::new()),
        stdout: Some(OutStream::null()),
        cancel,
        ..RunnerConfig::default()
    };
    let (_, result) = run_with(config, vec![Stmt::call(&["true"])]);
    assert!(matches!(result, Err(RunError::Cancelled(reason)) if reason == "shutting down"));
}
