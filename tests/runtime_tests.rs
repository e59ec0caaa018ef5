//! Streams, processes, native functions, safety flags, and the bytecode
//! file round trip.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use awk_vm::ast::*;
use awk_vm::{bytecode, compile_program, NativeFunction, NativeValue, ParamKind, VmError};

fn getline_var_from_file(var: usize, path_var: usize) -> Stmt {
    // while ((getline line < f) > 0) print line
    Stmt::While {
        cond: bin(
            BinOp::Greater,
            Expr::Getline {
                source: GetlineSource::File(Box::new(g(path_var))),
                target: GetlineTarget::Var(Scalar::Global(var)),
            },
            num(0.0),
        ),
        body: vec![print(vec![g(var)])],
    }
}

#[test]
fn test_getline_var_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lines.txt");
    std::fs::write(&path, "one\ntwo\n").unwrap();

    let prog = Program {
        begin: vec![getline_var_from_file(0, 1)],
        scalar_names: vec!["line".to_string(), "f".to_string()],
        ..Program::default()
    };
    let (out, _) = run_with_config(&prog, "", |c| {
        c.vars = vec!["f".to_string(), path.to_string_lossy().into_owned()];
    });
    assert_eq!(out, "one\ntwo\n");
}

#[test]
fn test_getline_missing_file_returns_minus_one() {
    // r = (getline < "/no/such/file"); print r
    let prog = Program {
        begin: vec![
            expr(assign(
                lv_g(0),
                Expr::Getline {
                    source: GetlineSource::File(Box::new(s("/no/such/file"))),
                    target: GetlineTarget::Record,
                },
            )),
            print(vec![g(0)]),
        ],
        scalar_names: vec!["r".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "-1\n");
}

#[test]
fn test_getline_file_does_not_touch_nr() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("side.txt");
    std::fs::write(&path, "side\n").unwrap();

    // { getline line < f; print NR, line }
    let prog = Program {
        actions: vec![Action {
            pattern: Pattern::Always,
            body: Some(vec![
                expr(Expr::Getline {
                    source: GetlineSource::File(Box::new(g(1))),
                    target: GetlineTarget::Var(Scalar::Global(0)),
                }),
                print(vec![sp(SpecialVar::Nr), g(0)]),
            ]),
        }],
        scalar_names: vec!["line".to_string(), "f".to_string()],
        ..Program::default()
    };
    let (out, _) = run_with_config(&prog, "main\n", |c| {
        c.vars = vec!["f".to_string(), path.to_string_lossy().into_owned()];
    });
    assert_eq!(out, "1 side\n");
}

#[test]
fn test_print_redirect_to_file_and_close() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let path_str = path.to_string_lossy().into_owned();

    // BEGIN { print "x" > f; print "y" > f; close(f) }
    let prog = Program {
        begin: vec![
            Stmt::Print {
                args: vec![s("x")],
                redirect: Some((RedirMode::File, g(0))),
            },
            Stmt::Print {
                args: vec![s("y")],
                redirect: Some((RedirMode::File, g(0))),
            },
            expr(Expr::Builtin {
                func: BuiltinFn::Close,
                args: vec![g(0)],
            }),
        ],
        scalar_names: vec!["f".to_string()],
        ..Program::default()
    };
    run_with_config(&prog, "", |c| {
        c.vars = vec!["f".to_string(), path_str.clone()];
    });
    // `>` truncates once at open; the second print appends.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "x\ny\n");
}

#[test]
fn test_close_unknown_stream_returns_minus_one() {
    let prog = begin(vec![print(vec![Expr::Builtin {
        func: BuiltinFn::Close,
        args: vec![s("never-opened")],
    }])]);
    assert_eq!(run_prog(&prog, "").0, "-1\n");
}

#[cfg(unix)]
#[test]
fn test_command_getline() {
    // BEGIN { "echo hi" | getline v; print v }
    let prog = Program {
        begin: vec![
            expr(Expr::Getline {
                source: GetlineSource::Command(Box::new(s("echo hi"))),
                target: GetlineTarget::Var(Scalar::Global(0)),
            }),
            print(vec![g(0)]),
        ],
        scalar_names: vec!["v".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "hi\n");
}

#[cfg(unix)]
#[test]
fn test_system_returns_exit_code() {
    let prog = begin(vec![print(vec![Expr::Builtin {
        func: BuiltinFn::System,
        args: vec![s("exit 3")],
    }])]);
    assert_eq!(run_prog(&prog, "").0, "3\n");
}

#[cfg(unix)]
#[test]
fn test_print_pipe_to_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piped.txt");
    let cmd = format!("cat > {}", path.to_string_lossy());

    let prog = Program {
        begin: vec![
            Stmt::Print {
                args: vec![s("through the pipe")],
                redirect: Some((RedirMode::Command, g(0))),
            },
            expr(Expr::Builtin {
                func: BuiltinFn::Close,
                args: vec![g(0)],
            }),
        ],
        scalar_names: vec!["cmd".to_string()],
        ..Program::default()
    };
    run_with_config(&prog, "", |c| {
        c.vars = vec!["cmd".to_string(), cmd.clone()];
    });
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "through the pipe\n"
    );
}

// ── safety flags ─────────────────────────────────────────────────────────

#[test]
fn test_no_exec_refuses_system() {
    let prog = begin(vec![expr(Expr::Builtin {
        func: BuiltinFn::System,
        args: vec![s("true")],
    })]);
    let err = try_run_with_config(&prog, "", |c| c.no_exec = true).unwrap_err();
    assert!(matches!(err, VmError::Sandbox(_)));
}

#[test]
fn test_no_file_reads_refuses_getline() {
    let prog = begin(vec![expr(Expr::Getline {
        source: GetlineSource::File(Box::new(s("/etc/hostname"))),
        target: GetlineTarget::Record,
    })]);
    let err = try_run_with_config(&prog, "", |c| c.no_file_reads = true).unwrap_err();
    assert!(matches!(err, VmError::Sandbox(_)));
}

#[test]
fn test_no_file_writes_refuses_redirect() {
    let prog = begin(vec![Stmt::Print {
        args: vec![s("x")],
        redirect: Some((RedirMode::File, s("/tmp/should-not-exist-awk-vm"))),
    }]);
    let err = try_run_with_config(&prog, "", |c| c.no_file_writes = true).unwrap_err();
    assert!(matches!(err, VmError::Sandbox(_)));
}

// ── native functions ─────────────────────────────────────────────────────

#[test]
fn test_native_function_call() {
    let prog = Program {
        begin: vec![print(vec![Expr::CallNative {
            func: 0,
            args: vec![num(21.0)],
        }])],
        native_names: vec!["double".to_string()],
        ..Program::default()
    };
    let (out, _) = run_with_config(&prog, "", |c| {
        c.funcs.insert(
            "double".to_string(),
            NativeFunction::new(vec![ParamKind::Float], |args| match args {
                [NativeValue::Float(x)] => Ok(NativeValue::Float(x * 2.0)),
                _ => Err("bad arguments".to_string()),
            }),
        );
    });
    assert_eq!(out, "42\n");
}

#[test]
fn test_native_function_error_terminates() {
    let prog = Program {
        begin: vec![expr(Expr::CallNative {
            func: 0,
            args: vec![],
        })],
        native_names: vec!["boom".to_string()],
        ..Program::default()
    };
    let err = try_run_with_config(&prog, "", |c| {
        c.funcs.insert(
            "boom".to_string(),
            NativeFunction::new(vec![], |_| Err("kaboom".to_string())),
        );
    })
    .unwrap_err();
    assert_eq!(
        err,
        VmError::NativeCall {
            name: "boom".to_string(),
            message: "kaboom".to_string()
        }
    );
}

#[test]
fn test_native_argument_coercion() {
    let prog = Program {
        begin: vec![print(vec![Expr::CallNative {
            func: 0,
            args: vec![s("12abc"), s(""), s("x")],
        }])],
        native_names: vec!["describe".to_string()],
        ..Program::default()
    };
    let (out, _) = run_with_config(&prog, "", |c| {
        c.funcs.insert(
            "describe".to_string(),
            NativeFunction::new(
                vec![ParamKind::Int, ParamKind::Bool, ParamKind::Str],
                |args| match args {
                    [NativeValue::Int(i), NativeValue::Bool(b), NativeValue::Str(s)] => {
                        Ok(NativeValue::Str(format!("{}/{}/{}", i, b, s)))
                    }
                    _ => Err("bad arguments".to_string()),
                },
            ),
        );
    });
    assert_eq!(out, "12/false/x\n");
}

// ── bytecode round trip ──────────────────────────────────────────────────

#[test]
fn test_bytecode_round_trip_still_runs() {
    let prog = main_action(vec![print(vec![sp(SpecialVar::Nr), field(num(1.0))])]);
    let compiled = compile_program(&prog).unwrap();
    let bytes = bytecode::save_to_bytes(&compiled).unwrap();
    let loaded = bytecode::load_from_bytes(&bytes).unwrap();
    assert_eq!(compiled, loaded);

    let out = SharedBuf::default();
    let config = awk_vm::Config {
        stdin: Box::new(std::io::Cursor::new(b"a b\nc d\n".to_vec())),
        output: Box::new(out.clone()),
        ..awk_vm::Config::default()
    };
    let mut vm = awk_vm::Vm::new(&loaded, config).unwrap();
    vm.run().unwrap();
    assert_eq!(out.contents(), "1 a\n2 c\n");
}
