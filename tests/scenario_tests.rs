//! End-to-end scenarios: literal program/input/output triples plus the
//! boundary behaviors of the record, value, and call machinery.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use awk_vm::ast::*;
use awk_vm::VmError;

// ── the six literal scenarios ────────────────────────────────────────────

#[test]
fn test_scenario_begin_for_loop_concat() {
    // BEGIN { for (i=1; i<=3; i++) s = s " " i; print s }
    let prog = Program {
        begin: vec![
            Stmt::For {
                init: Some(Box::new(expr(assign(lv_g(0), num(1.0))))),
                cond: Some(bin(BinOp::LessOrEqual, g(0), num(3.0))),
                step: Some(Box::new(expr(Expr::Incr {
                    pre: false,
                    by: 1,
                    target: lv_g(0),
                }))),
                body: vec![expr(assign(
                    lv_g(1),
                    concat(concat(g(1), s(" ")), g(0)),
                ))],
            },
            print(vec![g(1)]),
        ],
        scalar_names: vec!["i".to_string(), "s".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, ""), (" 1 2 3\n".to_string(), 0));
}

#[test]
fn test_scenario_nf_and_fields() {
    // { print NF, $1, $NF }
    let mut prog = main_action(vec![print(vec![
        sp(SpecialVar::Nf),
        field(num(1.0)),
        field(sp(SpecialVar::Nf)),
    ])]);
    prog.scalar_names = vec![];
    assert_eq!(
        run_prog(&prog, "a b c\nd e\n").0,
        "3 a c\n2 d e\n"
    );
}

#[test]
fn test_scenario_count_words_for_in() {
    // { a[$1]++ } END { for (k in a) print k, a[k] }
    let prog = Program {
        actions: vec![Action {
            pattern: Pattern::Always,
            body: Some(vec![expr(Expr::Incr {
                pre: false,
                by: 1,
                target: lv_index_g(0, vec![field(num(1.0))]),
            })]),
        }],
        end: vec![Stmt::ForIn {
            var: Scalar::Global(0),
            array: Array::Global(0),
            body: vec![print(vec![g(0), index_g(0, vec![g(0)])])],
        }],
        scalar_names: vec!["k".to_string()],
        array_names: vec!["a".to_string()],
        ..Program::default()
    };
    let (out, _) = run_prog(&prog, "x\ny\nx\n");
    let mut lines: Vec<&str> = out.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["x 2", "y 1"]);
}

#[test]
fn test_scenario_fs_ofs_rejoin() {
    // BEGIN { FS=","; OFS=":" } { $1=$1; print }
    let prog = Program {
        begin: vec![
            expr(assign(lv_sp(SpecialVar::Fs), s(","))),
            expr(assign(lv_sp(SpecialVar::Ofs), s(":"))),
        ],
        actions: vec![Action {
            pattern: Pattern::Always,
            body: Some(vec![
                expr(assign(lv_field(num(1.0)), field(num(1.0)))),
                print(vec![]),
            ]),
        }],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "a,b,c\n").0, "a:b:c\n");
}

#[test]
fn test_scenario_sub_with_ampersand() {
    // BEGIN { s = "hello"; sub(/l+/, "&&", s); print s }
    let prog = begin(vec![
        expr(assign(lv_g(0), s("hello"))),
        expr(Expr::Subst {
            global: false,
            regex: Box::new(Expr::Regex("l+".to_string())),
            replacement: Box::new(s("&&")),
            target: Some(lv_g(0)),
        }),
        print(vec![g(0)]),
    ]);
    let mut prog = prog;
    prog.scalar_names = vec!["s".to_string()];
    assert_eq!(run_prog(&prog, "").0, "hellllo\n");
}

#[test]
fn test_scenario_function_array_param_for_in() {
    // function f(a,   i) { for (i in a) s += a[i]; return s }
    // BEGIN { x[1]=2; x[2]=3; print f(x) }
    let prog = Program {
        begin: vec![
            expr(assign(lv_index_g(0, vec![num(1.0)]), num(2.0))),
            expr(assign(lv_index_g(0, vec![num(2.0)]), num(3.0))),
            print(vec![Expr::CallUser {
                func: 0,
                args: vec![CallArg::Array(Array::Global(0))],
            }]),
        ],
        functions: vec![Function {
            name: "f".to_string(),
            params: vec![true, false],
            body: vec![
                Stmt::ForIn {
                    var: Scalar::Local(0),
                    array: Array::Local(0),
                    body: vec![expr(Expr::AugAssign {
                        target: lv_g(0),
                        op: AugOp::Add,
                        value: Box::new(index_l(0, vec![local(0)])),
                    })],
                },
                Stmt::Return(Some(g(0))),
            ],
        }],
        scalar_names: vec!["s".to_string()],
        array_names: vec!["x".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "5\n");
}

// ── boundary behaviors ───────────────────────────────────────────────────

#[test]
fn test_nf_zero_clears_record() {
    // { NF = 0; print "[" $0 "]" }
    let prog = main_action(vec![
        expr(assign(lv_sp(SpecialVar::Nf), num(0.0))),
        print(vec![concat(concat(s("["), field(num(0.0))), s("]"))]),
    ]);
    assert_eq!(run_prog(&prog, "a b c\n").0, "[]\n");
}

#[test]
fn test_negative_field_is_runtime_error() {
    let prog = main_action(vec![expr(field(num(-1.0)))]);
    let err = try_run(&prog, "x\n").unwrap_err();
    assert_eq!(err, VmError::FieldIndex(-1));
    assert_eq!(err.to_string(), "field index negative: -1");
}

#[test]
fn test_division_by_zero_message() {
    let prog = begin(vec![expr(assign(lv_g(0), bin(BinOp::Divide, num(1.0), num(0.0))))]);
    let mut prog = prog;
    prog.scalar_names = vec!["x".to_string()];
    let err = try_run(&prog, "").unwrap_err();
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn test_runtime_regex_error_is_recoverable_error() {
    // A pattern built at runtime fails when it is first used.
    let prog = begin(vec![
        expr(assign(lv_g(0), s("["))),
        expr(bin(BinOp::Match, s("x"), g(0))),
    ]);
    let mut prog = prog;
    prog.scalar_names = vec!["re".to_string()];
    let err = try_run(&prog, "").unwrap_err();
    assert!(matches!(err, VmError::InvalidRegex(..)));
}

#[test]
fn test_recursion_at_depth_limit() {
    // function rec(n) { if (n > 0) rec(n - 1) }
    fn prog(depth: f64) -> Program {
        Program {
            begin: vec![
                expr(Expr::CallUser {
                    func: 0,
                    args: vec![CallArg::Scalar(num(depth))],
                }),
                print(vec![s("ok")]),
            ],
            functions: vec![Function {
                name: "rec".to_string(),
                params: vec![false],
                body: vec![Stmt::If {
                    cond: bin(BinOp::Greater, local(0), num(0.0)),
                    then_body: vec![expr(Expr::CallUser {
                        func: 0,
                        args: vec![CallArg::Scalar(bin(
                            BinOp::Subtract,
                            local(0),
                            num(1.0),
                        ))],
                    })],
                    else_body: vec![],
                }],
            }],
            ..Program::default()
        }
    }
    // Depth 9 needs exactly 10 frames: at the limit, succeeds.
    let (out, _) = run_with_config(&prog(9.0), "", |c| c.max_call_depth = 10);
    assert_eq!(out, "ok\n");
    // One more frame fails.
    let err = try_run_with_config(&prog(10.0), "", |c| c.max_call_depth = 10).unwrap_err();
    assert_eq!(err, VmError::CallDepthExceeded(10));
}

// ── value semantics ──────────────────────────────────────────────────────

#[test]
fn test_uninitialized_variable_views() {
    let prog = Program {
        begin: vec![print(vec![
            bin(BinOp::Add, g(0), num(0.0)),
            concat(g(0), s("")),
        ])],
        scalar_names: vec!["x".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "0 \n");
}

#[test]
fn test_numeric_string_comparison() {
    // { print ($1 == "10"), ($1 < 9) }
    let prog = main_action(vec![print(vec![
        bin(BinOp::Equals, field(num(1.0)), s("10")),
        bin(BinOp::Less, field(num(1.0)), num(9.0)),
    ])]);
    assert_eq!(run_prog(&prog, "10\n").0, "1 0\n");
}

#[test]
fn test_convfmt_applies_to_concat() {
    let prog = Program {
        begin: vec![
            expr(assign(lv_sp(SpecialVar::Convfmt), s("%.2g"))),
            expr(assign(lv_g(0), num(0.123456))),
            print(vec![concat(g(0), s(""))]),
        ],
        scalar_names: vec!["x".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "0.12\n");
}

#[test]
fn test_ofmt_applies_to_print() {
    let prog = begin(vec![
        expr(assign(lv_sp(SpecialVar::Ofmt), s("%.2f"))),
        print(vec![num(3.14159)]),
    ]);
    assert_eq!(run_prog(&prog, "").0, "3.14\n");
}

#[test]
fn test_ternary_and_or() {
    let prog = begin(vec![print(vec![
        Expr::Cond {
            cond: Box::new(bin(BinOp::Greater, num(2.0), num(1.0))),
            yes: Box::new(s("t")),
            no: Box::new(s("f")),
        },
        Expr::And(Box::new(num(1.0)), Box::new(s("a"))),
        Expr::Or(Box::new(num(0.0)), Box::new(s(""))),
    ])]);
    assert_eq!(run_prog(&prog, "").0, "t 1 0\n");
}

// ── built-ins ────────────────────────────────────────────────────────────

#[test]
fn test_split_builtin() {
    // n = split("a:b:c", arr, ":"); print n, arr[1], arr[3]
    let prog = Program {
        begin: vec![
            expr(assign(
                lv_g(0),
                Expr::Split {
                    string: Box::new(s("a:b:c")),
                    array: Array::Global(0),
                    sep: Some(Box::new(s(":"))),
                },
            )),
            print(vec![g(0), index_g(0, vec![num(1.0)]), index_g(0, vec![num(3.0)])]),
        ],
        scalar_names: vec!["n".to_string()],
        array_names: vec!["arr".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "3 a c\n");
}

#[test]
fn test_split_whitespace_rule() {
    // split("  a  b ", arr) with default FS strips and collapses.
    let prog = Program {
        begin: vec![
            expr(assign(
                lv_g(0),
                Expr::Split {
                    string: Box::new(s("  a  b ")),
                    array: Array::Global(0),
                    sep: None,
                },
            )),
            print(vec![g(0), index_g(0, vec![num(1.0)]), index_g(0, vec![num(2.0)])]),
        ],
        scalar_names: vec!["n".to_string()],
        array_names: vec!["arr".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "2 a b\n");
}

#[test]
fn test_substr_index_builtin() {
    let prog = begin(vec![print(vec![
        Expr::Builtin {
            func: BuiltinFn::Substr,
            args: vec![s("hello"), num(2.0), num(3.0)],
        },
        Expr::Builtin {
            func: BuiltinFn::Index,
            args: vec![s("foobar"), s("ob")],
        },
        Expr::Builtin {
            func: BuiltinFn::Toupper,
            args: vec![s("hi")],
        },
    ])]);
    assert_eq!(run_prog(&prog, "").0, "ell 3 HI\n");
}

#[test]
fn test_match_sets_rstart_rlength() {
    let prog = begin(vec![
        expr(Expr::Builtin {
            func: BuiltinFn::Match,
            args: vec![s("foobar"), s("o+")],
        }),
        print(vec![sp(SpecialVar::Rstart), sp(SpecialVar::Rlength)]),
        expr(Expr::Builtin {
            func: BuiltinFn::Match,
            args: vec![s("foobar"), s("zz")],
        }),
        print(vec![sp(SpecialVar::Rstart), sp(SpecialVar::Rlength)]),
    ]);
    assert_eq!(run_prog(&prog, "").0, "2 2\n0 -1\n");
}

#[test]
fn test_length_of_record_and_string() {
    let prog = main_action(vec![print(vec![
        Expr::Builtin {
            func: BuiltinFn::Length,
            args: vec![],
        },
        Expr::Builtin {
            func: BuiltinFn::Length,
            args: vec![s("αβγ")],
        },
    ])]);
    assert_eq!(run_prog(&prog, "hello\n").0, "5 3\n");
}

#[test]
fn test_gsub_on_record() {
    // { gsub(/o/, "0"); print }
    let prog = main_action(vec![
        expr(Expr::Subst {
            global: true,
            regex: Box::new(Expr::Regex("o".to_string())),
            replacement: Box::new(s("0")),
            target: None,
        }),
        print(vec![]),
    ]);
    assert_eq!(run_prog(&prog, "foo boo\n").0, "f00 b00\n");
}

#[test]
fn test_sprintf_expression() {
    let prog = begin(vec![print(vec![Expr::Sprintf {
        args: vec![s("%05d"), num(42.0)],
    }])]);
    assert_eq!(run_prog(&prog, "").0, "00042\n");
}

#[test]
fn test_printf_statement() {
    let prog = begin(vec![printf(vec![
        s("%d|%5.2f|%s|%c\n"),
        num(42.0),
        num(3.14159),
        s("hi"),
        num(65.0),
    ])]);
    assert_eq!(run_prog(&prog, "").0, "42| 3.14|hi|A\n");
}

// ── arrays ───────────────────────────────────────────────────────────────

#[test]
fn test_in_does_not_materialize_but_reference_does() {
    let prog = Program {
        begin: vec![
            print(vec![Expr::In {
                index: vec![s("z")],
                array: Array::Global(0),
            }]),
            // A plain element reference inserts the key.
            expr(assign(lv_g(0), index_g(0, vec![s("z")]))),
            print(vec![Expr::In {
                index: vec![s("z")],
                array: Array::Global(0),
            }]),
        ],
        scalar_names: vec!["tmp".to_string()],
        array_names: vec!["a".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "0\n1\n");
}

#[test]
fn test_delete_element_and_all() {
    let prog = Program {
        begin: vec![
            expr(assign(lv_index_g(0, vec![s("k")]), num(1.0))),
            expr(assign(lv_index_g(0, vec![s("m")]), num(2.0))),
            Stmt::Delete {
                array: Array::Global(0),
                index: vec![s("k")],
            },
            print(vec![
                Expr::In {
                    index: vec![s("k")],
                    array: Array::Global(0),
                },
                Expr::In {
                    index: vec![s("m")],
                    array: Array::Global(0),
                },
            ]),
            Stmt::Delete {
                array: Array::Global(0),
                index: vec![],
            },
            print(vec![Expr::In {
                index: vec![s("m")],
                array: Array::Global(0),
            }]),
        ],
        array_names: vec!["a".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "0 1\n0\n");
}

#[test]
fn test_multi_index_uses_subsep() {
    let prog = Program {
        begin: vec![
            expr(assign(
                LValue::Index(Array::Global(0), vec![num(1.0), num(2.0)]),
                s("v"),
            )),
            print(vec![
                Expr::In {
                    index: vec![num(1.0), num(2.0)],
                    array: Array::Global(0),
                },
                index_g(0, vec![concat(num(1.0), concat(sp(SpecialVar::Subsep), num(2.0)))]),
            ]),
        ],
        array_names: vec!["a".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "1 v\n");
}

#[test]
fn test_for_in_snapshot_ignores_insertions() {
    // Keys added during iteration are not visited.
    let prog = Program {
        begin: vec![
            expr(assign(lv_index_g(0, vec![s("a")]), num(1.0))),
            expr(assign(lv_index_g(0, vec![s("b")]), num(1.0))),
            Stmt::ForIn {
                var: Scalar::Global(0),
                array: Array::Global(0),
                body: vec![
                    expr(assign(
                        lv_index_g(0, vec![concat(s("new"), g(0))]),
                        num(1.0),
                    )),
                    expr(Expr::Incr {
                        pre: false,
                        by: 1,
                        target: lv_g(1),
                    }),
                ],
            },
            print(vec![g(1)]),
        ],
        scalar_names: vec!["k".to_string(), "n".to_string()],
        array_names: vec!["a".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "2\n");
}

#[test]
fn test_for_in_snapshot_still_visits_deleted_keys() {
    let prog = Program {
        begin: vec![
            expr(assign(lv_index_g(0, vec![s("x")]), num(1.0))),
            expr(assign(lv_index_g(0, vec![s("y")]), num(1.0))),
            Stmt::ForIn {
                var: Scalar::Global(0),
                array: Array::Global(0),
                body: vec![
                    Stmt::Delete {
                        array: Array::Global(0),
                        index: vec![s("y")],
                    },
                    expr(Expr::Incr {
                        pre: false,
                        by: 1,
                        target: lv_g(1),
                    }),
                ],
            },
            print(vec![g(1)]),
        ],
        scalar_names: vec!["k".to_string(), "n".to_string()],
        array_names: vec!["a".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "2\n");
}

// ── control flow ─────────────────────────────────────────────────────────

#[test]
fn test_while_break_continue() {
    let prog = Program {
        begin: vec![
            expr(assign(lv_g(0), num(0.0))),
            Stmt::While {
                cond: num(1.0),
                body: vec![
                    expr(Expr::Incr {
                        pre: false,
                        by: 1,
                        target: lv_g(0),
                    }),
                    Stmt::If {
                        cond: bin(BinOp::Equals, g(0), num(2.0)),
                        then_body: vec![Stmt::Continue],
                        else_body: vec![],
                    },
                    Stmt::If {
                        cond: bin(BinOp::GreaterOrEqual, g(0), num(4.0)),
                        then_body: vec![Stmt::Break],
                        else_body: vec![],
                    },
                    expr(assign(lv_g(1), concat(g(1), g(0)))),
                ],
            },
            print(vec![g(1), g(0)]),
        ],
        scalar_names: vec!["i".to_string(), "s".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "13 4\n");
}

#[test]
fn test_for_continue_targets_post_statement() {
    // for (i=0; i<5; i++) { if (i==2) continue; s = s i }
    let prog = Program {
        begin: vec![
            Stmt::For {
                init: Some(Box::new(expr(assign(lv_g(0), num(0.0))))),
                cond: Some(bin(BinOp::Less, g(0), num(5.0))),
                step: Some(Box::new(expr(Expr::Incr {
                    pre: false,
                    by: 1,
                    target: lv_g(0),
                }))),
                body: vec![
                    Stmt::If {
                        cond: bin(BinOp::Equals, g(0), num(2.0)),
                        then_body: vec![Stmt::Continue],
                        else_body: vec![],
                    },
                    expr(assign(lv_g(1), concat(g(1), g(0)))),
                ],
            },
            print(vec![g(1)]),
        ],
        scalar_names: vec!["i".to_string(), "s".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "0134\n");
}

#[test]
fn test_do_while() {
    let prog = Program {
        begin: vec![
            expr(assign(lv_g(0), num(0.0))),
            Stmt::DoWhile {
                body: vec![expr(Expr::Incr {
                    pre: false,
                    by: 1,
                    target: lv_g(0),
                })],
                cond: bin(BinOp::Less, g(0), num(3.0)),
            },
            print(vec![g(0)]),
        ],
        scalar_names: vec!["i".to_string()],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "3\n");
}

#[test]
fn test_exit_in_begin_still_runs_end() {
    let prog = Program {
        begin: vec![Stmt::Exit(Some(num(2.0))), print(vec![s("skipped")])],
        end: vec![print(vec![s("end")])],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, ""), ("end\n".to_string(), 2));
}

#[test]
fn test_next_skips_remaining_actions() {
    let prog = Program {
        actions: vec![
            Action {
                pattern: Pattern::Always,
                body: Some(vec![Stmt::Next]),
            },
            Action {
                pattern: Pattern::Always,
                body: Some(vec![print(vec![s("unreachable")])]),
            },
        ],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "a\nb\n").0, "");
}

#[test]
fn test_range_pattern() {
    // /b/,/d/ with a default-print body.
    let prog = Program {
        actions: vec![Action {
            pattern: Pattern::Range(
                Expr::Regex("b".to_string()),
                Expr::Regex("d".to_string()),
            ),
            body: None,
        }],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "a\nb\nc\nd\ne\n").0, "b\nc\nd\n");
}

#[test]
fn test_pattern_expression() {
    // $1 == "x" { print "hit" }
    let prog = Program {
        actions: vec![Action {
            pattern: Pattern::Expr(bin(BinOp::Equals, field(num(1.0)), s("x"))),
            body: Some(vec![print(vec![s("hit")])]),
        }],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "x\ny\nx\n").0, "hit\nhit\n");
}

#[test]
fn test_user_function_scalar_return() {
    // function addone(x) { return x + 1 }  BEGIN { print addone(7) }
    let prog = Program {
        begin: vec![print(vec![Expr::CallUser {
            func: 0,
            args: vec![CallArg::Scalar(num(7.0))],
        }])],
        functions: vec![Function {
            name: "addone".to_string(),
            params: vec![false],
            body: vec![Stmt::Return(Some(bin(BinOp::Add, local(0), num(1.0))))],
        }],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "8\n");
}

#[test]
fn test_missing_args_are_null_and_fall_off_end_returns_null() {
    // function f(a, b) { return b "" }  BEGIN { print "[" f(1) "]" }
    let prog = Program {
        begin: vec![print(vec![concat(
            concat(
                s("["),
                Expr::CallUser {
                    func: 0,
                    args: vec![CallArg::Scalar(num(1.0))],
                },
            ),
            s("]"),
        )])],
        functions: vec![Function {
            name: "f".to_string(),
            params: vec![false, false],
            body: vec![Stmt::Return(Some(concat(local(1), s(""))))],
        }],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "").0, "[]\n");
}

#[test]
fn test_field_assignment_beyond_nf_grows_record() {
    // { $4 = "d"; print NF, $0 }
    let prog = main_action(vec![
        expr(assign(lv_field(num(4.0)), s("d"))),
        print(vec![sp(SpecialVar::Nf), field(num(0.0))]),
    ]);
    assert_eq!(run_prog(&prog, "a b\n").0, "4 a b  d\n");
}

#[test]
fn test_getline_main_advances_nr() {
    // { getline; print NR, $0 }
    let prog = main_action(vec![
        expr(Expr::Getline {
            source: GetlineSource::Main,
            target: GetlineTarget::Record,
        }),
        print(vec![sp(SpecialVar::Nr), field(num(0.0))]),
    ]);
    assert_eq!(run_prog(&prog, "a\nb\nc\nd\n").0, "2 b\n4 d\n");
}

#[test]
fn test_command_line_assignment_operand() {
    // awk '{ print x, $0 }' x=7 (then stdin)
    let prog = Program {
        actions: vec![Action {
            pattern: Pattern::Always,
            body: Some(vec![print(vec![g(0), field(num(0.0))])]),
        }],
        scalar_names: vec!["x".to_string()],
        ..Program::default()
    };
    let (out, _) = run_with_config(&prog, "z\n", |c| {
        c.args = vec!["x=7".to_string()];
    });
    assert_eq!(out, "7 z\n");
}

#[test]
fn test_paragraph_mode_records() {
    // BEGIN { RS = "" } { print NF, $2 }
    let prog = Program {
        begin: vec![expr(assign(lv_sp(SpecialVar::Rs), s("")))],
        actions: vec![Action {
            pattern: Pattern::Always,
            body: Some(vec![print(vec![sp(SpecialVar::Nf), field(num(2.0))])]),
        }],
        ..Program::default()
    };
    // Fields split on newline as well as FS in paragraph mode.
    assert_eq!(run_prog(&prog, "a b\nc\n\nd e\n").0, "3 b\n2 e\n");
}

#[test]
fn test_regex_rs_sets_rt() {
    // BEGIN { RS = "x+" } { print $0, "<" RT ">" }
    let prog = Program {
        begin: vec![expr(assign(lv_sp(SpecialVar::Rs), s("x+")))],
        actions: vec![Action {
            pattern: Pattern::Always,
            body: Some(vec![print(vec![
                field(num(0.0)),
                concat(concat(s("<"), sp(SpecialVar::Rt)), s(">")),
            ])]),
        }],
        ..Program::default()
    };
    assert_eq!(run_prog(&prog, "aaxxbbxxxcc").0, "aa <xx>\nbb <xxx>\ncc <>\n");
}
