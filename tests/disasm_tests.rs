//! Disassembly: golden output and the mnemonic round trip.

mod common;

use common::*;
use pretty_assertions::assert_eq;

use awk_vm::ast::*;
use awk_vm::{compile_program, disasm};

/// BEGIN { for (i=1; i<=3; i++) s = s " " i; print s }
fn loop_program() -> Program {
    Program {
        begin: vec![
            Stmt::For {
                init: Some(Box::new(expr(assign(lv_g(0), num(1.0))))),
                cond: Some(bin(BinOp::LessOrEqual, g(0), num(3.0))),
                step: Some(Box::new(expr(Expr::Incr {
                    pre: false,
                    by: 1,
                    target: lv_g(0),
                }))),
                body: vec![expr(assign(lv_g(1), concat(concat(g(1), s(" ")), g(0))))],
            },
            print(vec![g(1)]),
        ],
        scalar_names: vec!["i".to_string(), "s".to_string()],
        ..Program::default()
    }
}

#[test]
fn test_golden_disassembly() {
    let compiled = compile_program(&loop_program()).unwrap();
    let mut out = Vec::new();
    disasm::disassemble(&compiled, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let expected = "\
BEGIN:
0000 Num                1
0001 AssignGlobal       i
0002 Global             i
0003 Num                3
0004 JumpGreater        0x000d
0005 Global             s
0006 Str                \" \"
0007 Concat
0008 Global             i
0009 Concat
000a AssignGlobal       s
000b IncrGlobal         1 i
000c Jump               0x0002
000d Global             s
000e Print              1
";
    assert_eq!(text, expected);
}

#[test]
fn test_disassembly_mnemonics_round_trip() {
    // Every non-header line's mnemonic matches the instruction stream.
    let compiled = compile_program(&loop_program()).unwrap();
    let mut out = Vec::new();
    disasm::disassemble(&compiled, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let mnemonics: Vec<&str> = text
        .lines()
        .filter(|l| !l.ends_with(':'))
        .map(|l| l.split_whitespace().nth(1).unwrap())
        .collect();
    let expected: Vec<&str> = compiled.begin.iter().map(|i| i.mnemonic()).collect();
    assert_eq!(mnemonics, expected);
}

#[test]
fn test_disassembly_sections() {
    // Patterns, bodies, END, and functions each get a labeled section.
    let prog = Program {
        actions: vec![Action {
            pattern: Pattern::Expr(bin(BinOp::Greater, sp(SpecialVar::Nf), num(2.0))),
            body: None,
        }],
        end: vec![print(vec![s("done")])],
        functions: vec![Function {
            name: "noop".to_string(),
            params: vec![],
            body: vec![],
        }],
        ..Program::default()
    };
    let compiled = compile_program(&prog).unwrap();
    let mut out = Vec::new();
    disasm::disassemble(&compiled, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("action 0 pattern:"));
    assert!(text.contains("action 0 body:"));
    assert!(text.contains("END:"));
    assert!(text.contains("function noop:"));
    assert!(text.contains("Special            NF"));
}
