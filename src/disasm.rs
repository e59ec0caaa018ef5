//! Bytecode disassembly.
//!
//! One line per instruction: a four-hex-digit offset, the mnemonic, and
//! resolved operands — global and special variables by name, branch
//! targets as absolute `0x####` offsets. The output format is a stable
//! textual interface exercised by the test suite.

use std::io::{self, Write};

use crate::ast::AugOp;
use crate::compile::{CompiledPattern, CompiledProgram};
use crate::vm::instr::{Instr, IoSource, IoTarget, SubstTarget};

pub fn disassemble(program: &CompiledProgram, w: &mut dyn Write) -> io::Result<()> {
    if !program.begin.is_empty() {
        writeln!(w, "BEGIN:")?;
        disassemble_block(&program.begin, program, w)?;
    }
    for (i, action) in program.actions.iter().enumerate() {
        match &action.pattern {
            CompiledPattern::Always => {}
            CompiledPattern::Expr(block) => {
                writeln!(w, "action {} pattern:", i)?;
                disassemble_block(block, program, w)?;
            }
            CompiledPattern::Range(start, stop) => {
                writeln!(w, "action {} range start:", i)?;
                disassemble_block(start, program, w)?;
                writeln!(w, "action {} range stop:", i)?;
                disassemble_block(stop, program, w)?;
            }
        }
        writeln!(w, "action {} body:", i)?;
        disassemble_block(&action.body, program, w)?;
    }
    if !program.end.is_empty() {
        writeln!(w, "END:")?;
        disassemble_block(&program.end, program, w)?;
    }
    for f in &program.functions {
        writeln!(w, "function {}:", f.name)?;
        disassemble_block(&f.body, program, w)?;
    }
    Ok(())
}

pub fn disassemble_block(
    code: &[Instr],
    program: &CompiledProgram,
    w: &mut dyn Write,
) -> io::Result<()> {
    for (i, instr) in code.iter().enumerate() {
        let operands = operands(instr, i, program);
        if operands.is_empty() {
            writeln!(w, "{:04x} {}", i, instr.mnemonic())?;
        } else {
            writeln!(w, "{:04x} {:<18} {}", i, instr.mnemonic(), operands)?;
        }
    }
    Ok(())
}

fn global_name(program: &CompiledProgram, g: usize) -> String {
    program
        .scalar_names
        .get(g)
        .cloned()
        .unwrap_or_else(|| format!("g{}", g))
}

fn array_name(program: &CompiledProgram, a: usize) -> String {
    program
        .array_names
        .get(a)
        .cloned()
        .unwrap_or_else(|| format!("a{}", a))
}

fn array_ref(program: &CompiledProgram, a: crate::ast::Array) -> String {
    match a {
        crate::ast::Array::Global(a) => array_name(program, a),
        crate::ast::Array::Local(a) => format!("local {}", a),
    }
}

fn aug_token(op: AugOp) -> &'static str {
    match op {
        AugOp::Add => "+=",
        AugOp::Subtract => "-=",
        AugOp::Multiply => "*=",
        AugOp::Divide => "/=",
        AugOp::Modulo => "%=",
        AugOp::Power => "^=",
    }
}

fn target_hex(at: usize, off: i32) -> String {
    format!("0x{:04x}", at as i64 + 1 + off as i64)
}

fn subst_target(program: &CompiledProgram, t: SubstTarget) -> String {
    match t {
        SubstTarget::Record => "$0".to_string(),
        SubstTarget::Field => "$".to_string(),
        SubstTarget::Global(g) => global_name(program, g),
        SubstTarget::Local(l) => format!("local {}", l),
        SubstTarget::Special(sv) => sv.name().to_string(),
        SubstTarget::ArrayGlobal(a) => array_name(program, a),
        SubstTarget::ArrayLocal(a) => format!("local array {}", a),
    }
}

fn operands(instr: &Instr, at: usize, p: &CompiledProgram) -> String {
    match instr {
        Instr::Num(i) => format!("{}", p.nums[*i]),
        Instr::Str(i) => format!("{:?}", p.strs[*i]),
        Instr::Regex(i) => format!("/{}/", p.regexes[*i]),
        Instr::Nulls(n) | Instr::MultiIndex(n) => format!("{}", n),
        Instr::Global(g) | Instr::AssignGlobal(g) => global_name(p, *g),
        Instr::Local(l) | Instr::AssignLocal(l) => format!("{}", l),
        Instr::Special(sv) | Instr::AssignSpecial(sv) => sv.name().to_string(),
        Instr::AugGlobal(op, g) => format!("{} {}", aug_token(*op), global_name(p, *g)),
        Instr::AugLocal(op, l) => format!("{} {}", aug_token(*op), l),
        Instr::AugSpecial(op, sv) => format!("{} {}", aug_token(*op), sv.name()),
        Instr::IncrGlobal(by, g) => format!("{} {}", by, global_name(p, *g)),
        Instr::IncrLocal(by, l) => format!("{} {}", by, l),
        Instr::IncrSpecial(by, sv) => format!("{} {}", by, sv.name()),
        Instr::FieldNum(k) => format!("{}", k),
        Instr::AugField(op) => aug_token(*op).to_string(),
        Instr::IncrField(by) => format!("{}", by),
        Instr::ArrayGlobal(a)
        | Instr::AssignArrayGlobal(a)
        | Instr::InGlobal(a)
        | Instr::DeleteGlobal(a)
        | Instr::DeleteAllGlobal(a)
        | Instr::CallSplitGlobal(a)
        | Instr::CallSplitSepGlobal(a) => array_name(p, *a),
        Instr::ArrayLocal(a)
        | Instr::AssignArrayLocal(a)
        | Instr::InLocal(a)
        | Instr::DeleteLocal(a)
        | Instr::DeleteAllLocal(a)
        | Instr::CallSplitLocal(a)
        | Instr::CallSplitSepLocal(a) => format!("{}", a),
        Instr::AugArrayGlobal(op, a) => format!("{} {}", aug_token(*op), array_name(p, *a)),
        Instr::AugArrayLocal(op, a) => format!("{} {}", aug_token(*op), a),
        Instr::IncrArrayGlobal(by, a) => format!("{} {}", by, array_name(p, *a)),
        Instr::IncrArrayLocal(by, a) => format!("{} {}", by, a),
        Instr::Jump(off)
        | Instr::JumpTrue(off)
        | Instr::JumpFalse(off)
        | Instr::JumpEquals(off)
        | Instr::JumpNotEquals(off)
        | Instr::JumpLess(off)
        | Instr::JumpLessOrEqual(off)
        | Instr::JumpGreater(off)
        | Instr::JumpGreaterOrEqual(off) => target_hex(at, *off),
        Instr::ForInGlobal {
            var,
            array,
            body_len,
        } => format!(
            "{} {} {}",
            global_name(p, *var),
            array_ref(p, *array),
            target_hex(at, *body_len as i32)
        ),
        Instr::ForInLocal {
            var,
            array,
            body_len,
        } => format!(
            "{} {} {}",
            var,
            array_ref(p, *array),
            target_hex(at, *body_len as i32)
        ),
        Instr::ForInSpecial {
            var,
            array,
            body_len,
        } => format!(
            "{} {} {}",
            var.name(),
            array_ref(p, *array),
            target_hex(at, *body_len as i32)
        ),
        Instr::CallUser { func, array_args } => {
            let name = p
                .functions
                .get(*func)
                .map(|f| f.name.clone())
                .unwrap_or_else(|| format!("f{}", func));
            if array_args.is_empty() {
                name
            } else {
                let args: Vec<String> =
                    array_args.iter().map(|a| array_ref(p, *a)).collect();
                format!("{} [{}]", name, args.join(", "))
            }
        }
        Instr::CallNative { func, num_args } => {
            let name = p
                .native_names
                .get(*func)
                .cloned()
                .unwrap_or_else(|| format!("n{}", func));
            format!("{} {}", name, num_args)
        }
        Instr::CallBuiltin { func, num_args } => format!("{} {}", func.name(), num_args),
        Instr::CallSprintf(n) => format!("{}", n),
        Instr::CallSub { target } | Instr::CallGsub { target } => subst_target(p, *target),
        Instr::Print { num_args, redirect } | Instr::Printf { num_args, redirect } => {
            match redirect {
                None => format!("{}", num_args),
                Some(crate::ast::RedirMode::File) => format!("{} >", num_args),
                Some(crate::ast::RedirMode::Append) => format!("{} >>", num_args),
                Some(crate::ast::RedirMode::Command) => format!("{} |", num_args),
            }
        }
        Instr::Getline { source, target } => {
            let src = match source {
                IoSource::Main => "main",
                IoSource::File => "file",
                IoSource::Command => "command",
            };
            let tgt = match target {
                IoTarget::Record => "$0".to_string(),
                IoTarget::Global(g) => global_name(p, *g),
                IoTarget::Local(l) => format!("local {}", l),
                IoTarget::Special(sv) => sv.name().to_string(),
                IoTarget::Field => "$".to_string(),
                IoTarget::ArrayGlobal(a) => array_name(p, *a),
                IoTarget::ArrayLocal(a) => format!("local array {}", a),
            };
            format!("{} {}", src, tgt)
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_hex() {
        assert_eq!(target_hex(2, 2), "0x0005");
        assert_eq!(target_hex(4, -5), "0x0000");
    }
}
