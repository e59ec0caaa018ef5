//! The `Compiler` struct: one per code block, sharing the constant pools.
//!
//! Emission is append-only. Forward branches are emitted with a zero
//! offset and patched once the target index is known; because branch
//! operands are relative to the following instruction, finished blocks
//! are position-independent.

use crate::ast;
use crate::vm::Instr;

use super::constants::Pools;
use super::types::{err, CResult};

/// Patch points for the innermost loops. `for`-`in` bodies are a nested
/// block executed by the VM, so `break` inside them is the `BreakForIn`
/// sentinel rather than a patched jump.
#[derive(Debug)]
pub(super) struct LoopContext {
    pub for_in: bool,
    /// Branch indices to patch to the loop exit.
    pub exit_patches: Vec<usize>,
    /// Branch indices to patch to the continue target (condition, post
    /// statement, or body end, depending on the loop form).
    pub continue_patches: Vec<usize>,
}

impl LoopContext {
    pub fn new(for_in: bool) -> LoopContext {
        LoopContext {
            for_in,
            exit_patches: Vec::new(),
            continue_patches: Vec::new(),
        }
    }
}

pub(super) struct Compiler<'a> {
    pub code: Vec<Instr>,
    pub pools: &'a mut Pools,
    /// Function signatures, for argument padding at call sites.
    pub functions: &'a [ast::Function],
    pub loop_stack: Vec<LoopContext>,
}

impl<'a> Compiler<'a> {
    pub fn new(pools: &'a mut Pools, functions: &'a [ast::Function]) -> Compiler<'a> {
        Compiler {
            code: Vec::new(),
            pools,
            functions,
            loop_stack: Vec::new(),
        }
    }

    /// Append an instruction, returning its index.
    pub fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    /// Current emission position (the index of the next instruction).
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Point the branch at `at` to absolute index `target`.
    pub fn patch(&mut self, at: usize, target: usize) {
        let off = target as i32 - (at as i32 + 1);
        match &mut self.code[at] {
            Instr::Jump(o)
            | Instr::JumpTrue(o)
            | Instr::JumpFalse(o)
            | Instr::JumpEquals(o)
            | Instr::JumpNotEquals(o)
            | Instr::JumpLess(o)
            | Instr::JumpLessOrEqual(o)
            | Instr::JumpGreater(o)
            | Instr::JumpGreaterOrEqual(o) => *o = off,
            other => panic!("patch target is not a branch: {:?}", other),
        }
    }

    pub fn patch_all(&mut self, patches: Vec<usize>, target: usize) {
        for at in patches {
            self.patch(at, target);
        }
    }

    /// Compile index expressions for an array access; multiple indices
    /// are joined with `SUBSEP` into one key.
    pub fn compile_index(&mut self, index: &[ast::Expr]) -> CResult<()> {
        for e in index {
            self.compile_expr(e)?;
        }
        if index.len() != 1 {
            self.emit(Instr::MultiIndex(index.len()));
        }
        Ok(())
    }

    /// Record a `break` in the innermost loop.
    pub fn compile_break(&mut self) -> CResult<()> {
        let for_in = match self.loop_stack.last() {
            Some(ctx) => ctx.for_in,
            None => return err("break outside a loop"),
        };
        if for_in {
            self.emit(Instr::BreakForIn);
        } else {
            let at = self.emit(Instr::Jump(0));
            self.loop_stack
                .last_mut()
                .expect("loop context")
                .exit_patches
                .push(at);
        }
        Ok(())
    }

    /// Record a `continue` in the innermost loop.
    pub fn compile_continue(&mut self) -> CResult<()> {
        if self.loop_stack.is_empty() {
            return err("continue outside a loop");
        }
        let at = self.emit(Instr::Jump(0));
        self.loop_stack
            .last_mut()
            .expect("loop context")
            .continue_patches
            .push(at);
        Ok(())
    }
}
