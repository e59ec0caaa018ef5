//! Call frames.
//!
//! A user call's scalar parameters (and the extra parameters AWK uses as
//! locals) are contiguous slots on the value stack starting at `base`.
//! Array parameters are translated through `arrays`: local array slot i
//! resolves to arena ID `arrays[i]`, which is the caller's array for
//! passed arguments and a fresh temporary otherwise.

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    /// Index of the first scalar slot on the value stack.
    pub base: usize,
    /// Arena IDs for the function's array parameters, declaration order.
    pub arrays: Vec<usize>,
    /// Arena length at call entry; temporaries above it are freed on
    /// return.
    pub arena_mark: usize,
}
