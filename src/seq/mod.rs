//! Lazy, composable sequences
//!
//! Every combinator is a plain struct implementing [`Sequence`], built
//! either through a constructor function or an extension-trait method.
//! Nothing runs until the result is pulled or driven.

pub mod core;
pub mod constructors;
pub mod transform;
pub mod combinatorics;
pub mod tee;
pub mod parallel;

// Re-export core types
pub use self::core::{
    Apply, BoxSequence, Close, Collect, Drive, Filter, Limit, Next, Pull, Sequence, SequenceExt, TakeWhile,
};

// Re-export constructors
pub use constructors::{
    count, cycle, cycle_slice, empty, from_iter, from_string, once, range, repeat,
    Count, Cycle, Empty, Iter, Once, Range, Repeat, Step,
};

// Re-export transform combinators
pub use transform::{
    chain_all, Accumulate, Batch, Chain, ChainAll, Index, PairWise, RangeOver, TransformSequenceExt,
};

// Re-export combinatorics
pub use combinatorics::{
    combinations, permutations, product, zip, zip_fill, zip_slices,
    CombinatoricSequenceExt, Combinations, Permutations, Product, Zip, ZipFill,
};

// Re-export fan-out
pub use tee::{tee, tee_with_config, unpack, unpack_map, Keys, TeeBranch, TeeSequenceExt, Values};

// Re-export the worker pool
pub use parallel::{pool, pool_indexed, pool_map, ParallelSequenceExt, PoolValues, WorkItem, WorkerPool};
