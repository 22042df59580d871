//! seqflow: lazy, composable sequences with cooperative early termination
//!
//! Sequences are built from constructors, transformed by combinators and
//! consumed either by pulling (`next`, [`seq::Pull`]) or by driving them with
//! a callback that can stop the production at any point.
//!
//! ```
//! use seqflow::prelude::*;
//!
//! let out = tokio_test::block_on(
//!     range(0, 20, 1)
//!         .filter(|x| x % 3 == 0)
//!         .batch(2)
//!         .limit(2)
//!         .to_vec(),
//! );
//! assert_eq!(out, vec![vec![0, 3], vec![6, 9]]);
//! ```

pub mod config;
pub mod error;
pub mod seq;

pub use config::{PoolConfig, TeeConfig};
pub use error::{SeqError, SeqResult};

/// Everything needed to build and consume sequences.
pub mod prelude {
    pub use crate::config::{PoolConfig, TeeConfig};
    pub use crate::error::{SeqError, SeqResult};
    pub use crate::seq::{
        chain_all, combinations, count, cycle, cycle_slice, empty, from_iter, from_string, once, permutations,
        pool, pool_indexed, pool_map, product, range, repeat, tee, tee_with_config, unpack, unpack_map, zip,
        zip_fill, zip_slices,
    };
    pub use crate::seq::{
        BoxSequence, CombinatoricSequenceExt, ParallelSequenceExt, Pull, Sequence, SequenceExt, TeeBranch,
        TeeSequenceExt, TransformSequenceExt, WorkItem, WorkerPool,
    };
}
