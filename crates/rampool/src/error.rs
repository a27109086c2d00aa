// Pool setup errors. The allocation paths themselves never error: `alloc`
// signals exhaustion by returning `None` and `free` ignores offsets it
// cannot resolve.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool size {0} is not a power of two")]
    SizeNotPowerOfTwo(usize),

    #[error("pool size {size} is below the minimum chunk size {min}")]
    SizeTooSmall { size: usize, min: usize },
}
