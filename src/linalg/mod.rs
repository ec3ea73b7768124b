pub mod cholesky;
pub mod incremental;
pub mod kernels;
