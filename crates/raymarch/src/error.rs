use compute::ComputeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error("render target is {width}x{height}; both sides must be non-zero")]
    InvalidSize { width: u32, height: u32 },
}
