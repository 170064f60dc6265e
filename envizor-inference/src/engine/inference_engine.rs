use anyhow::{Context, Result};
use log::{debug, info};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider as _,
    TensorRTExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::fmt::{Display, Formatter};
use std::ops::{Deref, DerefMut};
use std::path::Path;

pub struct OnnxSession {
    pub(crate) session: Session,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExecutionProvider {
    CPU,
    CUDA(i32),
    TensorRT(i32),
}

impl ExecutionProvider {
    /// CUDA device 0 when the provider can be loaded, CPU otherwise.
    pub fn auto() -> Self {
        match CUDAExecutionProvider::default().is_available() {
            Ok(true) => ExecutionProvider::CUDA(0),
            Ok(false) => ExecutionProvider::CPU,
            Err(e) => {
                debug!("CUDA availability probe failed: {e}");
                ExecutionProvider::CPU
            }
        }
    }
}

impl Display for ExecutionProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionProvider::CPU => write!(f, "cpu"),
            ExecutionProvider::CUDA(id) => write!(f, "cuda:{id}"),
            ExecutionProvider::TensorRT(id) => write!(f, "tensorrt:{id}"),
        }
    }
}

impl Deref for OnnxSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl DerefMut for OnnxSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

impl OnnxSession {
    pub fn new(url: impl AsRef<Path>, executor: ExecutionProvider) -> Result<Self> {
        let url = url.as_ref();
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .with_execution_providers([match executor {
                ExecutionProvider::CUDA(id) => CUDAExecutionProvider::default()
                    .with_device_id(id)
                    .build()
                    .error_on_failure(),
                ExecutionProvider::TensorRT(id) => TensorRTExecutionProvider::default()
                    .with_device_id(id)
                    .build()
                    .error_on_failure(),
                ExecutionProvider::CPU => CPUExecutionProvider::default()
                    .build()
                    .error_on_failure(),
            }])?
            .commit_from_file(url)
            .with_context(|| format!("Failed to load model {}", url.display()))?;

        info!("Loaded {} on {}", url.display(), executor);
        Ok(OnnxSession { session })
    }
}
