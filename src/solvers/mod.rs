//! Captcha solvers for challenge images.

pub mod manual;
pub mod ruokuai;

pub use manual::ManualSolver;
pub use ruokuai::{RuokuaiClient, RuokuaiConfig};

use crate::error::{FetchError, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Remote image-recognition service.
#[async_trait]
pub trait OcrProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Recognize the text in `image`.
    ///
    /// `code_type` is the provider's image category, which encodes the
    /// expected character set and solution length.
    async fn recognize(&self, image: &[u8], code_type: u32) -> Result<String>;
}

/// Solver strategy, fixed when the fetcher is built.
#[derive(Debug, Clone)]
pub enum ChallengeSolver {
    /// Remote OCR provider
    Ocr(Arc<dyn OcrProvider>),
    /// Human operator on the terminal
    Manual(ManualSolver),
}

impl ChallengeSolver {
    pub fn name(&self) -> &'static str {
        match self {
            ChallengeSolver::Ocr(provider) => provider.name(),
            ChallengeSolver::Manual(_) => "manual",
        }
    }

    /// Produce the solution text for a challenge image. No retries here.
    pub async fn solve(&self, image: &[u8], code_type: u32) -> Result<String> {
        let solution = match self {
            ChallengeSolver::Ocr(provider) => provider.recognize(image, code_type).await?,
            ChallengeSolver::Manual(solver) => solver.solve(image).await?,
        };

        let solution = solution.trim();
        if solution.is_empty() {
            return Err(FetchError::SolverUnavailable(format!(
                "{} returned an empty solution",
                self.name()
            )));
        }
        Ok(solution.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FixedProvider(&'static str);

    #[async_trait]
    impl OcrProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn recognize(&self, _image: &[u8], _code_type: u32) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_solution_is_trimmed() {
        let solver = ChallengeSolver::Ocr(Arc::new(FixedProvider(" ab12\n")));
        assert_eq!(solver.solve(b"img", 3060).await.unwrap(), "ab12");
        assert_eq!(solver.name(), "fixed");
    }

    #[tokio::test]
    async fn test_empty_solution_is_unavailable() {
        let solver = ChallengeSolver::Ocr(Arc::new(FixedProvider("  ")));
        let err = solver.solve(b"img", 3060).await.unwrap_err();
        assert!(matches!(err, FetchError::SolverUnavailable(_)));
    }
}
