//! Warm starting of element and attachment impulses across steps.
//!
//! Contact impulses are never cached: contacts are regenerated every step
//! and carry no stable identity.

use crate::engine::TetConstraintSystem;
use crate::error::Result;
use tracing::debug;

/// Impulses of the element and bilateral blocks from the last solve.
#[derive(Debug, Clone, Default)]
pub struct WarmStartCache {
    element: Vec<f64>,
    bilateral: Vec<f64>,
    /// Row counts (element, bilateral) the cache was recorded for.
    shape: Option<(usize, usize)>,
}

impl WarmStartCache {
    /// Whether the cache was recorded for the given block sizes.
    pub fn matches(&self, element_rows: usize, bilateral_rows: usize) -> bool {
        self.shape == Some((element_rows, bilateral_rows))
    }

    /// Forget the recorded impulses.
    pub fn clear(&mut self) {
        self.element.clear();
        self.bilateral.clear();
        self.shape = None;
    }

    pub fn is_empty(&self) -> bool {
        self.shape.is_none()
    }
}

impl TetConstraintSystem {
    /// Seed `gamma` with scaled impulses from the previous step.
    ///
    /// If the element or bilateral row count changed since `post_solve`,
    /// both blocks start from zero instead.
    pub fn pre_solve(&self, gamma: &mut [f64]) -> Result<()> {
        let layout = self.require_layout()?;
        layout.check_len(gamma.len(), "impulse vector")?;

        let element_rows = layout.element_rows();
        let bilateral_rows = layout.bilateral_rows();
        let cache = &self.warm_start;

        if cache.matches(element_rows.len(), bilateral_rows.len()) {
            let factor = self.config.warm_start_factor;
            for (g, &old) in gamma[element_rows].iter_mut().zip(&cache.element) {
                *g = factor * old;
            }
            for (g, &old) in gamma[bilateral_rows].iter_mut().zip(&cache.bilateral) {
                *g = factor * old;
            }
        } else {
            debug!(
                element_rows = element_rows.len(),
                bilateral_rows = bilateral_rows.len(),
                "warm start cache miss, cold start"
            );
            gamma[element_rows].fill(0.0);
            gamma[bilateral_rows].fill(0.0);
        }
        Ok(())
    }

    /// Record the element and bilateral impulses of the finished solve.
    pub fn post_solve(&mut self, gamma: &[f64]) -> Result<()> {
        let layout = self.require_layout()?;
        layout.check_len(gamma.len(), "impulse vector")?;

        let element_rows = layout.element_rows();
        let bilateral_rows = layout.bilateral_rows();
        let cache = &mut self.warm_start;
        cache.shape = Some((element_rows.len(), bilateral_rows.len()));
        cache.element.clear();
        cache.element.extend_from_slice(&gamma[element_rows]);
        cache.bilateral.clear();
        cache.bilateral.extend_from_slice(&gamma[bilateral_rows]);
        Ok(())
    }

    /// Impulse cache used by `pre_solve`.
    pub fn warm_start_cache(&self) -> &WarmStartCache {
        &self.warm_start
    }

    /// Drop cached impulses so the next `pre_solve` cold starts.
    pub fn reset_warm_start(&mut self) {
        self.warm_start.clear();
    }
}
