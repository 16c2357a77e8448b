//! Stock-level estimation behind a small trait so a real inventory query can
//! replace the placeholder without touching detector logic.

use crate::util::stable_hash;

/// Supplies the per-item baseline the detector adds its in-window running
/// sum to when estimating current stock. Real deployments should back this
/// with the transactional stock ledger; [`PlaceholderStockLevelProvider`]
/// reproduces the hash-derived placeholder of the system being replaced.
pub trait StockLevelProvider: Send + Sync {
    fn baseline_stock(&self, item_id: &str) -> f64;
}

#[derive(Debug, Default)]
pub struct PlaceholderStockLevelProvider;

impl StockLevelProvider for PlaceholderStockLevelProvider {
    fn baseline_stock(&self, item_id: &str) -> f64 {
        (stable_hash(item_id) % 1000 + 100) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_deterministic() {
        let provider = PlaceholderStockLevelProvider;
        assert_eq!(provider.baseline_stock("I1"), provider.baseline_stock("I1"));
    }
}
