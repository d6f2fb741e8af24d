//! Strategy storage (C7): `(Symbol, Timeframe, Strategy) -> (performance
//! vector, cluster id)`, clustered by k-means once enough entries have
//! accumulated, and queried for the top-K by cluster then return,
//! one-per-symbol (§4.7). Grounded in `portfolio/_strategy.py`'s
//! `StrategyStorage`; the `asyncio.Lock` there becomes a `tokio::sync::
//! Mutex` held for the duration of `next`/`get_top`, matching §5 "Shared
//! state: ... StrategyStorage ... mutated only under an explicit async
//! mutex."

use crate::kmeans::{kmeans, minmax_normalize};
use crate::performance::PerformanceVector;
use crate::strategy::Strategy;
use ember_instrument::{Symbol, Timeframe};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Default `n_clusters` per §4.7.
pub const DEFAULT_N_CLUSTERS: usize = 3;

const KMEANS_MAX_ITERATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrategyKey {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub strategy: Strategy,
}

struct Entry {
    vector: PerformanceVector,
    cluster_id: i64,
}

pub struct StrategyStorage {
    n_clusters: usize,
    data: Mutex<IndexMap<StrategyKey, Entry>>,
}

impl StrategyStorage {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            data: Mutex::new(IndexMap::new()),
        }
    }

    /// Upsert `key`'s performance vector and, once `|keys| >= n_clusters`,
    /// re-run k-means over every stored vector (offloaded to a blocking
    /// thread per §5's hard CPU-offload requirement) and stamp each entry
    /// with its cluster id.
    pub async fn next(&self, key: StrategyKey, metrics: PerformanceVector) {
        let mut data = self.data.lock().await;
        data.insert(
            key,
            Entry {
                vector: metrics,
                cluster_id: -1,
            },
        );

        if data.len() < self.n_clusters {
            return;
        }

        let snapshot: Vec<Vec<f64>> = data
            .values()
            .map(|entry| {
                entry
                    .vector
                    .as_slice()
                    .iter()
                    .map(|d| d.to_f64().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        let n_clusters = self.n_clusters;

        let assignments = tokio::task::spawn_blocking(move || {
            let normalized = minmax_normalize(&snapshot);
            kmeans(&normalized, n_clusters, KMEANS_MAX_ITERATIONS)
        })
        .await
        .unwrap_or_default();

        for (entry, cluster_id) in data.values_mut().zip(assignments) {
            entry.cluster_id = cluster_id as i64;
        }
    }

    pub async fn reset(&self, key: &StrategyKey) {
        let mut data = self.data.lock().await;
        data.shift_remove(key);
    }

    pub async fn reset_all(&self) {
        let mut data = self.data.lock().await;
        data.clear();
    }

    /// Up to `num` keys, sorted descending by `(cluster_id, vector[0])`,
    /// one per symbol, ties broken by insertion order (§4.7, Testable
    /// Property 7). Each symbol's slot is consumed by its highest-ranked
    /// entry regardless of `positive_pnl` — a symbol whose best entry is
    /// unprofitable is dropped rather than falling through to a
    /// lower-ranked entry for the same symbol (matching
    /// `original_source/portfolio/_strategy.py::get_top`, where
    /// `selected_symbols.add(symbol)` runs unconditionally on the first
    /// occurrence of each symbol and only the `positive_pnl` check gates
    /// inclusion in the result; see DESIGN.md Open Question 5).
    pub async fn get_top(&self, num: usize, positive_pnl: bool) -> Vec<StrategyKey> {
        let data = self.data.lock().await;

        let mut ordered: Vec<&StrategyKey> = data.keys().collect();
        ordered.sort_by(|a, b| {
            let ea = &data[*a];
            let eb = &data[*b];
            eb.cluster_id
                .cmp(&ea.cluster_id)
                .then_with(|| eb.vector.total_return().cmp(&ea.vector.total_return()))
        });

        let mut selected_symbols = HashSet::new();
        let mut top = Vec::with_capacity(num);
        for key in ordered {
            if !selected_symbols.insert(key.symbol.clone()) {
                continue;
            }
            let entry = &data[key];
            if positive_pnl && entry.vector.net_pnl() <= Decimal::ZERO {
                continue;
            }
            top.push(key.clone());
            if top.len() >= num {
                break;
            }
        }
        top
    }
}

impl Default for StrategyStorage {
    fn default() -> Self {
        Self::new(DEFAULT_N_CLUSTERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn symbol(name: &str) -> Symbol {
        Symbol::try_new(name, dec!(0.001), 3, 2, dec!(0.0006), dec!(0.0002)).unwrap()
    }

    fn key(symbol_name: &str, strategy: &str) -> StrategyKey {
        StrategyKey {
            symbol: symbol(symbol_name),
            timeframe: Timeframe::M1,
            strategy: Strategy::new(strategy),
        }
    }

    /// S6 — Top-K one-per-symbol.
    #[tokio::test]
    async fn get_top_returns_one_key_per_symbol_after_clustering() {
        let storage = StrategyStorage::new(3);

        storage
            .next(key("A", "s1"), PerformanceVector::new(vec![dec!(1.0), dec!(1)]))
            .await;
        storage
            .next(key("A", "s2"), PerformanceVector::new(vec![dec!(2.0), dec!(1)]))
            .await;
        storage
            .next(key("B", "s3"), PerformanceVector::new(vec![dec!(0.5), dec!(1)]))
            .await;

        let top = storage.get_top(2, true).await;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].symbol.name.as_str(), "A");
        assert_eq!(top[0].strategy, Strategy::new("s2"));
        assert_eq!(top[1].symbol.name.as_str(), "B");
    }

    #[tokio::test]
    async fn positive_pnl_filter_excludes_non_positive_net_pnl() {
        let storage = StrategyStorage::new(1);
        storage
            .next(key("A", "s1"), PerformanceVector::new(vec![dec!(5.0), dec!(-1)]))
            .await;
        storage
            .next(key("B", "s2"), PerformanceVector::new(vec![dec!(1.0), dec!(1)]))
            .await;

        let top = storage.get_top(10, true).await;
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].symbol.name.as_str(), "B");

        let all = storage.get_top(10, false).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn reset_removes_a_single_key() {
        let storage = StrategyStorage::new(1);
        let k = key("A", "s1");
        storage
            .next(k.clone(), PerformanceVector::new(vec![dec!(1), dec!(1)]))
            .await;
        storage.reset(&k).await;
        let top = storage.get_top(10, false).await;
        assert!(top.is_empty());
    }
}
