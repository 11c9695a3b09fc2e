//! Evaluation: reference baseline, comparisons and timings

pub mod benchmark;
pub mod reference;

pub use benchmark::{
    compare_ranks, compare_scores, rank_agreement, run_comparison, timing_benchmark, top_k,
    ComparisonReport, ComparisonRow, ComparisonSettings, RankComparison, TimingStats,
};
pub use reference::{reference_pagerank, reference_pagerank_with};
