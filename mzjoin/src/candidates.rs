// mzjoin/src/candidates.rs

use std::cmp::{Ordering, Reverse};
use ordered_float::OrderedFloat;
use rayon::prelude::*;

use crate::data::feature::FeatureRecord;
use crate::data::row::{AlignedRow, RowId};
use crate::data::table::MasterTable;
use crate::scoring::scorer::Scorer;

/// An admissible (row, feature) pairing of one merge pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidatePair {
    pub row: RowId,
    /// Position of the feature in the table being merged.
    pub record: usize,
    pub score: f64,
    pub mz_diff: f64,
    pub rt_diff: f64,
}

impl CandidatePair {
    #[inline]
    fn key(&self) -> (Reverse<OrderedFloat<f64>>, OrderedFloat<f64>, OrderedFloat<f64>, RowId, usize) {
        (
            Reverse(OrderedFloat(self.score)),
            OrderedFloat(self.mz_diff),
            OrderedFloat(self.rt_diff),
            self.row,
            self.record,
        )
    }

    /// Commit priority: higher score first, then smaller m/z difference, smaller RT
    /// difference, smaller row id and finally earlier feature.
    #[inline]
    pub fn priority(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Rows sorted by average m/z, for range lookups.
#[derive(Clone, Debug)]
struct RowMzIndex {
    mz: Vec<f64>,
    rows: Vec<usize>,
}

impl RowMzIndex {
    fn build(rows: &[AlignedRow]) -> Self {
        let mut order: Vec<(f64, usize)> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.avg_mz().is_finite())
            .map(|(i, r)| (r.avg_mz(), i))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let (mz, rows) = order.into_iter().unzip();
        Self { mz, rows }
    }

    /// Append the positions of rows with `lo <= avg_mz <= hi`.
    #[inline]
    fn gather(&self, lo: f64, hi: f64, out: &mut Vec<usize>) {
        if lo.is_nan() || hi.is_nan() {
            return;
        }
        let start = self.mz.partition_point(|&m| m < lo);
        for k in start..self.mz.len() {
            if self.mz[k] > hi {
                break;
            }
            out.push(self.rows[k]);
        }
    }
}

/// Every admissible pair between the rows of `table` and `records`, in commit order.
///
/// Scoring runs in parallel and only reads `table`; rejected pairs are dropped right
/// away. The m/z index limits each feature to rows that can pass the m/z window.
pub fn generate_candidates(
    table: &MasterTable,
    records: &[FeatureRecord],
    scorer: &Scorer,
) -> Vec<CandidatePair> {
    let rows = table.rows();
    let index = RowMzIndex::build(rows);

    let mut candidates: Vec<CandidatePair> = records
        .par_iter()
        .enumerate()
        .map(|(j, record)| {
            let mut local = Vec::new();
            if !record.is_valid() {
                return local;
            }

            let (lo, hi) = scorer.mz_tolerance().bounds(record.mz);
            let mut hits = Vec::new();
            index.gather(lo, hi, &mut hits);

            for i in hits {
                let row = &rows[i];
                if let Some(m) = scorer.score(row, table, record) {
                    local.push(CandidatePair {
                        row: row.id(),
                        record: j,
                        score: m.score,
                        mz_diff: m.mz_diff,
                        rt_diff: m.rt_diff,
                    });
                }
            }
            local
        })
        .flatten()
        .collect();

    candidates.par_sort_unstable_by(|a, b| a.priority(b));
    candidates
}
