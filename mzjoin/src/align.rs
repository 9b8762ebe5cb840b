// mzjoin/src/align.rs

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::candidates::generate_candidates;
use crate::data::feature::FeatureRecord;
use crate::data::table::{FeatureTable, MasterTable};
use crate::error::{AlignmentError, RecordError};
use crate::scoring::isotope::PatternSimilarity;
use crate::scoring::params::JoinParameters;
use crate::scoring::scorer::Scorer;

/// Cooperative stop signal, checked before every merge pass.
///
/// A request is consumed by the run that ends after it; the next `align` starts clear.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared, advisory completion counter (tables processed / tables given).
#[derive(Clone, Debug, Default)]
pub struct Progress {
    done: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
}

impl Progress {
    fn start(&self, total: usize) {
        self.finished.store(false, Ordering::SeqCst);
        self.done.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    fn advance(&self) {
        self.done.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn tables_done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total_tables(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Fraction in `[0, 1]`; never decreases during a run.
    pub fn fraction(&self) -> f64 {
        if self.finished.load(Ordering::SeqCst) {
            return 1.0;
        }
        let total = self.total_tables();
        if total == 0 {
            return 0.0;
        }
        (self.tables_done() as f64 / total as f64).min(1.0)
    }
}

/// Where the aligner is in its run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AlignmentState {
    Idle,
    Seeding,
    /// Merging the k-th table after the seed (1-based).
    Merging(usize),
    Done,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AlignmentStatus {
    Finished,
    Cancelled,
}

/// A feature left out of the alignment, with its position in the input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExcludedRecord {
    pub table: usize,
    pub record: usize,
    pub error: RecordError,
}

/// What one merge pass did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Index of the merged table in the caller's input order.
    pub table: usize,
    pub candidates: usize,
    pub matched: usize,
    pub new_rows: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AlignmentReport {
    pub tables: usize,
    /// Index of the seed table in the caller's input order.
    pub seed_table: Option<usize>,
    pub seeded_rows: usize,
    pub passes: Vec<PassSummary>,
    pub excluded: Vec<ExcludedRecord>,
}

impl AlignmentReport {
    fn new(tables: usize) -> Self {
        AlignmentReport { tables, ..Default::default() }
    }

    pub fn matches(&self) -> usize {
        self.passes.iter().map(|p| p.matched).sum()
    }

    pub fn rows_created(&self) -> usize {
        self.seeded_rows + self.passes.iter().map(|p| p.new_rows).sum::<usize>()
    }

    fn exclude(&mut self, table: usize, record: usize, error: RecordError) {
        warn!("table {table}, feature {record} excluded from alignment: {error}");
        self.excluded.push(ExcludedRecord { table, record, error });
    }
}

#[derive(Clone, Debug)]
pub struct AlignmentOutcome {
    pub table: MasterTable,
    pub status: AlignmentStatus,
    pub report: AlignmentReport,
}

/// Greedy, score-ordered join of feature tables into one master table.
///
/// The first table (or the largest, see [`JoinParameters::seed_with_largest`]) seeds
/// the master table with one row per feature. Each following table is merged in one
/// pass: all admissible (row, feature) pairs are scored, sorted by commit priority and
/// committed best-first, every row and every feature being used at most once per
/// pass. Features left over become new rows.
#[derive(Clone, Debug)]
pub struct JoinAligner {
    params: JoinParameters,
    scorer: Scorer,
    cancel: CancellationToken,
    progress: Progress,
    state: AlignmentState,
}

impl JoinAligner {
    /// Validate `params` and build the aligner.
    pub fn new(params: JoinParameters) -> Result<Self, AlignmentError> {
        let scorer = Scorer::new(&params)?;
        Ok(JoinAligner {
            params,
            scorer,
            cancel: CancellationToken::new(),
            progress: Progress::default(),
            state: AlignmentState::Idle,
        })
    }

    /// Use a custom isotope-pattern similarity with the given weight.
    pub fn with_pattern_similarity(
        mut self,
        weight: f64,
        similarity: impl PatternSimilarity + 'static,
    ) -> Result<Self, AlignmentError> {
        self.scorer = self.scorer.with_pattern_similarity(weight, similarity)?;
        Ok(self)
    }

    pub fn params(&self) -> &JoinParameters {
        &self.params
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn state(&self) -> AlignmentState {
        self.state
    }

    /// Handle that stops the run before its next merge pass.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    /// Align `tables` into a master table.
    ///
    /// Invalid features are excluded and listed in the report. When cancelled, the
    /// returned table holds every pass completed so far.
    pub fn align(&mut self, tables: Vec<FeatureTable>) -> AlignmentOutcome {
        let total = tables.len();
        self.progress.start(total);
        let mut report = AlignmentReport::new(total);
        let mut master = MasterTable::new(self.params.name.clone());

        let mut ordered: Vec<(usize, FeatureTable)> = tables.into_iter().enumerate().collect();
        if self.params.seed_with_largest {
            if let Some(largest) = largest_table(&ordered) {
                let seed = ordered.remove(largest);
                ordered.insert(0, seed);
            }
        }

        let mut ordered = ordered.into_iter();
        let Some((seed_index, seed)) = ordered.next() else {
            info!("no feature tables given, nothing to align");
            return self.finish(master, AlignmentStatus::Finished, report);
        };

        self.state = AlignmentState::Seeding;
        self.seed(&mut master, seed_index, seed, &mut report);
        self.progress.advance();

        for (k, (index, table)) in ordered.enumerate() {
            if self.cancel.is_cancelled() {
                warn!(
                    "alignment cancelled after {} of {} tables, keeping {} rows",
                    self.progress.tables_done(),
                    total,
                    master.len()
                );
                return self.finish(master, AlignmentStatus::Cancelled, report);
            }

            self.state = AlignmentState::Merging(k + 1);
            let summary = self.merge(&mut master, index, table, &mut report);
            info!(
                "merged table {} ({}/{}): {} candidates, {} matched, {} new rows, {} rows total",
                index,
                k + 2,
                total,
                summary.candidates,
                summary.matched,
                summary.new_rows,
                master.len()
            );
            report.passes.push(summary);
            self.progress.advance();
        }

        self.finish(master, AlignmentStatus::Finished, report)
    }

    fn finish(&mut self, table: MasterTable, status: AlignmentStatus, report: AlignmentReport) -> AlignmentOutcome {
        self.cancel.reset();
        match status {
            AlignmentStatus::Finished => {
                self.state = AlignmentState::Done;
                self.progress.finish();
            }
            AlignmentStatus::Cancelled => self.state = AlignmentState::Cancelled,
        }
        AlignmentOutcome { table, status, report }
    }

    fn seed(&self, master: &mut MasterTable, index: usize, table: FeatureTable, report: &mut AlignmentReport) {
        report.seed_table = Some(index);
        for (j, record) in table.records.into_iter().enumerate() {
            match record.validate() {
                Ok(()) => {
                    master.push_row(record);
                    report.seeded_rows += 1;
                }
                Err(e) => report.exclude(index, j, e),
            }
        }
        info!(
            "seeded '{}' from table {} '{}' with {} rows",
            master.name(),
            index,
            table.name,
            report.seeded_rows
        );
    }

    fn merge(&self, master: &mut MasterTable, index: usize, table: FeatureTable, report: &mut AlignmentReport) -> PassSummary {
        for (j, record) in table.records.iter().enumerate() {
            if let Err(e) = record.validate() {
                report.exclude(index, j, e);
            }
        }

        let candidates = generate_candidates(master, &table.records, &self.scorer);
        debug!("table {} '{}': {} admissible pairs", index, table.name, candidates.len());

        let mut row_used = vec![false; master.len()];
        let mut slots: Vec<Option<FeatureRecord>> = table.records.into_iter().map(Some).collect();
        let mut matched = 0;

        for c in &candidates {
            let r = c.row.0 as usize;
            if row_used[r] {
                continue;
            }
            let Some(record) = slots[c.record].take() else { continue };
            match master.commit(c.row, record) {
                Ok(()) => {
                    row_used[r] = true;
                    matched += 1;
                }
                Err((e, record)) => {
                    warn!("table {}, feature {} not committed to row {}: {}", index, c.record, c.row, e);
                    slots[c.record] = Some(record);
                }
            }
        }

        let mut new_rows = 0;
        for record in slots.into_iter().flatten() {
            if record.is_valid() {
                master.push_row(record);
                new_rows += 1;
            }
        }

        PassSummary {
            table: index,
            candidates: candidates.len(),
            matched,
            new_rows,
        }
    }
}

/// Position of the largest table, the first one among equals.
fn largest_table(tables: &[(usize, FeatureTable)]) -> Option<usize> {
    tables
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (pos, (_, t))| match best {
            Some((_, len)) if len >= t.len() => best,
            _ => Some((pos, t.len())),
        })
        .map(|(pos, _)| pos)
}
