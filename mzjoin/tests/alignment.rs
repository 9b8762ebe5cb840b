// Alignment engine integration tests
use std::collections::{BTreeMap, HashSet};

use mzjoin::data::table::FeatureId;
use mzjoin::{
    AlignmentStatus, FeatureRecord, FeatureTable, JoinAligner, JoinParameters, MasterTable, RowId,
    RunId, Scorer, ToleranceWindow,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Helper to build a table where every feature belongs to `run`
fn table(run: &str, features: &[(f64, f64)]) -> FeatureTable {
    FeatureTable::new(
        run,
        features.iter().map(|&(mz, rt)| FeatureRecord::new(run, mz, rt)).collect(),
    )
}

/// Helper to create `n_tables` runs that measure the same `n_features` compounds with jitter
fn jittered_tables(rng: &mut StdRng, n_tables: usize, n_features: usize) -> Vec<FeatureTable> {
    let compounds: Vec<(f64, f64)> = (0..n_features)
        .map(|_| (rng.gen_range(100.0..1000.0), rng.gen_range(1.0..30.0)))
        .collect();

    (0..n_tables)
        .map(|t| {
            let run = format!("run{t}");
            let mut records = Vec::new();
            for &(mz, rt) in &compounds {
                if !rng.gen_bool(0.9) {
                    continue;
                }
                records.push(
                    FeatureRecord::new(
                        run.as_str(),
                        mz + rng.gen_range(-0.004..0.004),
                        rt + rng.gen_range(-0.08..0.08),
                    )
                    .with_charge(rng.gen_range(0..4))
                    .with_height(rng.gen_range(1e3..1e6)),
                );
            }
            FeatureTable::new(run, records)
        })
        .collect()
}

fn params() -> JoinParameters {
    JoinParameters {
        mz_tolerance: ToleranceWindow::mz(0.005, 5.0),
        rt_tolerance: ToleranceWindow::rt(0.1, 0.0),
        ..Default::default()
    }
}

/// Run -> table index, for runs named `run{t}`
fn table_of(run: &str) -> usize {
    run.trim_start_matches("run").parse().unwrap()
}

/// Row membership as comparable plain data
fn membership(table: &MasterTable) -> Vec<(RowId, Vec<(String, u64, u64)>)> {
    table
        .rows()
        .iter()
        .map(|row| {
            let members = table
                .members_of(row)
                .map(|(run, f)| (run.to_string(), f.mz.to_bits(), f.rt.to_bits()))
                .collect();
            (row.id(), members)
        })
        .collect()
}

#[test]
fn test_close_features_merge() {
    let params = JoinParameters {
        mz_tolerance: ToleranceWindow::mz(0.005, 0.0),
        rt_tolerance: ToleranceWindow::rt(0.05, 0.0),
        mz_weight: 1.0,
        rt_weight: 1.0,
        ..Default::default()
    };
    let mut aligner = JoinAligner::new(params).unwrap();
    let out = aligner.align(vec![table("A", &[(100.000, 5.00)]), table("B", &[(100.002, 5.01)])]);

    assert_eq!(out.table.len(), 1);
    let runs: Vec<&str> = out.table.rows()[0].members().keys().map(|r| r.as_str()).collect();
    assert_eq!(runs, vec!["A", "B"]);
}

#[test]
fn test_tight_mz_window_prevents_merge() {
    let params = JoinParameters {
        mz_tolerance: ToleranceWindow::mz(0.0001, 0.0),
        rt_tolerance: ToleranceWindow::rt(0.05, 0.0),
        ..Default::default()
    };
    let mut aligner = JoinAligner::new(params).unwrap();
    let out = aligner.align(vec![table("A", &[(100.000, 5.00)]), table("B", &[(100.002, 5.01)])]);

    assert_eq!(out.table.len(), 2);
    assert_eq!(out.table.rows()[0].members().keys().next().unwrap().as_str(), "A");
    assert_eq!(out.table.rows()[1].members().keys().next().unwrap().as_str(), "B");
}

#[test]
fn test_tied_scores_resolve_deterministically() {
    // m/z differences are exact binary fractions so both 0.9 scores tie bit for bit
    let params = JoinParameters {
        mz_tolerance: ToleranceWindow::mz(0.625, 0.0),
        mz_weight: 1.0,
        rt_tolerance: ToleranceWindow::rt(0.1, 0.0),
        rt_weight: 0.0,
        ..Default::default()
    };
    let a = table("A", &[(64.0, 1.0), (128.0, 1.0)]);
    let b = table("B", &[(64.0625, 1.0), (63.9375, 1.0), (128.3125, 1.0)]);

    let scorer = Scorer::new(&params).unwrap();
    let mut seeded = JoinAligner::new(params.clone()).unwrap();
    let seed = seeded.align(vec![a.clone()]).table;
    let s0 = scorer.score(&seed.rows()[0], &seed, &b.records[0]).unwrap();
    let s1 = scorer.score(&seed.rows()[0], &seed, &b.records[1]).unwrap();
    let s2 = scorer.score(&seed.rows()[1], &seed, &b.records[2]).unwrap();
    assert_eq!(s0.score.to_bits(), s1.score.to_bits());
    assert!((s0.score - 0.9).abs() < 1e-12);
    assert!((s2.score - 0.5).abs() < 1e-12);

    let mut aligner = JoinAligner::new(params).unwrap();
    let out = aligner.align(vec![a, b]);
    let rows = out.table.rows();
    assert_eq!(rows.len(), 3);

    // the earlier feature wins the tie
    let b_in_row0 = out.table.feature(*rows[0].members().get(&RunId::from("B")).unwrap()).unwrap();
    assert_eq!(b_in_row0.mz, 64.0625);
    // the 0.5 pair is independent and still commits
    assert_eq!(rows[1].len(), 2);
    // the losing feature becomes a new row
    assert_eq!(rows[2].len(), 1);
    assert_eq!(rows[2].avg_mz(), 63.9375);
}

#[test]
fn test_no_row_holds_two_features_of_one_run() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut tables = jittered_tables(&mut rng, 5, 200);
    // a second table for run0 must not be able to add another run0 member
    tables.push(tables[0].clone());

    let mut aligner = JoinAligner::new(params()).unwrap();
    let out = aligner.align(tables);

    let mut ids = HashSet::new();
    for row in out.table.rows() {
        let runs: HashSet<_> = out.table.members_of(row).map(|(_, f)| f.run.clone()).collect();
        assert_eq!(runs.len(), row.len());
        for (run, fid) in row.members() {
            assert_eq!(&out.table.feature(*fid).unwrap().run, run);
            assert!(ids.insert(*fid), "feature {fid:?} owned by two rows");
        }
    }
    assert_eq!(ids.len(), out.table.features().len());
}

#[test]
fn test_committed_matches_respect_tolerances() {
    let mut rng = StdRng::seed_from_u64(11);
    let tables = jittered_tables(&mut rng, 6, 150);
    let params = params();
    let mut aligner = JoinAligner::new(params.clone()).unwrap();
    let out = aligner.align(tables);
    assert!(out.report.matches() > 0);

    // replay every row in table order: each member had to fit the running average
    for row in out.table.rows() {
        let mut members: Vec<(usize, FeatureId)> =
            row.members().iter().map(|(run, fid)| (table_of(run.as_str()), *fid)).collect();
        members.sort();

        let first = out.table.feature(members[0].1).unwrap();
        let (mut mz_sum, mut rt_sum, mut n) = (first.mz, first.rt, 1.0);
        for &(_, fid) in &members[1..] {
            let f = out.table.feature(fid).unwrap();
            assert!(params.mz_tolerance.accepts(mz_sum / n, f.mz));
            assert!(params.rt_tolerance.accepts(rt_sum / n, f.rt));
            mz_sum += f.mz;
            rt_sum += f.rt;
            n += 1.0;
        }
        assert!((row.avg_mz() - mz_sum / n).abs() < 1e-9);
        assert!((row.avg_rt() - rt_sum / n).abs() < 1e-9);
    }
}

#[test]
fn test_alignment_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(23);
    let tables = jittered_tables(&mut rng, 4, 300);

    let first = JoinAligner::new(params()).unwrap().align(tables.clone());
    let second = JoinAligner::new(params()).unwrap().align(tables.clone());

    assert_eq!(membership(&first.table), membership(&second.table));
    assert_eq!(first.report, second.report);

    // same result on a single worker thread
    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let single = pool.install(|| JoinAligner::new(params()).unwrap().align(tables));
    assert_eq!(membership(&first.table), membership(&single.table));
    assert_eq!(first.report, single.report);
}

#[test]
fn test_greedy_commit_is_stable() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..40 {
        // small crowded cases: few rows, many overlapping windows
        let a: Vec<(f64, f64)> = (0..4).map(|_| (rng.gen_range(200.0..200.02), rng.gen_range(3.0..3.2))).collect();
        let b: Vec<(f64, f64)> = (0..4).map(|_| (rng.gen_range(200.0..200.02), rng.gen_range(3.0..3.2))).collect();
        let params = JoinParameters {
            mz_tolerance: ToleranceWindow::mz(0.015, 0.0),
            rt_tolerance: ToleranceWindow::rt(0.15, 0.0),
            ..Default::default()
        };
        let scorer = Scorer::new(&params).unwrap();
        let seed = JoinAligner::new(params.clone()).unwrap().align(vec![table("A", &a)]).table;
        let records = table("B", &b).records;

        let score = |row: usize, rec: usize| scorer.score(&seed.rows()[row], &seed, &records[rec]).map(|m| m.score);

        let out = JoinAligner::new(params).unwrap().align(vec![table("A", &a), table("B", &b)]);

        // committed (row, record) pairs of the single merge pass
        let mut committed = Vec::new();
        for (r, row) in out.table.rows().iter().take(a.len()).enumerate() {
            if let Some(fid) = row.members().get(&RunId::from("B")) {
                let mz = out.table.feature(*fid).unwrap().mz;
                let rec = b.iter().position(|&(m, _)| m == mz).unwrap();
                committed.push((r, rec));
            }
        }

        // every admissible pair left out is blocked by a commit that scored at least as high
        for r in 0..a.len() {
            for f in 0..b.len() {
                let Some(s) = score(r, f) else { continue };
                if committed.contains(&(r, f)) {
                    continue;
                }
                let blocked = committed
                    .iter()
                    .filter(|&&(cr, cf)| cr == r || cf == f)
                    .any(|&(cr, cf)| score(cr, cf).unwrap() >= s);
                assert!(blocked, "pair ({r}, {f}) scoring {s} was free to commit");
            }
        }

        // maximality: no admissible pair left with both sides unused
        let used_rows: HashSet<usize> = committed.iter().map(|c| c.0).collect();
        let used_recs: HashSet<usize> = committed.iter().map(|c| c.1).collect();
        for r in 0..a.len() {
            for f in 0..b.len() {
                if !used_rows.contains(&r) && !used_recs.contains(&f) {
                    assert!(score(r, f).is_none());
                }
            }
        }
    }
}

#[test]
fn test_greedy_commit_can_miss_a_better_total() {
    // best-first commit is not a maximum-weight assignment: the single best pair
    // (row 1, 200.0011) is taken first and forces row 0 onto the worse feature
    let params = JoinParameters {
        mz_tolerance: ToleranceWindow::mz(0.015, 0.0),
        rt_tolerance: ToleranceWindow::rt(0.1, 0.0),
        ..Default::default()
    };
    let a = table("A", &[(200.0, 3.0), (200.002, 3.0)]);
    let b = table("B", &[(200.0011, 3.0), (200.0029, 3.0)]);

    let scorer = Scorer::new(&params).unwrap();
    let seed = JoinAligner::new(params.clone()).unwrap().align(vec![a.clone()]).table;
    let score = |row: usize, rec: usize| scorer.score(&seed.rows()[row], &seed, &b.records[rec]).unwrap().score;

    let out = JoinAligner::new(params).unwrap().align(vec![a, b.clone()]);
    let partner = |row: usize| {
        let fid = out.table.rows()[row].members()[&RunId::from("B")];
        out.table.feature(fid).unwrap().mz
    };
    assert_eq!(partner(0), 200.0029);
    assert_eq!(partner(1), 200.0011);

    let committed = score(0, 1) + score(1, 0);
    let swapped = score(0, 0) + score(1, 1);
    assert!((committed - 3.746667).abs() < 1e-5);
    assert!((swapped - 3.866667).abs() < 1e-5);
    assert!(swapped > committed);
}

#[test]
fn test_single_table_against_itself_with_zero_width_windows() {
    let params = JoinParameters {
        mz_tolerance: ToleranceWindow::mz(0.0, 0.0),
        rt_tolerance: ToleranceWindow::rt(0.0, 0.0),
        ..Default::default()
    };
    let t = table("A", &[(150.0, 2.0), (150.0, 2.0), (300.5, 7.25), (412.25, 9.0)]);
    let mut aligner = JoinAligner::new(params).unwrap();
    let out = aligner.align(vec![t.clone(), t.clone()]);

    // the copy belongs to the same run, so nothing may merge into the seed rows
    assert_eq!(out.report.matches(), 0);
    assert_eq!(out.table.len(), 2 * t.len());
    for (row, record) in out.table.rows().iter().zip(t.records.iter().chain(t.records.iter())) {
        assert_eq!(row.len(), 1);
        assert_eq!(row.avg_mz(), record.mz);
        assert_eq!(row.avg_rt(), record.rt);
    }

    let single = JoinAligner::new(JoinParameters::default()).unwrap().align(vec![t.clone()]);
    assert_eq!(single.table.len(), t.len());
    assert_eq!(single.status, AlignmentStatus::Finished);
}

#[test]
fn test_same_charge_never_pairs_different_charges() {
    let mut rng = StdRng::seed_from_u64(2024);
    for seed in 0..5u64 {
        let mut tables = jittered_tables(&mut rng, 4, 120);
        for t in tables.iter_mut() {
            for r in t.records.iter_mut() {
                r.charge = rng.gen_range(0..3);
            }
        }
        let mut aligner = JoinAligner::new(JoinParameters { require_same_charge: true, ..params() }).unwrap();
        let out = aligner.align(tables);

        for row in out.table.rows() {
            let charges: HashSet<i32> = out
                .table
                .members_of(row)
                .map(|(_, f)| f.charge)
                .filter(|&z| z != 0)
                .collect();
            assert!(charges.len() <= 1, "seed {seed}: row {} mixes charges {charges:?}", row.id());
        }
    }
}

#[test]
fn test_progress_reaches_one() {
    let mut rng = StdRng::seed_from_u64(5);
    let tables = jittered_tables(&mut rng, 3, 20);
    let mut aligner = JoinAligner::new(params()).unwrap();
    let progress = aligner.progress();
    assert_eq!(progress.fraction(), 0.0);
    let out = aligner.align(tables);
    assert_eq!(progress.fraction(), 1.0);
    assert_eq!(progress.tables_done(), 3);

    let per_run: BTreeMap<String, usize> = out
        .table
        .features()
        .iter()
        .fold(BTreeMap::new(), |mut acc, f| {
            *acc.entry(f.run.to_string()).or_default() += 1;
            acc
        });
    assert_eq!(per_run.len(), 3);
}
