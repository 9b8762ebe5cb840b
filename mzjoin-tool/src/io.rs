use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use mzjoin::{AlignmentReport, FeatureTable, MasterTable};

/// Read a JSON feature table. A table without a name is named after its file.
pub fn read_feature_table(path: &Path) -> anyhow::Result<FeatureTable> {
    let file = File::open(path).with_context(|| format!("opening feature table {}", path.display()))?;
    let mut table: FeatureTable = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing feature table {}", path.display()))?;

    if table.name.is_empty() {
        if let Some(stem) = path.file_stem() {
            table.name = stem.to_string_lossy().into_owned();
        }
    }
    Ok(table)
}

/// One member of an aligned row, as written to the output.
#[derive(Debug, Serialize)]
pub struct MemberView {
    pub mz: f64,
    pub rt: f64,
    pub charge: i32,
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct RowView<'a> {
    pub id: u64,
    pub mz: f64,
    pub rt: f64,
    pub charge: i32,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub identities: &'a BTreeSet<String>,
    pub members: BTreeMap<&'a str, MemberView>,
}

/// The aligned feature list as written by [`write_aligned_table`].
#[derive(Debug, Serialize)]
pub struct AlignedListView<'a> {
    pub name: &'a str,
    pub rows: Vec<RowView<'a>>,
    pub report: &'a AlignmentReport,
}

impl<'a> AlignedListView<'a> {
    pub fn new(table: &'a MasterTable, report: &'a AlignmentReport) -> Self {
        let rows = table
            .rows()
            .iter()
            .map(|row| RowView {
                id: row.id().0,
                mz: row.avg_mz(),
                rt: row.avg_rt(),
                charge: row.charge(),
                identities: row.identities(),
                members: table
                    .members_of(row)
                    .map(|(run, f)| {
                        (
                            run.as_str(),
                            MemberView { mz: f.mz, rt: f.rt, charge: f.charge, height: f.height },
                        )
                    })
                    .collect(),
            })
            .collect();

        AlignedListView { name: table.name(), rows, report }
    }
}

/// Write the aligned feature list and the alignment report as one JSON document.
pub fn write_aligned_table(
    path: &Path,
    table: &MasterTable,
    report: &AlignmentReport,
    pretty: bool,
) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let view = AlignedListView::new(table, report);

    if pretty {
        serde_json::to_writer_pretty(&mut writer, &view)?;
    } else {
        serde_json::to_writer(&mut writer, &view)?;
    }
    writer.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
