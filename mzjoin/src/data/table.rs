use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::data::feature::{FeatureRecord, RunId};
use crate::data::isotope::IsotopePattern;
use crate::data::row::{AlignedRow, RowId};
use crate::error::RecordError;

/// Index of a feature in the master table's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub usize);

/// Features of one run, in the order they were detected / imported.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    #[serde(default)]
    pub name: String,
    pub records: Vec<FeatureRecord>,
}

impl FeatureTable {
    pub fn new(name: impl Into<String>, records: Vec<FeatureRecord>) -> Self {
        FeatureTable { name: name.into(), records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct runs referenced by the records.
    pub fn runs(&self) -> BTreeSet<&RunId> {
        self.records.iter().map(|r| &r.run).collect()
    }
}

/// The consolidated, aligned feature table.
///
/// Features are owned by an arena and addressed by [`FeatureId`]; rows refer to them
/// by id. Rows keep their creation order and `rows[i].id() == RowId(i)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterTable {
    name: String,
    features: Vec<FeatureRecord>,
    rows: Vec<AlignedRow>,
}

impl MasterTable {
    pub fn new(name: impl Into<String>) -> Self {
        MasterTable {
            name: name.into(),
            features: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&AlignedRow> {
        self.rows.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn features(&self) -> &[FeatureRecord] {
        &self.features
    }

    pub fn feature(&self, id: FeatureId) -> Option<&FeatureRecord> {
        self.features.get(id.0)
    }

    /// Members of `row` in run order.
    pub fn members_of<'a>(&'a self, row: &'a AlignedRow) -> impl Iterator<Item = (&'a RunId, &'a FeatureRecord)> + 'a {
        row.members().iter().map(move |(run, fid)| (run, &self.features[fid.0]))
    }

    /// Isotope pattern of the row's representative member, if it has one.
    pub fn representative_pattern(&self, row: &AlignedRow) -> Option<&IsotopePattern> {
        self.feature(row.representative()).and_then(|f| f.isotope_pattern.as_ref())
    }

    /// Append a new single-member row.
    pub(crate) fn push_row(&mut self, record: FeatureRecord) -> RowId {
        let id = RowId(self.rows.len() as u64);
        let fid = FeatureId(self.features.len());
        self.features.push(record);
        self.rows.push(AlignedRow::seed(id, fid, &self.features[fid.0]));
        id
    }

    /// Move `record` into the arena and make it a member of row `id`.
    ///
    /// Nothing changes if the row already holds a feature of the record's run; the
    /// record is then handed back with the error.
    pub(crate) fn commit(&mut self, id: RowId, record: FeatureRecord) -> Result<(), (RecordError, FeatureRecord)> {
        let fid = FeatureId(self.features.len());
        self.features.push(record);
        if let Err(e) = self.rows[id.0 as usize].insert(fid, &self.features) {
            if let Some(record) = self.features.pop() {
                return Err((e, record));
            }
        }
        Ok(())
    }
}
