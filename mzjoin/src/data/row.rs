use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fmt::{Display, Formatter};
use serde::{Serialize, Deserialize};

use crate::data::feature::{FeatureRecord, RunId};
use crate::data::table::FeatureId;
use crate::error::RecordError;

/// Stable identifier of an aligned row, assigned in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl Display for RowId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cluster of features, at most one per run, believed to be the same chemical entity.
///
/// # Description
///
/// Members are referenced by their id in the master table's feature arena. All
/// aggregates (`avg_mz`, `avg_rt`, `charge`, `identities`, `representative`) are
/// derived from the members and rebuilt on every membership change, so a row can
/// only be modified through [`AlignedRow::insert`].
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignedRow {
    id: RowId,
    members: BTreeMap<RunId, FeatureId>,
    avg_mz: f64,
    avg_rt: f64,
    charge: i32,
    identities: BTreeSet<String>,
    representative: FeatureId,
}

impl AlignedRow {
    /// A new row holding a single feature.
    pub(crate) fn seed(id: RowId, feature_id: FeatureId, feature: &FeatureRecord) -> Self {
        let mut members = BTreeMap::new();
        members.insert(feature.run.clone(), feature_id);
        AlignedRow {
            id,
            members,
            avg_mz: feature.mz,
            avg_rt: feature.rt,
            charge: feature.charge,
            identities: feature.identities.clone(),
            representative: feature_id,
        }
    }

    /// Add a member and rebuild the aggregates.
    ///
    /// `arena` must already contain `feature_id`. Fails without touching the row if a
    /// feature of the same run is already a member.
    pub(crate) fn insert(&mut self, feature_id: FeatureId, arena: &[FeatureRecord]) -> Result<(), RecordError> {
        let run = arena[feature_id.0].run.clone();
        match self.members.entry(run) {
            Entry::Occupied(entry) => return Err(RecordError::DuplicateRun(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(feature_id);
            }
        }
        self.refresh(arena);
        Ok(())
    }

    fn refresh(&mut self, arena: &[FeatureRecord]) {
        let n = self.members.len() as f64;
        let mut mz_sum = 0.0;
        let mut rt_sum = 0.0;
        let mut identities = BTreeSet::new();
        let mut representative = None::<FeatureId>;

        for &fid in self.members.values() {
            let f = &arena[fid.0];
            mz_sum += f.mz;
            rt_sum += f.rt;
            identities.extend(f.identities.iter().cloned());

            // tallest wins, earliest admitted on ties
            representative = match representative {
                Some(best) => {
                    let b = &arena[best.0];
                    if f.height > b.height || (f.height == b.height && fid < best) {
                        Some(fid)
                    } else {
                        Some(best)
                    }
                }
                None => Some(fid),
            };
        }

        self.avg_mz = mz_sum / n;
        self.avg_rt = rt_sum / n;
        self.identities = identities;
        if let Some(rep) = representative {
            self.representative = rep;
        }

        let rep_charge = arena[self.representative.0].charge;
        self.charge = if rep_charge != 0 {
            rep_charge
        } else {
            self.members
                .values()
                .map(|fid| arena[fid.0].charge)
                .find(|&z| z != 0)
                .unwrap_or(0)
        };
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn members(&self) -> &BTreeMap<RunId, FeatureId> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains_run(&self, run: &RunId) -> bool {
        self.members.contains_key(run)
    }

    pub fn avg_mz(&self) -> f64 {
        self.avg_mz
    }

    pub fn avg_rt(&self) -> f64 {
        self.avg_rt
    }

    /// Charge of the representative member, else the first known member charge, else 0.
    pub fn charge(&self) -> i32 {
        self.charge
    }

    /// Union of all member identities.
    pub fn identities(&self) -> &BTreeSet<String> {
        &self.identities
    }

    /// Member with the greatest height.
    pub fn representative(&self) -> FeatureId {
        self.representative
    }
}
