//! Hierarchical predictor: memorized addresses, then the binary gate,
//! then family attribution.
//!
//! PRIORITY ORDER (fixed, never reordered):
//!   1. Known address  → memorized label, whatever the models think.
//!   2. Detector says background → background label.
//!   3. Otherwise      → family classifier's label (never background).
//!
//! RULES:
//!   - Output has one label per input row, in input order.
//!   - Each tier only sees the rows the previous tiers passed on.
//!   - Nothing here is mutated after construction.

use crate::{
    classifier::FittedModel,
    error::{HeistError, HeistResult},
    lookup::KnownAddressLookup,
    table::FeatureTable,
    types::{Label, DETECTOR_BACKGROUND, DETECTOR_RANSOMWARE},
};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Which tier produced a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    KnownAddress,
    Background,
    Family,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnownAddress => "known_address",
            Self::Background => "background",
            Self::Family => "family",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub label: Label,
    pub route: Route,
}

/// Detector targets for a labeled target vector.
pub fn detector_targets(labels: &[Label], background: Label) -> Vec<Label> {
    labels
        .iter()
        .map(|&l| if l == background { DETECTOR_BACKGROUND } else { DETECTOR_RANSOMWARE })
        .collect()
}

#[derive(Debug)]
pub struct HierarchicalPredictor {
    lookup:     KnownAddressLookup,
    detector:   Box<dyn FittedModel>,
    family:     Box<dyn FittedModel>,
    schema:     Vec<String>,
    background: Label,
}

impl HierarchicalPredictor {
    /// `schema` is the column list both models were trained on.
    pub fn new(
        lookup: KnownAddressLookup,
        detector: Box<dyn FittedModel>,
        family: Box<dyn FittedModel>,
        schema: Vec<String>,
        background: Label,
    ) -> HeistResult<Self> {
        if detector
            .classes()
            .iter()
            .any(|&c| c != DETECTOR_BACKGROUND && c != DETECTOR_RANSOMWARE)
        {
            return Err(HeistError::DegenerateTarget {
                reason: format!(
                    "detector classes must be {DETECTOR_BACKGROUND}/{DETECTOR_RANSOMWARE}, got {:?}",
                    detector.classes()
                ),
            });
        }
        if family.classes().contains(&background) {
            return Err(HeistError::DegenerateTarget {
                reason: format!("family classifier was trained on the background label {background}"),
            });
        }
        for model in [&detector, &family] {
            if model.n_features() != schema.len() {
                return Err(HeistError::LengthMismatch {
                    left:  schema.len(),
                    right: model.n_features(),
                });
            }
        }
        Ok(Self { lookup, detector, family, schema, background })
    }

    pub fn lookup(&self) -> &KnownAddressLookup {
        &self.lookup
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn background(&self) -> Label {
        self.background
    }

    /// Label and route for every row of `table`.
    pub fn decide(&self, table: &FeatureTable) -> HeistResult<Vec<Decision>> {
        self.decide_with(&self.lookup, table)
    }

    /// Same as `decide`, with `lookup` standing in for the memorized addresses.
    pub fn decide_with(&self, lookup: &KnownAddressLookup, table: &FeatureTable) -> HeistResult<Vec<Decision>> {
        table.ensure_same_schema(&self.schema)?;
        let mut decisions: Vec<Option<Decision>> = table
            .records()
            .iter()
            .map(|r| {
                lookup
                    .get(&r.address)
                    .map(|label| Decision { label, route: Route::KnownAddress })
            })
            .collect();

        let unseen: Vec<usize> = (0..decisions.len()).filter(|&i| decisions[i].is_none()).collect();
        if !unseen.is_empty() {
            let x = table.matrix()?;
            let gated = self.detector.predict(x.select(Axis(0), &unseen).view())?;

            let mut flagged = Vec::new();
            for (&row, &verdict) in unseen.iter().zip(&gated) {
                if verdict == DETECTOR_RANSOMWARE {
                    flagged.push(row);
                } else {
                    decisions[row] = Some(Decision { label: self.background, route: Route::Background });
                }
            }

            if !flagged.is_empty() {
                let families = self.family.predict(x.select(Axis(0), &flagged).view())?;
                for (&row, &label) in flagged.iter().zip(&families) {
                    decisions[row] = Some(Decision { label, route: Route::Family });
                }
            }
        }

        decisions
            .into_iter()
            .enumerate()
            .map(|(row, d)| {
                d.ok_or_else(|| HeistError::Other(anyhow::anyhow!("row {row} left undecided")))
            })
            .collect()
    }

    /// One label per row of `table`, in row order.
    pub fn predict(&self, table: &FeatureTable) -> HeistResult<Vec<Label>> {
        Ok(self.decide(table)?.into_iter().map(|d| d.label).collect())
    }
}
