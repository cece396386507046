//! Result tables: the raw columnar table that gets archived, and the ranked
//! view that gets printed.

use std::collections::BTreeMap;

use rkyv::{Archive, Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::Error;
use crate::tuner::SearchedArchitecture;

/// One reduced trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialResult {
    pub filters0: u32,
    pub filters1: u32,
    pub filters2: u32,
    pub kernelsize0: u32,
    pub kernelsize1: u32,
    pub strides0: u32,
    pub strides1: u32,
    pub val_acc: f64,
    pub flops: u64,
    pub stacks: u8,
}

impl TrialResult {
    pub fn new(arch: &SearchedArchitecture, val_acc: f64, flops: u64) -> Self {
        Self {
            filters0: arch.filters[0],
            filters1: arch.filters[1],
            filters2: arch.filters[2],
            kernelsize0: arch.kernel_sizes[0],
            kernelsize1: arch.kernel_sizes[1],
            strides0: arch.strides[0],
            strides1: arch.strides[1],
            val_acc,
            flops,
            stacks: arch.stacks(),
        }
    }

    /// `val_acc / log10(flops)`; undefined for `flops <= 1`.
    pub fn val_acc_over_log_flops(&self) -> Option<f64> {
        (self.flops > 1).then(|| self.val_acc / (self.flops as f64).log10())
    }
}

// ─── Columnar table ────────────────────────────────────────────────

/// Column-per-field table, in the order trials were reduced.
#[derive(Archive, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[rkyv(derive(Debug))]
pub struct ResultsTable {
    pub filters0: Vec<u32>,
    pub filters1: Vec<u32>,
    pub filters2: Vec<u32>,
    pub kernelsize0: Vec<u32>,
    pub kernelsize1: Vec<u32>,
    pub strides0: Vec<u32>,
    pub strides1: Vec<u32>,
    pub val_acc: Vec<f64>,
    pub flops: Vec<u64>,
    pub stacks: Vec<u8>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: TrialResult) {
        self.filters0.push(row.filters0);
        self.filters1.push(row.filters1);
        self.filters2.push(row.filters2);
        self.kernelsize0.push(row.kernelsize0);
        self.kernelsize1.push(row.kernelsize1);
        self.strides0.push(row.strides0);
        self.strides1.push(row.strides1);
        self.val_acc.push(row.val_acc);
        self.flops.push(row.flops);
        self.stacks.push(row.stacks);
    }

    pub fn len(&self) -> usize {
        self.val_acc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.val_acc.is_empty()
    }

    /// Whether every column has the same length. Always true for tables
    /// built with [`push`](Self::push); checked on snapshots read from disk.
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        [
            self.filters0.len(),
            self.filters1.len(),
            self.filters2.len(),
            self.kernelsize0.len(),
            self.kernelsize1.len(),
            self.strides0.len(),
            self.strides1.len(),
            self.flops.len(),
            self.stacks.len(),
        ]
        .iter()
        .all(|&len| len == n)
    }

    pub fn row(&self, i: usize) -> TrialResult {
        TrialResult {
            filters0: self.filters0[i],
            filters1: self.filters1[i],
            filters2: self.filters2[i],
            kernelsize0: self.kernelsize0[i],
            kernelsize1: self.kernelsize1[i],
            strides0: self.strides0[i],
            strides1: self.strides1[i],
            val_acc: self.val_acc[i],
            flops: self.flops[i],
            stacks: self.stacks[i],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = TrialResult> + '_ {
        (0..self.len()).map(|i| self.row(i))
    }
}

// ─── Ranking ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedRow {
    /// Position in the unsorted table.
    pub index: usize,
    pub result: TrialResult,
    pub score: f64,
}

/// Rows sorted by `val_acc / log10(flops)`, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedTable {
    pub rows: Vec<RankedRow>,
}

impl RankedTable {
    /// Score and sort every row. Equal scores keep table order.
    pub fn rank(table: &ResultsTable) -> Result<Self, Error> {
        let mut rows = table
            .rows()
            .enumerate()
            .map(|(index, result)| {
                let score =
                    result
                        .val_acc_over_log_flops()
                        .ok_or_else(|| Error::DegenerateFlops {
                            trial: format!("row {index}"),
                            flops: result.flops,
                        })?;
                Ok(RankedRow {
                    index,
                    result,
                    score,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        rows.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn best(&self) -> Option<&RankedRow> {
        self.rows.first()
    }

    /// Fixed-width text rendering, one line per row.
    pub fn format_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:>4} {:>8} {:>8} {:>8} {:>11} {:>11} {:>8} {:>8} {:>8} {:>12} {:>6} {:>22}\n",
            "",
            "filters0",
            "filters1",
            "filters2",
            "kernelsize0",
            "kernelsize1",
            "strides0",
            "strides1",
            "val_acc",
            "flops",
            "stacks",
            "val_acc_over_log_flops"
        ));
        for row in &self.rows {
            let r = &row.result;
            out.push_str(&format!(
                "{:>4} {:>8} {:>8} {:>8} {:>11} {:>11} {:>8} {:>8} {:>8.4} {:>12} {:>6} {:>22.6}\n",
                row.index,
                r.filters0,
                r.filters1,
                r.filters2,
                r.kernelsize0,
                r.kernelsize1,
                r.strides0,
                r.strides1,
                r.val_acc,
                r.flops,
                r.stacks,
                row.score
            ));
        }
        out
    }
}

// ─── Per-stack summary ─────────────────────────────────────────────

/// Accuracy statistics of all trials sharing a stack count.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSummary {
    pub stacks: u8,
    pub trials: usize,
    pub mean_acc: f64,
    /// Sample standard deviation; NaN for a single trial.
    pub std_dev_acc: f64,
    pub max_acc: f64,
    pub min_flops: u64,
}

impl StackSummary {
    /// One summary per stack count present, ascending.
    pub fn collect(table: &RankedTable) -> Vec<StackSummary> {
        let mut groups: BTreeMap<u8, Vec<&TrialResult>> = BTreeMap::new();
        for row in &table.rows {
            groups.entry(row.result.stacks).or_default().push(&row.result);
        }
        groups
            .into_iter()
            .map(|(stacks, rows)| {
                let accs: Vec<f64> = rows.iter().map(|r| r.val_acc).collect();
                StackSummary {
                    stacks,
                    trials: rows.len(),
                    mean_acc: accs.iter().mean(),
                    std_dev_acc: accs.iter().std_dev(),
                    max_acc: Statistics::max(accs.iter()),
                    min_flops: rows.iter().map(|r| r.flops).min().unwrap_or(0),
                }
            })
            .collect()
    }

    pub fn format_summary(summaries: &[StackSummary]) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<8} {:>7} {:>10} {:>10} {:>10} {:>14}\n",
            "Stacks", "Trials", "Mean acc", "Std acc", "Max acc", "Min FLOPs"
        ));
        out.push_str(&"-".repeat(64));
        out.push('\n');
        for s in summaries {
            let std_dev = if s.std_dev_acc.is_nan() {
                "-".to_string()
            } else {
                format!("{:.4}", s.std_dev_acc)
            };
            out.push_str(&format!(
                "{:<8} {:>7} {:>10.4} {:>10} {:>10.4} {:>14}\n",
                s.stacks, s.trials, s.mean_acc, std_dev, s.max_acc, s.min_flops
            ));
        }
        out
    }
}
