//! Module for loading and representing grouping instances.
//!
//! An instance is a roster of members plus the number of groups to form and
//! the co-location constraints. Rosters come from CSV files, from a seeded
//! random generator or from the built-in demo roster.
//!
//! CSV layout: one header row, an optional `id` column, `div_*` columns for
//! divergent attributes, `conv_*` columns for convergent attributes and an
//! optional `preferences` column listing preferred ids separated by `;`.

use crate::context::{DistributionConstraints, GroupLayout, RunContext};
use crate::error::{GaError, Result};
use crate::member::{Member, MemberId};
use crate::weights::AttributeWeights;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A roster to be split into groups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingInstance {
    /// Name of the instance
    pub name: String,
    /// Members to assign
    pub members: Vec<Member>,
    /// Number of groups to form
    pub group_count: usize,
    /// Co-location constraints
    pub constraints: DistributionConstraints,
}

impl GroupingInstance {
    pub fn new(name: &str, members: Vec<Member>, group_count: usize) -> Self {
        GroupingInstance {
            name: name.to_string(),
            members,
            group_count,
            constraints: DistributionConstraints::default(),
        }
    }

    /// Parse a roster from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, group_count: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let id_column = headers.iter().position(|h| h == "id");
        let preference_column = headers.iter().position(|h| h == "preferences");
        let divergent_columns: Vec<usize> = headers.iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with("div_"))
            .map(|(i, _)| i)
            .collect();
        let convergent_columns: Vec<usize> = headers.iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with("conv_"))
            .map(|(i, _)| i)
            .collect();

        if divergent_columns.is_empty() && convergent_columns.is_empty() {
            return Err(GaError::config(format!(
                "{}: no div_* or conv_* attribute columns",
                path.display()
            )));
        }

        let mut members = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = row + 2;

            let id = match id_column {
                Some(col) => parse_id(field(&record, col, line)?, line)?,
                None => row,
            };

            let attribute = |col: usize| -> Result<f64> {
                let raw = field(&record, col, line)?;
                let value: f64 = raw.parse().map_err(|_| {
                    GaError::config(format!("line {}: '{}' in column {} is not a number", line, raw, &headers[col]))
                })?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(GaError::config(format!(
                        "line {}: {} in column {} is outside [0, 1]",
                        line, value, &headers[col]
                    )));
                }
                Ok(value)
            };

            let divergent = divergent_columns.iter().map(|&c| attribute(c)).collect::<Result<Vec<_>>>()?;
            let convergent = convergent_columns.iter().map(|&c| attribute(c)).collect::<Result<Vec<_>>>()?;

            let mut preferences = Vec::new();
            if let Some(col) = preference_column {
                for entry in field(&record, col, line)?.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                    preferences.push(parse_id(entry, line)?);
                }
            }

            members.push(Member::new(id, divergent, convergent).with_preferences(preferences));
        }

        let name = path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "roster".to_string());

        log::info!("Loaded {} members from {}", members.len(), path.display());

        Ok(GroupingInstance::new(&name, members, group_count))
    }

    /// `count` members with uniformly random attributes and ids `0..count`
    pub fn random(count: usize, divergent_len: usize, convergent_len: usize, group_count: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let members = (0..count)
            .map(|id| {
                let divergent = (0..divergent_len).map(|_| rng.gen::<f64>()).collect();
                let convergent = (0..convergent_len).map(|_| rng.gen::<f64>()).collect();
                Member::new(id, divergent, convergent)
            })
            .collect();

        GroupingInstance::new(&format!("random-{}-{}", count, seed), members, group_count)
    }

    /// Built-in 20-member roster split into 5 groups, with members 1 and 11
    /// to be aggregated and members 0 and 16 to be separated
    pub fn demo() -> Self {
        const ROSTER: [(&[MemberId], [f64; 3], [f64; 3]); 20] = [
            (&[], [0.23, 0.50, 0.70], [0.50, 0.60, 0.70]),
            (&[], [0.80, 0.60, 0.45], [0.32, 0.59, 0.67]),
            (&[0], [0.60, 0.60, 0.70], [0.40, 0.45, 0.80]),
            (&[4], [0.70, 0.73, 0.78], [0.67, 0.65, 0.60]),
            (&[3], [0.55, 0.83, 0.70], [0.89, 0.59, 0.55]),
            (&[], [0.80, 0.67, 0.45], [0.90, 0.75, 0.87]),
            (&[14], [0.63, 0.50, 0.40], [0.67, 0.75, 0.45]),
            (&[1], [0.72, 0.61, 0.75], [0.52, 0.59, 0.77]),
            (&[], [0.65, 0.58, 0.78], [0.39, 0.85, 0.90]),
            (&[], [0.72, 0.63, 0.82], [0.66, 0.65, 0.14]),
            (&[18], [0.25, 0.40, 0.60], [0.90, 0.50, 0.45]),
            (&[], [0.80, 0.77, 0.43], [0.79, 0.65, 0.57]),
            (&[10], [0.72, 0.73, 0.67], [0.57, 0.65, 0.62]),
            (&[], [0.55, 0.73, 0.90], [0.89, 0.69, 0.45]),
            (&[6], [0.81, 0.68, 0.43], [0.53, 0.29, 0.37]),
            (&[3, 8], [0.62, 0.56, 0.43], [0.67, 0.65, 0.55]),
            (&[], [0.62, 0.68, 0.71], [0.52, 0.64, 0.75]),
            (&[], [0.65, 0.48, 0.68], [0.38, 0.82, 0.19]),
            (&[12], [0.74, 0.63, 0.72], [0.46, 0.65, 0.14]),
            (&[], [0.26, 0.58, 0.85], [0.84, 0.53, 0.49]),
        ];

        let members = ROSTER.iter()
            .enumerate()
            .map(|(id, (prefs, div, conv))| {
                Member::new(id, div.to_vec(), conv.to_vec()).with_preferences(prefs.iter().copied())
            })
            .collect();

        GroupingInstance::new("demo", members, 5)
            .with_aggregate([1, 11])
            .with_separate([0, 16])
    }

    /// Members that should share a group
    pub fn with_aggregate<I: IntoIterator<Item = MemberId>>(mut self, ids: I) -> Self {
        self.constraints.aggregate.extend(ids);
        self
    }

    /// Members that should not share a group
    pub fn with_separate<I: IntoIterator<Item = MemberId>>(mut self, ids: I) -> Self {
        self.constraints.separate.extend(ids);
        self
    }

    pub fn divergent_len(&self) -> usize {
        self.members.first().map_or(0, |m| m.divergent.len())
    }

    pub fn convergent_len(&self) -> usize {
        self.members.first().map_or(0, |m| m.convergent.len())
    }

    /// Validated run context for these weights
    pub fn context(&self, weights: &AttributeWeights) -> Result<RunContext> {
        RunContext::new(self.members.clone(), self.group_count, weights.clone(), self.constraints.clone())
    }

    /// Get instance statistics
    pub fn statistics(&self) -> InstanceStatistics {
        let n = self.members.len().max(1) as f64;

        let group_sizes = GroupLayout::new(self.members.len(), self.group_count)
            .map(|layout| (0..layout.group_count()).map(|g| layout.group_size(g)).collect())
            .unwrap_or_default();

        let mut divergent_means = vec![0.0; self.divergent_len()];
        let mut convergent_means = vec![0.0; self.convergent_len()];
        for m in &self.members {
            for (acc, v) in divergent_means.iter_mut().zip(&m.divergent) {
                *acc += v / n;
            }
            for (acc, v) in convergent_means.iter_mut().zip(&m.convergent) {
                *acc += v / n;
            }
        }

        InstanceStatistics {
            name: self.name.clone(),
            num_members: self.members.len(),
            group_count: self.group_count,
            group_sizes,
            divergent_means,
            convergent_means,
            preference_edges: self.members.iter().map(|m| m.preferences.len()).sum(),
            num_aggregate: self.constraints.aggregate.len(),
            num_separate: self.constraints.separate.len(),
        }
    }
}

fn field<'r>(record: &'r csv::StringRecord, col: usize, line: usize) -> Result<&'r str> {
    record.get(col)
        .ok_or_else(|| GaError::config(format!("line {}: missing column {}", line, col + 1)))
}

fn parse_id(raw: &str, line: usize) -> Result<MemberId> {
    raw.parse()
        .map_err(|_| GaError::config(format!("line {}: '{}' is not a member id", line, raw)))
}

/// Statistics about a grouping instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_members: usize,
    pub group_count: usize,
    pub group_sizes: Vec<usize>,
    pub divergent_means: Vec<f64>,
    pub convergent_means: Vec<f64>,
    pub preference_edges: usize,
    pub num_aggregate: usize,
    pub num_separate: usize,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Members: {}", self.num_members)?;
        writeln!(f, "  Groups: {} (sizes {:?})", self.group_count, self.group_sizes)?;
        writeln!(f, "  Divergent attributes: {}", self.divergent_means.len())?;
        for (i, m) in self.divergent_means.iter().enumerate() {
            writeln!(f, "    div_{}: mean {:.3}", i, m)?;
        }
        writeln!(f, "  Convergent attributes: {}", self.convergent_means.len())?;
        for (i, m) in self.convergent_means.iter().enumerate() {
            writeln!(f, "    conv_{}: mean {:.3}", i, m)?;
        }
        writeln!(f, "  Preference edges: {}", self.preference_edges)?;
        writeln!(f, "  Aggregate: {} members", self.num_aggregate)?;
        writeln!(f, "  Separate: {} members", self.num_separate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_from_csv() {
        let file = write_csv(
            "id,div_skill,div_age,conv_schedule,preferences\n\
             10,0.1,0.9,0.5,11;12\n\
             11,0.4,0.3,0.5,\n\
             12,1.0,0.0,0.25,10\n\
             13,0.7,0.5,0.75,\n",
        );

        let instance = GroupingInstance::from_csv(file.path(), 2).unwrap();
        assert_eq!(instance.members.len(), 4);
        assert_eq!(instance.divergent_len(), 2);
        assert_eq!(instance.convergent_len(), 1);

        let first = &instance.members[0];
        assert_eq!(first.id, 10);
        assert_eq!(first.divergent, vec![0.1, 0.9]);
        assert!(first.prefers(11) && first.prefers(12));
        assert!(instance.members[1].preferences.is_empty());

        assert!(instance.context(&AttributeWeights::uniform(2, 1)).is_ok());
    }

    #[test]
    fn test_from_csv_sequential_ids() {
        let file = write_csv("div_a,conv_b\n0.2,0.3\n0.4,0.5\n");
        let instance = GroupingInstance::from_csv(file.path(), 1).unwrap();
        let ids: Vec<MemberId> = instance.members.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_from_csv_rejects_bad_values() {
        let out_of_range = write_csv("div_a\n0.2\n1.5\n");
        assert!(matches!(
            GroupingInstance::from_csv(out_of_range.path(), 1),
            Err(GaError::InvalidConfiguration(_))
        ));

        let not_a_number = write_csv("div_a\nhigh\n");
        assert!(GroupingInstance::from_csv(not_a_number.path(), 1).is_err());

        let no_attributes = write_csv("id,name\n0,x\n");
        assert!(GroupingInstance::from_csv(no_attributes.path(), 1).is_err());
    }

    #[test]
    fn test_random_instance() {
        let a = GroupingInstance::random(30, 3, 2, 6, 7);
        let b = GroupingInstance::random(30, 3, 2, 6, 7);

        assert_eq!(a.members, b.members);
        assert_eq!(a.members.len(), 30);
        assert!(a.members.iter().enumerate().all(|(i, m)| m.id == i));
        assert!(a.members.iter().flat_map(|m| m.divergent.iter()).all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_demo_instance() {
        let demo = GroupingInstance::demo();
        assert_eq!(demo.members.len(), 20);
        assert_eq!(demo.group_count, 5);
        assert!(demo.members[15].prefers(3) && demo.members[15].prefers(8));
        assert!(demo.constraints.aggregate.contains(&11));
        assert!(demo.constraints.separate.contains(&16));

        let ctx = demo.context(&AttributeWeights::uniform(3, 3)).unwrap();
        assert_eq!(ctx.layout().offsets(), &[0, 4, 8, 12, 16]);
    }

    #[test]
    fn test_statistics() {
        let stats = GroupingInstance::demo().statistics();
        assert_eq!(stats.num_members, 20);
        assert_eq!(stats.group_sizes, vec![4; 5]);
        assert_eq!(stats.preference_edges, 11);
        assert_eq!(stats.num_aggregate, 2);
        assert!(format!("{}", stats).contains("Preference edges: 11"));
    }
}
