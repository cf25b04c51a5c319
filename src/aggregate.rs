//! Aggregations over the usage dataset.
//!
//! Each aggregation is implemented as a struct that implements the [Aggregation] trait. An
//! aggregation always runs over the full table; nothing is cached between requests.

use crate::dataset::UsageRecord;
use crate::models::{RegionTotal, UsageTrend};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use hashbrown::HashMap;
use serde::Serialize;
use strum_macros::Display;

/// Number of regions returned by [TopRegions] unless told otherwise.
pub const DEFAULT_TOP_REGIONS: usize = 5;

/// Kinds of aggregation, used to label metrics.
#[derive(Clone, Copy, Debug, Display, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum AggregationKind {
    UsageTrends,
    TopRegions,
}

/// Trait for aggregations over usage records.
///
/// This forms the contract between the API layer and the aggregation logic.
pub trait Aggregation {
    /// Type of each row of the result
    type Output: Serialize + Send + 'static;

    /// Label used for metrics and logging
    const KIND: AggregationKind;

    /// Execute the aggregation.
    ///
    /// # Arguments
    ///
    /// * `records`: The full table, in load order
    fn execute(&self, records: &[UsageRecord]) -> Vec<Self::Output>;
}

/// Mean CPU usage per (date, region) pair, sorted by date then region.
#[derive(Clone, Debug, Default)]
pub struct UsageTrends {
    /// Regions to include. `None` includes every region.
    pub regions: Option<Vec<String>>,
}

impl UsageTrends {
    fn includes(&self, region: &str) -> bool {
        match &self.regions {
            Some(regions) => regions.iter().any(|r| r == region),
            None => true,
        }
    }
}

impl Aggregation for UsageTrends {
    type Output = UsageTrend;
    const KIND: AggregationKind = AggregationKind::UsageTrends;

    fn execute(&self, records: &[UsageRecord]) -> Vec<UsageTrend> {
        // Ordered map keys give the (date, region) sort order for free.
        let mut partitions: BTreeMap<(NaiveDate, &str), (f64, usize)> = BTreeMap::new();
        for record in records.iter().filter(|r| self.includes(&r.region)) {
            let (sum, count) = partitions
                .entry((record.date, record.region.as_str()))
                .or_insert((0.0, 0));
            *sum += record.usage_cpu;
            *count += 1;
        }
        partitions
            .into_iter()
            .map(|((date, region), (sum, count))| UsageTrend {
                date,
                region: region.to_string(),
                usage_cpu: sum / count as f64,
            })
            .collect()
    }
}

/// The regions with the largest summed CPU usage, largest first.
///
/// Regions with equal totals are ordered by where they first appear in the table.
#[derive(Clone, Debug)]
pub struct TopRegions {
    /// Maximum number of regions to return
    pub limit: usize,
}

impl Default for TopRegions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_TOP_REGIONS,
        }
    }
}

impl Aggregation for TopRegions {
    type Output = RegionTotal;
    const KIND: AggregationKind = AggregationKind::TopRegions;

    fn execute(&self, records: &[UsageRecord]) -> Vec<RegionTotal> {
        // Totals are kept in first-seen order; the map only locates a region's slot.
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut totals: Vec<(&str, f64)> = Vec::new();
        for record in records {
            match slots.get(record.region.as_str()) {
                Some(&slot) => totals[slot].1 += record.usage_cpu,
                None => {
                    slots.insert(record.region.as_str(), totals.len());
                    totals.push((record.region.as_str(), record.usage_cpu));
                }
            }
        }

        let mut ranked: Vec<(usize, &str, f64)> = totals
            .into_iter()
            .enumerate()
            .map(|(first_seen, (region, total))| (first_seen, region, total))
            .collect();
        ranked.sort_unstable_by(|(seen_a, _, total_a), (seen_b, _, total_b)| {
            total_b.total_cmp(total_a).then(seen_a.cmp(seen_b))
        });

        ranked
            .into_iter()
            .take(self.limit)
            .map(|(_, region, total)| RegionTotal {
                region: region.to_string(),
                total_cpu_usage: total,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{date, dataset, sample_dataset};

    fn trend(date: NaiveDate, region: &str, usage_cpu: f64) -> UsageTrend {
        UsageTrend {
            date,
            region: region.to_string(),
            usage_cpu,
        }
    }

    fn total(region: &str, total_cpu_usage: f64) -> RegionTotal {
        RegionTotal {
            region: region.to_string(),
            total_cpu_usage,
        }
    }

    #[test]
    fn usage_trends_sample() {
        let dataset = sample_dataset();
        let result = UsageTrends::default().execute(dataset.records());
        assert_eq!(
            vec![
                trend(date(2024, 1, 1), "eastus", 15.0),
                trend(date(2024, 1, 2), "westus", 5.0),
            ],
            result
        );
    }

    #[test]
    fn usage_trends_sorted_by_date_then_region() {
        let d1 = date(2024, 3, 1);
        let d2 = date(2024, 2, 1);
        let dataset = dataset(&[
            (d1, "westus", 1.0),
            (d2, "westus", 2.0),
            (d1, "eastus", 3.0),
            (d2, "centralus", 4.0),
            (d1, "westus", 5.0),
        ]);
        let result = UsageTrends::default().execute(dataset.records());
        assert_eq!(
            vec![
                trend(d2, "centralus", 4.0),
                trend(d2, "westus", 2.0),
                trend(d1, "eastus", 3.0),
                trend(d1, "westus", 3.0),
            ],
            result
        );
    }

    #[test]
    fn usage_trends_one_entry_per_pair() {
        let d = date(2024, 1, 1);
        let dataset = dataset(&[
            (d, "a", 1.0),
            (d, "a", 2.0),
            (d, "a", 4.5),
            (d, "b", 0.25),
        ]);
        let result = UsageTrends::default().execute(dataset.records());
        assert_eq!(2, result.len());
        assert_eq!(7.5 / 3.0, result[0].usage_cpu);
        assert_eq!(0.25, result[1].usage_cpu);
    }

    #[test]
    fn usage_trends_region_filter() {
        let dataset = sample_dataset();
        let trends = UsageTrends {
            regions: Some(vec!["westus".to_string(), "northeurope".to_string()]),
        };
        assert_eq!(
            vec![trend(date(2024, 1, 2), "westus", 5.0)],
            trends.execute(dataset.records())
        );
    }

    #[test]
    fn usage_trends_empty() {
        assert!(UsageTrends::default().execute(&[]).is_empty());
    }

    #[test]
    fn top_regions_sample() {
        let dataset = sample_dataset();
        let result = TopRegions::default().execute(dataset.records());
        assert_eq!(vec![total("eastus", 30.0), total("westus", 5.0)], result);
    }

    #[test]
    fn top_regions_limit() {
        let d = date(2024, 1, 1);
        let rows: Vec<(NaiveDate, &str, f64)> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .enumerate()
            .map(|(i, region)| (d, *region, i as f64))
            .collect();
        let dataset = dataset(&rows);
        let result = TopRegions::default().execute(dataset.records());
        assert_eq!(
            vec![
                total("g", 6.0),
                total("f", 5.0),
                total("e", 4.0),
                total("d", 3.0),
                total("c", 2.0),
            ],
            result
        );
        let result = TopRegions { limit: 2 }.execute(dataset.records());
        assert_eq!(vec![total("g", 6.0), total("f", 5.0)], result);
    }

    #[test]
    fn top_regions_ties_first_seen_wins() {
        let d = date(2024, 1, 1);
        let dataset = dataset(&[
            (d, "zeta", 1.0),
            (d, "alpha", 3.0),
            (d, "beta", 2.0),
            (d, "zeta", 2.0),
            (d, "beta", 1.0),
        ]);
        let result = TopRegions { limit: 2 }.execute(dataset.records());
        assert_eq!(vec![total("zeta", 3.0), total("alpha", 3.0)], result);
    }

    #[test]
    fn top_regions_non_increasing() {
        let d = date(2024, 1, 1);
        let dataset = dataset(&[
            (d, "a", 0.5),
            (d, "b", 9.0),
            (d, "a", 0.5),
            (d, "c", 3.0),
            (d, "d", 3.0),
            (d, "b", -1.0),
        ]);
        let result = TopRegions::default().execute(dataset.records());
        assert_eq!(4, result.len());
        assert!(result
            .windows(2)
            .all(|pair| pair[0].total_cpu_usage >= pair[1].total_cpu_usage));
        assert_eq!(total("b", 8.0), result[0]);
        assert_eq!(total("a", 1.0), result[3]);
    }

    #[test]
    fn top_regions_empty() {
        assert!(TopRegions::default().execute(&[]).is_empty());
    }

    #[test]
    fn aggregation_kind_labels() {
        assert_eq!("usage_trends", AggregationKind::UsageTrends.to_string());
        assert_eq!("top_regions", AggregationKind::TopRegions.to_string());
    }
}
