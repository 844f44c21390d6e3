#![doc(issue_tracker_base_url = "https://github.com/factordynamics/faro/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Feature engineering for Faro.
//!
//! Turns point-in-time joined statements into one feature row per
//! `(symbol, date)`: statement fields normalized by market capitalization,
//! annualized log-yields over the past and next year, outperformance flags,
//! coarse sectors, and optionally first-differenced "evolution" columns.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use faro_features::{FeaturePass, evolution, load_joined_tables};
//!
//! let joined = load_joined_tables(&[Path::new("data/sp500/data.csv")])?;
//! let (table, diagnostics) = FeaturePass::default().run(joined);
//! table.write_csv(Path::new("data/data_clean.csv"))?;
//! evolution(&table).write_csv(Path::new("data/data_evol_clean.csv"))?;
//! # Ok::<(), faro_traits::FaroError>(())
//! ```

pub mod pass;
pub mod sector;
pub mod table;
pub mod yields;

pub use pass::{FeatureConfig, FeatureDiagnostics, FeaturePass, columns_to_drop, evolution};
pub use sector::SectorMap;
pub use table::{ABS_SUFFIX, Cell, DEFAULT_TARGET, EVOL_SUFFIX, FeatureRow, FeatureTable};

use std::path::Path;

use faro_join::JoinedRow;
use faro_traits::Result;

/// Read and concatenate several `data.csv` files, in order.
pub fn load_joined_tables(paths: &[&Path]) -> Result<Vec<JoinedRow>> {
    let mut rows = Vec::new();
    for path in paths {
        let table = faro_join::read_joined(path)?;
        tracing::info!(path = %path.display(), rows = table.len(), "Loaded joined table");
        rows.extend(table);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use faro_join::{
        AsOfJoinEngine, JoinConfig, JoinInputs, SeriesBuilder, StatementRecord, TimeSeries,
    };
    use faro_traits::Date;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn inputs() -> JoinInputs {
        let mut prices = SeriesBuilder::new("price");
        let mut reference = Vec::new();
        for (i, year) in (2017..=2021).enumerate() {
            let date = d(year, 12, 29);
            prices.push("AAA", date, 100.0 * 1.1_f64.powi(i as i32));
            prices.push("BBB", date, 50.0);
            reference.push((date, 1000.0 + 10.0 * i as f64));
        }
        let mut shares = SeriesBuilder::new("shares");
        shares.push("AAA", d(2018, 12, 31), 10.0);
        shares.push("BBB", d(2018, 12, 31), 20.0);

        let mut statements = Vec::new();
        for symbol in ["AAA", "BBB"] {
            for year in 2018..=2020 {
                statements.push(StatementRecord {
                    symbol: symbol.into(),
                    date: d(year, 12, 31),
                    fields: BTreeMap::from([
                        ("ebit".to_string(), Some(f64::from(year - 2000))),
                        ("totalRevenue".to_string(), Some(100.0)),
                    ]),
                });
            }
        }

        JoinInputs {
            statements,
            prices: prices.build().0,
            dividends: SeriesBuilder::new("dividends").build().0,
            shares: shares.build().0,
            sectors: BTreeMap::from([
                ("AAA".to_string(), "Information Technology".to_string()),
                ("BBB".to_string(), "Utilities".to_string()),
            ]),
            reference: TimeSeries::from_points(reference).0,
        }
    }

    fn run_pipeline() -> Vec<u8> {
        let (joined, _) = AsOfJoinEngine::new(JoinConfig::default())
            .join(&inputs())
            .unwrap();
        let (table, _) = FeaturePass::default().run(joined);
        table.to_frame().unwrap().to_csv_bytes().unwrap()
    }

    #[test]
    fn test_rerun_is_byte_identical() {
        let first = run_pipeline();
        let second = run_pipeline();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_rows_are_point_in_time() {
        let (joined, _) = AsOfJoinEngine::default().join(&inputs()).unwrap();
        let (table, _) = FeaturePass::default().run(joined);
        assert_eq!(table.len(), 6);
        for row in &table.rows {
            let dp = row.date_price.unwrap();
            assert!(dp <= row.date);
            assert!(row.date_price_previous.unwrap() <= dp);
        }
        let aaa = &table.rows[0];
        assert_eq!(aaa.sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn test_file_round_trip_through_joined_csv() {
        let dir = std::env::temp_dir().join(format!("faro-features-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("data.csv");

        let (joined, _) = AsOfJoinEngine::default().join(&inputs()).unwrap();
        faro_join::write_joined(&joined, &path).unwrap();
        let loaded = load_joined_tables(&[path.as_path(), path.as_path()]).unwrap();
        assert_eq!(loaded.len(), 2 * joined.len());

        let (table, diagnostics) = FeaturePass::default().run(loaded);
        assert_eq!(diagnostics.duplicate_rows, joined.len());
        assert_eq!(table.len(), 6);

        let _ = std::fs::remove_dir_all(dir);
    }
}
