use serde::{Deserialize, Serialize};

use nmrcore::error::{PeakError, Result};

/// Default second x value when a line gives only one.
pub const DEFAULT_X1: f64 = 100.0;

/// One condition of a path series: the dataset it was measured in and its x values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathInputRow {
    pub dataset: String,
    pub x0: f64,
    pub x1: f64,
}

/// Parses the path series text format.
///
/// Each non-empty line is `<dataset> <x0> [<x1>]`, split on spaces or tabs.
/// Lines starting with `#` are ignored.
///
/// # Example
///
/// ```rust
/// # use nmrpeak::path::input::parse_path_input;
/// let rows = parse_path_input("# titration\nhsqc_0\t0.0\nhsqc_1 0.5 50\n").unwrap();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].x1, 100.0);
/// assert_eq!(rows[1].x1, 50.0);
/// ```
pub fn parse_path_input(text: &str) -> Result<Vec<PathInputRow>> {
    let mut rows = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let parse = |s: &str| -> Result<f64> {
            s.parse::<f64>().map_err(|_| PeakError::Parse {
                line: i + 1,
                message: format!("invalid number '{}'", s),
            })
        };
        let (x0, x1) = match fields.as_slice() {
            [_, x0] => (parse(*x0)?, DEFAULT_X1),
            [_, x0, x1] => (parse(*x0)?, parse(*x1)?),
            _ => {
                return Err(PeakError::Parse {
                    line: i + 1,
                    message: format!("expected 2 or 3 fields, got {}", fields.len()),
                })
            }
        };
        rows.push(PathInputRow { dataset: fields[0].to_string(), x0, x1 });
    }
    Ok(rows)
}
