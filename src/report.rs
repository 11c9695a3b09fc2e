//! Report export
//!
//! JSON goes through `serde_json`. CSV rows are produced by serialising each
//! record to a JSON object first, so both formats always carry the same
//! columns.

use crate::eval::ComparisonReport;
use crate::graph::LabeledGraph;
use rankbench_solvers::PageRankResult;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// One scored node as exported
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRow {
    pub rank: usize,
    pub node: u64,
    pub label: String,
    pub score: f64,
}

/// One residual of one solver's trace
#[derive(Debug, Clone, Serialize)]
pub struct ResidualRow {
    pub solver: String,
    pub iteration: usize,
    pub residual: f64,
}

/// Scores in ranking order; `top_k` of `None` keeps every node
pub fn score_rows(result: &PageRankResult, graph: Option<&LabeledGraph>, top_k: Option<usize>) -> Vec<ScoreRow> {
    let ranking = result.ranking();
    let take = top_k.unwrap_or(ranking.len());
    ranking
        .into_iter()
        .take(take)
        .enumerate()
        .map(|(i, (node, score))| ScoreRow {
            rank: i + 1,
            node,
            label: graph.map_or_else(|| node.to_string(), |g| g.display(node)),
            score,
        })
        .collect()
}

/// Residual traces, one row per recorded iteration
pub fn residual_rows<'a>(runs: impl IntoIterator<Item = (&'a str, &'a PageRankResult)>) -> Vec<ResidualRow> {
    runs.into_iter()
        .flat_map(|(solver, result)| {
            result.residuals.iter().enumerate().map(move |(i, &residual)| ResidualRow {
                solver: solver.to_string(),
                iteration: i + 1,
                residual,
            })
        })
        .collect()
}

pub fn report_to_json(report: &ComparisonReport) -> ReportResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut out: W, value: &T) -> ReportResult<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Write serialisable records as CSV. The header is taken from the field
/// order of the first record; nothing is written for an empty slice.
pub fn write_csv<W: Write, T: Serialize>(mut out: W, records: &[T]) -> ReportResult<()> {
    let mut columns: Option<Vec<String>> = None;
    for record in records {
        let row = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            other => {
                writeln!(out, "{}", csv_cell(&other))?;
                continue;
            }
        };
        if columns.is_none() {
            let names: Vec<String> = row.keys().cloned().collect();
            writeln!(out, "{}", names.join(","))?;
            columns = Some(names);
        }
        let cells: Vec<String> = columns
            .iter()
            .flatten()
            .map(|c| row.get(c).map_or_else(String::new, csv_cell))
            .collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    Ok(())
}

/// Comparison rows as CSV
pub fn write_report_csv<W: Write>(out: W, report: &ComparisonReport) -> ReportResult<()> {
    write_csv(out, &report.rows)
}

fn csv_cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => {
            if s.contains(',') || s.contains('"') || s.contains('\n') {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.clone()
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            let json = serde_json::to_string(v).unwrap_or_default();
            format!("\"{}\"", json.replace('"', "\"\""))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{run_comparison, ComparisonSettings};
    use crate::graph::sample_graph;
    use rankbench_solvers::{CommonParams, Solver, SolverKind};

    fn report() -> ComparisonReport {
        let g = sample_graph();
        let solvers = [SolverKind::Power, SolverKind::DirectLu]
            .map(|k| Solver::from_kind(k, &CommonParams::default()));
        run_comparison(&g.view, &solvers, &ComparisonSettings::default()).unwrap()
    }

    #[test]
    fn test_report_json() {
        let json = report_to_json(&report()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"], 4);
        assert_eq!(value["rows"].as_array().unwrap().len(), 2);
        assert_eq!(value["rows"][1]["solver"], "direct_lu");
        assert!(value.get("reference").is_none());
    }

    #[test]
    fn test_report_csv() {
        let mut buf = Vec::new();
        write_report_csv(&mut buf, &report()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("solver,iterations,final_residual,converged"));
        assert!(lines[1].starts_with("power,"));
        // Direct solver has no residual trace
        assert!(lines[2].starts_with("direct_lu,0,,true,"));
    }

    #[test]
    fn test_score_rows_use_labels() {
        let g = sample_graph();
        let result = report().reference;
        let rows = score_rows(&result, Some(&g), Some(2));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].label, "C");
        assert!(rows[0].score >= rows[1].score);
        assert_eq!(score_rows(&result, None, None).len(), 4);
    }

    #[test]
    fn test_residual_rows_and_escaping() {
        let r = report();
        let runs = r.results.iter().map(|(name, res)| (name.as_str(), res));
        let rows = residual_rows(runs);
        let power = r.result("power").unwrap();
        assert_eq!(rows.len(), power.residuals.len());
        assert_eq!(rows[0].iteration, 1);

        assert_eq!(csv_cell(&Value::String("a,b".into())), "\"a,b\"");
        assert_eq!(csv_cell(&Value::String("say \"hi\"".into())), "\"say \"\"hi\"\"\"");

        let mut buf = Vec::new();
        write_csv::<_, ScoreRow>(&mut buf, &[]).unwrap();
        assert!(buf.is_empty());
    }
}
