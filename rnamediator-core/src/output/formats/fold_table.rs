use std::io::{BufRead, Write};

use crate::fold::result::{Condition, ConditionRecord, FoldResult};
use crate::types::{MediatorError, Result};

const HEADER: [&str; 5] = [
    "Condition",
    "FreeNRG(gibbs)",
    "deltaG",
    "OpeningNRG",
    "Constraint",
];

/// Write a fold result as tab separated table, one condition per row
pub fn write_fold_table<W: Write>(writer: &mut W, result: &FoldResult) -> Result<()> {
    writeln!(writer, "{}", HEADER.join("\t"))?;
    for (condition, record) in result.iter() {
        writeln!(
            writer,
            "{condition}\t{}\t{}\t{}\t{}",
            record.gibbs,
            result.ddg(condition),
            record.nrg,
            record.constraint
        )?;
    }
    Ok(())
}

/// Reads a table written by [`write_fold_table`].
///
/// Pair probabilities are not stored, so the records come back without them;
/// `deltaG` is derived again from the `unconstrained` row.
///
/// # Errors
///
/// [`MediatorError::InvalidCondition`] for unknown condition names and
/// [`MediatorError::ParseError`] for short rows or bad numbers.
pub fn read_fold_table<R: BufRead>(reader: R) -> Result<FoldResult> {
    let mut result = FoldResult::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() || line.starts_with(HEADER[0]) {
            continue;
        }
        let fields: Vec<&str> = line.splitn(5, '\t').collect();
        let [condition, gibbs, _ddg, nrg, constraint] = fields.as_slice() else {
            return Err(MediatorError::ParseError(format!(
                "fold table line {}: expected 5 columns",
                index + 1
            )));
        };
        let number = |text: &str| {
            text.trim().parse::<f64>().map_err(|_| {
                MediatorError::ParseError(format!(
                    "fold table line {}: '{text}' is not a number",
                    index + 1
                ))
            })
        };
        result.insert(
            condition.parse::<Condition>()?,
            ConditionRecord::from_summary(number(gibbs)?, number(nrg)?, *constraint),
        );
    }
    Ok(result)
}
