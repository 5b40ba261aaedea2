//! Shared preprocessing helpers
//!
//! Transformations that prove useful in exploration get promoted here so the
//! training workflows and notebooks apply the same steps.

use crate::dataset::Table;
use crate::errors::{Result, StarterError};

/// Common cleaning pass.
///
/// Currently returns an untouched copy. Any real step added here must stay
/// pure (the input is never modified), total for well-formed tables and
/// idempotent.
pub fn clean_data(table: &Table) -> Table {
    table.clone()
}

/// All column names except `target`, in table order.
///
/// An absent target is an error rather than a silent pass-through, since
/// returning the full list would leak the label into the features.
pub fn get_feature_columns(table: &Table, target: &str) -> Result<Vec<String>> {
    if table.column(target).is_none() {
        return Err(StarterError::MissingColumn {
            column: target.to_string(),
            table: "feature selection input".to_string(),
        });
    }

    Ok(table
        .columns()
        .iter()
        .filter(|c| c.name != target)
        .map(|c| c.name.clone())
        .collect())
}

/// Numeric columns not named in `exclude`, in table order
pub fn numeric_feature_columns(table: &Table, exclude: &[&str]) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter(|c| c.data.is_numeric() && !exclude.contains(&c.name.as_str()))
        .map(|c| c.name.clone())
        .collect()
}

/// Columns a model trains on: numeric, neither the id nor the target.
///
/// Errors when the target is absent or no numeric feature remains.
pub fn model_feature_columns(table: &Table, id_col: &str, target: &str) -> Result<Vec<String>> {
    let candidates = get_feature_columns(table, target)?;
    let numeric = numeric_feature_columns(table, &[id_col, target]);
    let features: Vec<String> = candidates
        .into_iter()
        .filter(|c| numeric.contains(c))
        .collect();

    if features.is_empty() {
        return Err(StarterError::SchemaMismatch(
            "no numeric feature columns besides the id and target".to_string(),
        ));
    }
    Ok(features)
}
