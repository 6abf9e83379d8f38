use std::collections::BTreeMap;

use crate::storage::ColumnValue;

/// Wire element name to `p2p` column
const WIRE_TO_COLUMN: &[(&str, &str)] = &[
    ("from", "p2p_from"),
    ("to", "p2p_to"),
    ("type", "p2p_type"),
];

/// Rename wire fields to storage columns. Fields without a mapping are dropped.
pub fn remap_wire_fields(fields: BTreeMap<&'static str, ColumnValue>) -> Vec<(&'static str, ColumnValue)> {
    fields
        .into_iter()
        .filter_map(|(wire, value)| {
            WIRE_TO_COLUMN
                .iter()
                .find(|(name, _)| *name == wire)
                .map(|(_, column)| (*column, value))
        })
        .collect()
}
