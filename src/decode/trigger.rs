//! # Trigger Decoding
//!
//! Decodes the `trigger` sequence into ordered [`Trigger`] values.

use super::{DecodeError, Fields};
use crate::resource::{ResourceTypeId, Trigger, TriggerAction};
use serde_json::Value;

/// Decode a sequence of raw trigger blocks
///
/// Trigger order is kept. Actions keep their input order with duplicates
/// dropped; an empty actions list is passed through for the platform to
/// judge.
pub fn decode_triggers(raw: &Value) -> Result<Vec<Trigger>, DecodeError> {
    let items = raw.as_array().ok_or_else(|| DecodeError::InvalidType {
        field: "trigger".to_string(),
        expected: "a list of blocks",
    })?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_trigger(index, item))
        .collect()
}

fn decode_trigger(index: usize, item: &Value) -> Result<Trigger, DecodeError> {
    let path = format!("trigger.{index}");
    let block = item.as_object().ok_or_else(|| DecodeError::InvalidType {
        field: path.clone(),
        expected: "a block",
    })?;
    let fields = Fields::new(block, &path);

    let resource_type = fields.required_string("resource_type_id")?;
    let resource_type_id = resource_type
        .parse::<ResourceTypeId>()
        .map_err(|value| DecodeError::UnknownResourceType { index, value })?;

    let mut actions: Vec<TriggerAction> = Vec::new();
    for name in fields.string_list("actions")? {
        let action = name
            .parse::<TriggerAction>()
            .map_err(|value| DecodeError::UnknownAction { index, value })?;
        if !actions.contains(&action) {
            actions.push(action);
        }
    }

    Ok(Trigger {
        resource_type_id,
        actions,
        condition: fields.optional_string("condition")?,
    })
}
