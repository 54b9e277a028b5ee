use serde_json::{Map, Value};

/// `(field, old, new)`; absent fields read as `null`.
pub(crate) type Change = (String, Value, Value);

/// Field-level changes between two device value bodies. The portal body is
/// a flat object, so nested values are compared whole.
pub(crate) fn changed_fields(previous: &Value, current: &Value) -> Vec<Change> {
    let empty = Map::new();
    let prev = previous.as_object().unwrap_or(&empty);
    let curr = current.as_object().unwrap_or(&empty);

    let mut changes: Vec<Change> = curr
        .iter()
        .filter(|(key, value)| prev.get(key.as_str()) != Some(*value))
        .map(|(key, value)| {
            let old = prev.get(key).cloned().unwrap_or(Value::Null);
            (key.clone(), old, value.clone())
        })
        .collect();
    changes.extend(
        prev.iter()
            .filter(|(key, _)| !curr.contains_key(key.as_str()))
            .map(|(key, old)| (key.clone(), old.clone(), Value::Null)),
    );
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_changed_reading() {
        let prev = json!({"CH1currentRoomTemp": "19.0", "frost": "5"});
        let curr = json!({"CH1currentRoomTemp": "19.5", "frost": "5"});
        assert_eq!(
            changed_fields(&prev, &curr),
            vec![("CH1currentRoomTemp".to_string(), json!("19.0"), json!("19.5"))]
        );
    }

    #[test]
    fn identical_bodies_have_no_changes() {
        let body = json!({"CH1currentSetPoint": "21.5", "CH1heatOnOff": "0"});
        assert!(changed_fields(&body, &body).is_empty());
    }

    #[test]
    fn added_and_removed_fields() {
        let prev = json!({"frost": "5"});
        let curr = json!({"CH1heatOnOffStatus": "1"});
        let changes = changed_fields(&prev, &curr);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], ("CH1heatOnOffStatus".to_string(), Value::Null, json!("1")));
        assert_eq!(changes[1], ("frost".to_string(), json!("5"), Value::Null));
    }
}
