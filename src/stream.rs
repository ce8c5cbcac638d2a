use std::collections::BTreeMap;

use crate::record::RawRecord;

/// One element of an ordered per-sensor stream, carrying its 1-based,
/// gap-free sequence number. Sequence numbers are per stream, never global.
#[derive(Debug, Clone)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub item: T,
}

/// Sorts a single-sensor stream by the given key and assigns sequence
/// numbers 1..=n.
///
/// The sort is stable, so readings with identical keys keep their arrival
/// order; repeated runs over the same batch always produce the same
/// assignment.
pub fn order_stream<T, K, F>(items: Vec<T>, key: F) -> Vec<Sequenced<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut items = items;
    items.sort_by(|a, b| key(a).cmp(&key(b)));
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| Sequenced {
            seq: idx as u64 + 1,
            item,
        })
        .collect()
}

/// Splits a mixed batch into per-sensor streams, preserving arrival order
/// inside each stream. Sensor order is deterministic (lexicographic).
pub fn group_by_sensor(records: Vec<RawRecord>) -> BTreeMap<String, Vec<RawRecord>> {
    let mut grouped: BTreeMap<String, Vec<RawRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.sensor_id.clone())
            .or_default()
            .push(record);
    }
    grouped
}
