//! Event topic derivation.
//!
//! The topic of an EVM event is the keccak256 hash of its canonical
//! signature string, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef
//!
//! Types are taken verbatim from the ABI (`tuple` stays `tuple`), in declared
//! order, without parameter names or whitespace.
//!
//! Alongside the hash every event gets two size hints used by the warehouse:
//! - `topic_length` = 1 + number of indexed inputs
//! - `data_length`  = 2 + 64 per non-indexed input (one hex-encoded 32-byte
//!   word per input, regardless of the real encoded width)

use abitopics_core::{DeriveError, TopicHash, TopicRecord};
use indexmap::IndexMap;
use serde_json::Value;
use tiny_keccak::{Hasher, Keccak};

/// Base `topic_length`: the signature slot itself.
pub const BASE_TOPIC_LENGTH: u32 = 1;
/// Base `data_length`: the `0x` prefix.
pub const BASE_DATA_LENGTH: u32 = 2;
/// Hex characters added per non-indexed input.
pub const DATA_WORD_STRIDE: u32 = 64;

/// One event input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParam {
    pub ty: String,
    pub indexed: bool,
}

/// Typed view of an ABI event entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiEvent {
    pub name: String,
    pub inputs: Vec<EventParam>,
}

impl AbiEvent {
    /// Canonical signature, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<&str> = self.inputs.iter().map(|p| p.ty.as_str()).collect();
        format!("{}({})", self.name, types.join(","))
    }

    pub fn topic(&self) -> TopicHash {
        keccak256_signature(&self.signature())
    }

    pub fn topic_length(&self) -> u32 {
        self.inputs
            .iter()
            .filter(|p| p.indexed)
            .fold(BASE_TOPIC_LENGTH, |acc, _| acc.saturating_add(1))
    }

    pub fn data_length(&self) -> u32 {
        self.inputs
            .iter()
            .filter(|p| !p.indexed)
            .fold(BASE_DATA_LENGTH, |acc, _| acc.saturating_add(DATA_WORD_STRIDE))
    }

    /// Events without any input carry nothing worth storing.
    pub fn has_parameters(&self) -> bool {
        self.topic_length() > BASE_TOPIC_LENGTH || self.data_length() > BASE_DATA_LENGTH
    }
}

/// An event together with the raw ABI entry it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedEvent {
    pub event: AbiEvent,
    pub definition: Value,
}

/// Topic → event, in declaration order.
pub type TopicMap = IndexMap<TopicHash, DerivedEvent>;

/// Compute the keccak256 topic of a signature string.
pub fn keccak256_signature(signature: &str) -> TopicHash {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    TopicHash::from_digest(output)
}

/// Parse one ABI entry.
///
/// Returns `Ok(None)` for entries that are not named events (functions,
/// constructors, fallbacks, errors).
pub fn parse_event(index: usize, entry: &Value) -> Result<Option<AbiEvent>, DeriveError> {
    let obj = entry.as_object().ok_or_else(|| DeriveError::InvalidEntry {
        index,
        reason: format!("expected object, got {entry}"),
    })?;

    let name = match obj.get("name").and_then(Value::as_str) {
        Some(n) if !n.is_empty() => n,
        _ => return Ok(None),
    };
    if obj.get("type").and_then(Value::as_str) != Some("event") {
        return Ok(None);
    }

    let raw_inputs = obj.get("inputs").ok_or_else(|| DeriveError::MissingInputs {
        event: name.to_string(),
        index,
    })?;
    let raw_inputs = raw_inputs.as_array().ok_or_else(|| DeriveError::InvalidEntry {
        index,
        reason: format!("`inputs` of event '{name}' is not an array"),
    })?;

    let mut inputs = Vec::with_capacity(raw_inputs.len());
    for (param, input) in raw_inputs.iter().enumerate() {
        let ty = input
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DeriveError::MissingType {
                event: name.to_string(),
                param,
            })?;
        let indexed = input.get("indexed").and_then(Value::as_bool).unwrap_or(false);
        inputs.push(EventParam {
            ty: ty.to_string(),
            indexed,
        });
    }

    Ok(Some(AbiEvent {
        name: name.to_string(),
        inputs,
    }))
}

/// Derive the topic map of an ABI.
///
/// A malformed event fails the whole ABI. When two entries share a topic the
/// later one replaces the earlier, keeping the earlier position.
pub fn derive_topics(abi: &[Value]) -> Result<TopicMap, DeriveError> {
    let mut topics = TopicMap::new();
    for (index, entry) in abi.iter().enumerate() {
        if let Some(event) = parse_event(index, entry)? {
            topics.insert(
                event.topic(),
                DerivedEvent {
                    event,
                    definition: entry.clone(),
                },
            );
        }
    }
    Ok(topics)
}

/// Derive topics from an ABI JSON string (the explorer's `result` field).
pub fn derive_topics_from_json(abi_json: &str) -> Result<TopicMap, DeriveError> {
    let value: Value = serde_json::from_str(abi_json).map_err(|e| DeriveError::InvalidEntry {
        index: 0,
        reason: e.to_string(),
    })?;
    match value {
        Value::Array(entries) => derive_topics(&entries),
        _ => Err(DeriveError::NotAnArray),
    }
}

/// Turn a topic map into warehouse records, dropping parameterless events.
pub fn to_records(source_contract: &str, topics: &TopicMap) -> Vec<TopicRecord> {
    topics
        .iter()
        .filter(|(_, derived)| derived.event.has_parameters())
        .map(|(topic, derived)| TopicRecord {
            topic: topic.clone(),
            source_contract: source_contract.to_string(),
            name: derived.event.name.clone(),
            abi_json: derived.definition.to_string(),
            topic_length: derived.event.topic_length(),
            data_length: derived.event.data_length(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRANSFER_TOPIC: &str =
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    fn transfer_abi() -> Vec<Value> {
        vec![json!({
            "name": "Transfer",
            "type": "event",
            "inputs": [
                {"type": "address", "indexed": true},
                {"type": "address", "indexed": true},
                {"type": "uint256", "indexed": false}
            ]
        })]
    }

    #[test]
    fn erc20_transfer_topic_and_lengths() {
        let topics = derive_topics(&transfer_abi()).unwrap();
        let records = to_records("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", &topics);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.topic.as_hex(), TRANSFER_TOPIC);
        assert_eq!(r.name, "Transfer");
        assert_eq!(r.topic_length, 3);
        assert_eq!(r.data_length, 66);
        assert_eq!(r.source_contract, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    }

    #[test]
    fn topic_is_keccak_of_signature() {
        let event = parse_event(0, &transfer_abi()[0]).unwrap().unwrap();
        assert_eq!(event.signature(), "Transfer(address,address,uint256)");
        assert_eq!(event.topic(), keccak256_signature("Transfer(address,address,uint256)"));
        // deterministic
        assert_eq!(event.topic(), event.topic());
    }

    #[test]
    fn uniswap_v3_swap_topic() {
        let fp = keccak256_signature("Swap(address,address,int256,int256,uint160,uint128,int24)");
        assert_eq!(
            fp.as_hex(),
            "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67"
        );
    }

    #[test]
    fn upgraded_topic() {
        let fp = keccak256_signature("Upgraded(address)");
        assert_eq!(
            fp.as_hex(),
            "0xbc7cd75a20ee27fd9adebab32041f755214dbc6bffa90cc0225b39da2e5c2d3b"
        );
    }

    #[test]
    fn zero_input_event_is_derived_but_not_recorded() {
        let abi = vec![json!({"name": "Paused", "type": "event", "inputs": []})];
        let topics = derive_topics(&abi).unwrap();
        assert_eq!(topics.len(), 1);
        assert!(to_records("0x00", &topics).is_empty());
    }

    #[test]
    fn only_non_indexed_inputs_are_kept() {
        let abi = vec![json!({
            "name": "Sync",
            "type": "event",
            "inputs": [
                {"name": "reserve0", "type": "uint112", "indexed": false},
                {"name": "reserve1", "type": "uint112", "indexed": false}
            ]
        })];
        let records = to_records("0x00", &derive_topics(&abi).unwrap());
        assert_eq!(records[0].topic_length, 1);
        assert_eq!(records[0].data_length, 130);
    }

    #[test]
    fn missing_indexed_flag_counts_as_data() {
        let abi = vec![json!({"name": "Ping", "type": "event", "inputs": [{"type": "uint8"}]})];
        let records = to_records("0x00", &derive_topics(&abi).unwrap());
        assert_eq!(records[0].topic_length, 1);
        assert_eq!(records[0].data_length, 66);
    }

    #[test]
    fn functions_constructors_and_nameless_entries_are_skipped() {
        let abi = vec![
            json!({"type": "constructor", "inputs": [{"type": "address"}]}),
            json!({"type": "fallback"}),
            json!({"name": "transfer", "type": "function", "inputs": [{"type": "address"}, {"type": "uint256"}]}),
            json!({"name": "", "type": "event", "inputs": []}),
            transfer_abi()[0].clone(),
        ];
        let topics = derive_topics(&abi).unwrap();
        assert_eq!(topics.len(), 1);
        assert!(topics.contains_key(&TopicHash::parse(TRANSFER_TOPIC).unwrap()));
    }

    #[test]
    fn types_are_taken_verbatim() {
        let entry = json!({
            "name": "OrderFilled",
            "type": "event",
            "inputs": [
                {"name": "order", "type": "tuple", "indexed": false,
                 "components": [{"name": "maker", "type": "address"}]},
                {"name": "ids", "type": "uint256[]", "indexed": false}
            ]
        });
        let event = parse_event(0, &entry).unwrap().unwrap();
        assert_eq!(event.signature(), "OrderFilled(tuple,uint256[])");
    }

    #[test]
    fn collision_last_write_wins_in_first_position() {
        // Same signature, different indexed flags → same topic.
        let abi = vec![
            transfer_abi()[0].clone(),
            json!({"name": "Approval", "type": "event", "inputs": [{"type": "address", "indexed": true}]}),
            json!({
                "name": "Transfer",
                "type": "event",
                "inputs": [
                    {"type": "address", "indexed": false},
                    {"type": "address", "indexed": false},
                    {"type": "uint256", "indexed": false}
                ]
            }),
        ];
        let topics = derive_topics(&abi).unwrap();
        assert_eq!(topics.len(), 2);

        let (first_topic, first) = topics.get_index(0).unwrap();
        assert_eq!(first_topic.as_hex(), TRANSFER_TOPIC);
        assert_eq!(first.event.topic_length(), 1);
        assert_eq!(first.event.data_length(), 194);
    }

    #[test]
    fn record_keeps_verbatim_definition() {
        let abi = vec![json!({
            "anonymous": false,
            "inputs": [{"indexed": true, "internalType": "address", "name": "implementation", "type": "address"}],
            "name": "Upgraded",
            "type": "event"
        })];
        let records = to_records("0x00", &derive_topics(&abi).unwrap());
        let stored: Value = serde_json::from_str(&records[0].abi_json).unwrap();
        assert_eq!(stored, abi[0]);
    }

    #[test]
    fn missing_inputs_fails_the_whole_abi() {
        let abi = vec![
            transfer_abi()[0].clone(),
            json!({"name": "Broken", "type": "event"}),
        ];
        let err = derive_topics(&abi).unwrap_err();
        assert!(matches!(err, DeriveError::MissingInputs { ref event, index: 1 } if event == "Broken"));
    }

    #[test]
    fn missing_param_type_is_an_error() {
        let abi = vec![json!({"name": "Bad", "type": "event", "inputs": [{"indexed": true}]})];
        assert!(matches!(
            derive_topics(&abi),
            Err(DeriveError::MissingType { param: 0, .. })
        ));
    }

    #[test]
    fn non_object_entry_is_an_error() {
        let abi = vec![json!("Transfer(address,address,uint256)")];
        assert!(matches!(derive_topics(&abi), Err(DeriveError::InvalidEntry { index: 0, .. })));
    }

    #[test]
    fn derive_from_json_string() {
        let json = serde_json::to_string(&transfer_abi()).unwrap();
        let topics = derive_topics_from_json(&json).unwrap();
        assert_eq!(topics.len(), 1);
        assert!(matches!(derive_topics_from_json("{}"), Err(DeriveError::NotAnArray)));
    }

    #[test]
    fn empty_abi_yields_empty_map() {
        assert!(derive_topics(&[]).unwrap().is_empty());
    }
}
