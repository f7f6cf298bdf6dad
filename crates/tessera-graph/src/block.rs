use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role a block plays in a graph. `Note` blocks are authoring-only and
/// are never executed; `Agent` blocks nest a sub-graph and receive their
/// input merged under a `data` key (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
  Standard,
  Input,
  Output,
  Webhook,
  WebhookManual,
  Note,
  Agent,
}

/// A single value the block declares acceptance of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
  String,
  Number,
  Boolean,
  Object,
  Array,
  /// No coercion or type check is applied.
  Any,
}

impl ValueType {
  /// Whether `value`'s runtime type already matches this declared type.
  pub fn matches(self, value: &Value) -> bool {
    match self {
      ValueType::String => value.is_string(),
      ValueType::Number => value.is_number(),
      ValueType::Boolean => value.is_boolean(),
      ValueType::Object => value.is_object(),
      ValueType::Array => value.is_array(),
      ValueType::Any => true,
    }
  }

  /// Best-effort coercion of `value` into this declared type (§4.6 step 2).
  /// Returns `None` if no sensible conversion exists.
  pub fn coerce(self, value: &Value) -> Option<Value> {
    if self.matches(value) {
      return Some(value.clone());
    }
    match self {
      ValueType::String => Some(Value::String(match value {
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => return None,
        other => other.to_string(),
      })),
      ValueType::Number => match value {
        Value::String(s) => s.parse::<f64>().ok().and_then(|f| {
          serde_json::Number::from_f64(f).map(Value::Number)
        }),
        _ => None,
      },
      ValueType::Boolean => match value {
        Value::String(s) => match s.as_str() {
          "true" => Some(Value::Bool(true)),
          "false" => Some(Value::Bool(false)),
          _ => None,
        },
        _ => None,
      },
      ValueType::Object | ValueType::Array | ValueType::Any => None,
    }
  }
}

/// How sibling dynamic pins are aggregated into one composite value when
/// `resolve_input = true` (§4.6 step 4). A field declared `Aggregate::List`
/// collects every input key of the form `{field}_$N` (N ascending) into a
/// JSON array; `Aggregate::Dict` collects `{field}_{key}` pairs into a JSON
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
  List,
  Dict,
}

/// The declared shape of one input pin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
  pub value_type: ValueType,
  pub required: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub aggregate: Option<Aggregate>,
}

impl FieldSpec {
  pub fn required(value_type: ValueType) -> Self {
    Self {
      value_type,
      required: true,
      aggregate: None,
    }
  }

  pub fn optional(value_type: ValueType) -> Self {
    Self {
      value_type,
      required: false,
      aggregate: None,
    }
  }
}

/// Declares which pins carry credential references. The value is the
/// expected provider + credential type, checked against the credential
/// store at `add_execution` time (§4.5 step 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialFieldSpec {
  pub provider: String,
  pub credential_type: String,
}

pub type BlockInput = HashMap<String, Value>;

/// A block's declared input contract (§3). Pure data: no I/O, no knowledge
/// of the graph it's wired into.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockSchema {
  pub fields: HashMap<String, FieldSpec>,
  #[serde(default)]
  pub credentials: HashMap<String, CredentialFieldSpec>,
}

impl BlockSchema {
  pub fn get_credentials_fields(&self) -> &HashMap<String, CredentialFieldSpec> {
    &self.credentials
  }

  /// §4.6 step 2: convert non-matching data types to the expected type.
  pub fn coerce_types(&self, data: &mut BlockInput) {
    for (name, spec) in &self.fields {
      if let Some(value) = data.get(name)
        && !spec.value_type.matches(value)
        && let Some(coerced) = spec.value_type.coerce(value)
      {
        data.insert(name.clone(), coerced);
      }
    }
  }

  /// §4.6 step 3: required inbound links that haven't delivered a value yet.
  pub fn get_missing_links(&self, data: &BlockInput, input_links: &[crate::link::Link]) -> Vec<String> {
    input_links
      .iter()
      .map(|link| link.sink_name.clone())
      .filter(|sink_name| {
        self
          .fields
          .get(sink_name)
          .map(|f| f.required)
          .unwrap_or(false)
          && !data.contains_key(sink_name)
      })
      .collect()
  }

  /// §4.6 step 4: the node's static defaults/config, to be merged under the
  /// provided input (provided values win on conflict).
  pub fn get_input_defaults(&self, input_default: &BlockInput) -> BlockInput {
    input_default.clone()
  }

  /// §4.6 step 4 (resolve_input=true): aggregate sibling dynamic pins into
  /// declared composite fields.
  pub fn merge_execution_input(&self, data: BlockInput) -> BlockInput {
    let mut merged = data.clone();
    for (field, spec) in &self.fields {
      let Some(kind) = spec.aggregate else { continue };
      let prefix = format!("{field}_");
      let mut parts: Vec<(String, Value)> = data
        .iter()
        .filter(|(k, _)| k.starts_with(&prefix))
        .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
        .collect();
      if parts.is_empty() {
        continue;
      }
      match kind {
        Aggregate::List => {
          parts.sort_by(|a, b| a.0.cmp(&b.0));
          merged.insert(
            field.clone(),
            Value::Array(parts.into_iter().map(|(_, v)| v).collect()),
          );
        }
        Aggregate::Dict => {
          let obj: serde_json::Map<String, Value> = parts.into_iter().collect();
          merged.insert(field.clone(), Value::Object(obj));
        }
      }
    }
    merged
  }

  /// §4.6 step 5: required fields still missing after default/aggregate merge.
  pub fn get_missing_input(&self, data: &BlockInput) -> Vec<String> {
    self
      .fields
      .iter()
      .filter(|(name, spec)| spec.required && !data.contains_key(name.as_str()))
      .map(|(name, _)| name.clone())
      .collect()
  }

  /// §4.6 step 6: final value-vs-schema validation.
  pub fn get_mismatch_error(&self, data: &BlockInput) -> Option<String> {
    for (name, spec) in &self.fields {
      if let Some(value) = data.get(name)
        && !spec.value_type.matches(value)
      {
        return Some(format!(
          "field `{name}` expected {:?}, got {value}",
          spec.value_type
        ));
      }
    }
    None
  }
}

/// Ambient identifiers and injected credentials passed into `Block::execute`
/// (§4.2 step 4).
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
  pub graph_id: String,
  pub graph_exec_id: String,
  pub node_id: String,
  pub node_exec_id: String,
  pub user_id: String,
  pub credentials: HashMap<String, Value>,
}

/// An error raised by a block's `execute`. `User` errors are authoring
/// mistakes, logged at `info`; `Internal` errors are unexpected failures,
/// logged with a full error chain.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
  #[error("{0}")]
  User(String),
  #[error("{0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BlockError {
  pub fn message(&self) -> String {
    match self {
      BlockError::User(msg) => msg.clone(),
      BlockError::Internal(err) => err.to_string(),
    }
  }
}

pub type BlockOutputStream = Pin<Box<dyn Stream<Item = Result<(String, Value), BlockError>> + Send>>;

/// A pure unit of computation: declares an input contract and produces a
/// lazy, finite, non-restartable sequence of `(pin, value)` pairs (§3, §9).
pub trait Block: Send + Sync {
  fn id(&self) -> &str;
  fn name(&self) -> &str;
  fn block_type(&self) -> BlockType;
  fn input_schema(&self) -> &BlockSchema;
  fn execute(&self, input: Value, ctx: ExecutionContext) -> BlockOutputStream;
}

/// The block catalog (§1 out-of-scope collaborator): looks blocks up by id.
pub trait BlockCatalog: Send + Sync {
  fn get(&self, block_id: &str) -> Option<Arc<dyn Block>>;
}

#[cfg(test)]
mod tests {
  use super::*;

  fn schema() -> BlockSchema {
    let mut fields = HashMap::new();
    fields.insert("a".to_string(), FieldSpec::required(ValueType::Number));
    fields.insert("b".to_string(), FieldSpec::optional(ValueType::String));
    BlockSchema {
      fields,
      credentials: HashMap::new(),
    }
  }

  #[test]
  fn missing_input_detects_required_absent_field() {
    let schema = schema();
    let data = BlockInput::new();
    assert_eq!(schema.get_missing_input(&data), vec!["a".to_string()]);
  }

  #[test]
  fn coerce_types_converts_string_number() {
    let schema = schema();
    let mut data = BlockInput::new();
    data.insert("a".to_string(), Value::String("42".to_string()));
    schema.coerce_types(&mut data);
    assert_eq!(data["a"], serde_json::json!(42.0));
  }

  #[test]
  fn mismatch_error_reports_wrong_type() {
    let schema = schema();
    let mut data = BlockInput::new();
    data.insert("a".to_string(), Value::String("not a number".to_string()));
    assert!(schema.get_mismatch_error(&data).is_some());
  }

  #[test]
  fn aggregate_list_collects_sibling_pins_in_order() {
    let mut fields = HashMap::new();
    fields.insert(
      "items".to_string(),
      FieldSpec {
        value_type: ValueType::Array,
        required: true,
        aggregate: Some(Aggregate::List),
      },
    );
    let schema = BlockSchema {
      fields,
      credentials: HashMap::new(),
    };
    let mut data = BlockInput::new();
    data.insert("items_$1".to_string(), Value::String("second".to_string()));
    data.insert("items_$0".to_string(), Value::String("first".to_string()));
    let merged = schema.merge_execution_input(data);
    assert_eq!(
      merged["items"],
      serde_json::json!(["first", "second"])
    );
  }
}
