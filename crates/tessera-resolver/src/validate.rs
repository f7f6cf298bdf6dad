use tessera_graph::{BlockCatalog, BlockInput, Node};
use thiserror::Error;

/// §4.6 Input Validation failure modes. `MissingLinks`/`MissingInput` are
/// "still waiting for data" — callers in the resolver treat these as
/// `INCOMPLETE`, not an error; `BlockNotFound`/`Mismatch` are genuine
/// validation failures.
#[derive(Debug, Error)]
pub enum ValidationError {
  #[error("block {block_id} for node {node_id} not found")]
  BlockNotFound { node_id: String, block_id: String },
  #[error("missing required links: {0:?}")]
  MissingLinks(Vec<String>),
  #[error("missing required input: {0:?}")]
  MissingInput(Vec<String>),
  #[error("{0}")]
  Mismatch(String),
}

/// §4.6: validates and completes `data` against `node`'s declared schema.
/// `resolve_input = true` additionally aggregates sibling dynamic pins into
/// declared composite fields (used by the resolver once a value lands;
/// `add_execution`'s pre-validation of seed input uses `false`, since the
/// resolver already performed that merge — §4.2 step 1).
///
/// Returns `(validated_input, block_name)` on success.
pub fn validate_input(
  node: &Node,
  data: BlockInput,
  catalog: &dyn BlockCatalog,
  resolve_input: bool,
) -> Result<(BlockInput, String), ValidationError> {
  let block = catalog.get(&node.block_id).ok_or_else(|| ValidationError::BlockNotFound {
    node_id: node.node_id.clone(),
    block_id: node.block_id.clone(),
  })?;
  let schema = block.input_schema();

  let mut data = data;
  schema.coerce_types(&mut data);

  let missing_links = schema.get_missing_links(&data, &node.input_links);
  if !missing_links.is_empty() {
    return Err(ValidationError::MissingLinks(missing_links));
  }

  let mut merged = schema.get_input_defaults(&node.input_default);
  merged.extend(data);
  if resolve_input {
    merged = schema.merge_execution_input(merged);
  }

  let missing_input = schema.get_missing_input(&merged);
  if !missing_input.is_empty() {
    return Err(ValidationError::MissingInput(missing_input));
  }

  if let Some(mismatch) = schema.get_mismatch_error(&merged) {
    return Err(ValidationError::Mismatch(mismatch));
  }

  Ok((merged, block.name().to_string()))
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;
  use std::sync::Arc;

  use serde_json::{json, Value};
  use tessera_graph::{
    Block, BlockError, BlockOutputStream, BlockSchema, BlockType, ExecutionContext, FieldSpec,
    ValueType,
  };

  use super::*;

  struct EchoBlock {
    schema: BlockSchema,
  }

  impl Block for EchoBlock {
    fn id(&self) -> &str {
      "echo"
    }
    fn name(&self) -> &str {
      "Echo"
    }
    fn block_type(&self) -> BlockType {
      BlockType::Standard
    }
    fn input_schema(&self) -> &BlockSchema {
      &self.schema
    }
    fn execute(&self, _input: Value, _ctx: ExecutionContext) -> BlockOutputStream {
      Box::pin(futures::stream::empty::<Result<(String, Value), BlockError>>())
    }
  }

  struct SingleBlockCatalog(Arc<dyn Block>);

  impl BlockCatalog for SingleBlockCatalog {
    fn get(&self, block_id: &str) -> Option<Arc<dyn Block>> {
      (block_id == self.0.id()).then(|| self.0.clone())
    }
  }

  fn node_and_catalog() -> (Node, SingleBlockCatalog) {
    let mut fields = HashMap::new();
    fields.insert("x".to_string(), FieldSpec::required(ValueType::Number));
    let block = Arc::new(EchoBlock {
      schema: BlockSchema {
        fields,
        credentials: HashMap::new(),
      },
    });
    let node = Node::new("node-1", "echo");
    (node, SingleBlockCatalog(block))
  }

  #[test]
  fn missing_input_reports_missing_required_field() {
    let (node, catalog) = node_and_catalog();
    let err = validate_input(&node, BlockInput::new(), &catalog, false).unwrap_err();
    assert!(matches!(err, ValidationError::MissingInput(_)));
  }

  #[test]
  fn defaults_fill_in_missing_values() {
    let (mut node, catalog) = node_and_catalog();
    node.input_default.insert("x".to_string(), json!(9));
    let (validated, name) = validate_input(&node, BlockInput::new(), &catalog, false).unwrap();
    assert_eq!(validated["x"], json!(9));
    assert_eq!(name, "Echo");
  }

  #[test]
  fn provided_value_wins_over_default() {
    let (mut node, catalog) = node_and_catalog();
    node.input_default.insert("x".to_string(), json!(9));
    let mut data = BlockInput::new();
    data.insert("x".to_string(), json!(1));
    let (validated, _) = validate_input(&node, data, &catalog, false).unwrap();
    assert_eq!(validated["x"], json!(1));
  }

  #[test]
  fn unknown_block_is_reported() {
    let node = Node::new("node-1", "does-not-exist");
    let catalog = node_and_catalog().1;
    let err = validate_input(&node, BlockInput::new(), &catalog, false).unwrap_err();
    assert!(matches!(err, ValidationError::BlockNotFound { .. }));
  }
}
