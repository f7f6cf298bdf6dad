//! A tiny in-process block catalog used by the `run`/`serve` CLI commands.
//!
//! The real block catalog and individual block implementations are an
//! external collaborator the engine only ever talks to through
//! [`tessera_graph::BlockCatalog`]/[`tessera_graph::Block`] (§1 Out of
//! scope). This module exists purely so the binary has something runnable
//! to demonstrate against; a production deployment swaps it for whatever
//! catalog loads the real block registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tessera_graph::{
  Block, BlockCatalog, BlockSchema, BlockType, ExecutionContext, FieldSpec, ValueType,
};

struct InputPassthrough {
  schema: BlockSchema,
}

impl Block for InputPassthrough {
  fn id(&self) -> &str {
    "demo-input"
  }
  fn name(&self) -> &str {
    "Input"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Input
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> tessera_graph::BlockOutputStream {
    let value = input.get("value").cloned().unwrap_or(Value::Null);
    Box::pin(futures::stream::once(async move { Ok(("result".to_string(), value)) }))
  }
}

struct Add {
  schema: BlockSchema,
}

impl Block for Add {
  fn id(&self) -> &str {
    "demo-add"
  }
  fn name(&self) -> &str {
    "Add"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> tessera_graph::BlockOutputStream {
    let a = input.get("a").and_then(Value::as_f64).unwrap_or(0.0);
    let b = input.get("b").and_then(Value::as_f64).unwrap_or(0.0);
    Box::pin(futures::stream::once(async move { Ok(("sum".to_string(), serde_json::json!(a + b))) }))
  }
}

struct Stringify {
  schema: BlockSchema,
}

impl Block for Stringify {
  fn id(&self) -> &str {
    "demo-stringify"
  }
  fn name(&self) -> &str {
    "Stringify"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Standard
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> tessera_graph::BlockOutputStream {
    let value = input.get("value").cloned().unwrap_or(Value::Null);
    let text = match value {
      Value::String(s) => s,
      other => other.to_string(),
    };
    Box::pin(futures::stream::once(async move { Ok(("text".to_string(), Value::String(text))) }))
  }
}

struct Output {
  schema: BlockSchema,
}

impl Block for Output {
  fn id(&self) -> &str {
    "demo-output"
  }
  fn name(&self) -> &str {
    "Output"
  }
  fn block_type(&self) -> BlockType {
    BlockType::Output
  }
  fn input_schema(&self) -> &BlockSchema {
    &self.schema
  }
  fn execute(&self, input: Value, _ctx: ExecutionContext) -> tessera_graph::BlockOutputStream {
    let value = input.get("value").cloned().unwrap_or(Value::Null);
    Box::pin(futures::stream::once(async move { Ok(("output".to_string(), value)) }))
  }
}

struct DemoCatalog(HashMap<String, Arc<dyn Block>>);

impl BlockCatalog for DemoCatalog {
  fn get(&self, block_id: &str) -> Option<Arc<dyn Block>> {
    self.0.get(block_id).cloned()
  }
}

fn field(required: bool, value_type: ValueType) -> FieldSpec {
  if required {
    FieldSpec::required(value_type)
  } else {
    FieldSpec::optional(value_type)
  }
}

/// Builds the demo catalog: an input passthrough, an `add`, a `stringify`,
/// and an output passthrough — enough to run the linear-chain scenario in
/// §8 end-to-end.
pub fn demo_catalog() -> Arc<dyn BlockCatalog> {
  let mut blocks: HashMap<String, Arc<dyn Block>> = HashMap::new();

  let mut input_fields = HashMap::new();
  input_fields.insert("value".to_string(), field(false, ValueType::Any));
  blocks.insert(
    "demo-input".to_string(),
    Arc::new(InputPassthrough {
      schema: BlockSchema {
        fields: input_fields,
        credentials: HashMap::new(),
      },
    }),
  );

  let mut add_fields = HashMap::new();
  add_fields.insert("a".to_string(), field(true, ValueType::Number));
  add_fields.insert("b".to_string(), field(true, ValueType::Number));
  blocks.insert(
    "demo-add".to_string(),
    Arc::new(Add {
      schema: BlockSchema {
        fields: add_fields,
        credentials: HashMap::new(),
      },
    }),
  );

  let mut stringify_fields = HashMap::new();
  stringify_fields.insert("value".to_string(), field(true, ValueType::Any));
  blocks.insert(
    "demo-stringify".to_string(),
    Arc::new(Stringify {
      schema: BlockSchema {
        fields: stringify_fields,
        credentials: HashMap::new(),
      },
    }),
  );

  let mut output_fields = HashMap::new();
  output_fields.insert("value".to_string(), field(false, ValueType::Any));
  blocks.insert(
    "demo-output".to_string(),
    Arc::new(Output {
      schema: BlockSchema {
        fields: output_fields,
        credentials: HashMap::new(),
      },
    }),
  );

  Arc::new(DemoCatalog(blocks))
}
