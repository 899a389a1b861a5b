//! Minimal specification trees and a scripted LLM for tests.

use llm_client::{ChatClient, LlmError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

pub fn write(root: &Path, rel: &str, body: &str) {
    let p = root.join(rel);
    std::fs::create_dir_all(p.parent().unwrap()).unwrap();
    std::fs::write(p, body).unwrap();
}

const REQUIREMENT_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "type": "object",
  "required": ["id", "title", "status"],
  "properties": {
    "id": {"type": "string"},
    "title": {"type": "string", "minLength": 1},
    "status": {"type": "string"},
    "trace": {"type": "object"}
  }
}"#;

const TRACE_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "type": "object",
  "required": ["links"],
  "properties": {
    "links": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["from", "to", "type"],
        "properties": {
          "from": {"type": "string"},
          "to": {"type": "string"},
          "type": {"type": "string"}
        }
      }
    }
  }
}"#;

const DELTA_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "type": "object",
  "required": ["id", "title", "status", "changes"],
  "properties": {
    "changes": {
      "type": "array",
      "items": {"type": "object", "required": ["type", "target"]}
    }
  }
}"#;

pub fn write_schemas(root: &Path) {
    for name in ["bv", "cap", "br", "nfr"] {
        write(root, &format!("specs/schemas/{name}.schema.json"), REQUIREMENT_SCHEMA);
    }
    write(root, "specs/schemas/trace-links.schema.json", TRACE_SCHEMA);
    write(root, "specs/schemas/delta.schema.json", DELTA_SCHEMA);
}

/// BV-0001 realizes CAP-0001 (proposed), which satisfies BR-0001.
pub fn write_baseline(root: &Path) {
    write_schemas(root);
    write(
        root,
        "specs/requirements/business-values/BV-0001.yaml",
        "id: BV-0001\ntitle: Faster checkout\nstatus: approved\n",
    );
    write(
        root,
        "specs/requirements/capabilities/CAP-0001.yaml",
        "id: CAP-0001\ntitle: Checkout\nstatus: proposed\n",
    );
    write(
        root,
        "specs/requirements/business-rules/BR-0001.yaml",
        "id: BR-0001\ntitle: Cart must not be empty\nstatus: proposed\nstatement: An order needs at least one line\n",
    );
    write(
        root,
        "specs/requirements/trace-links.yaml",
        "links:\n  - from: BV-0001\n    to: CAP-0001\n    type: realizes\n  - from: CAP-0001\n    to: BR-0001\n    type: satisfies\n",
    );
}

pub fn write_domain_docs(root: &Path) {
    write(
        root,
        "specs/domain/commands.md",
        "# Commands\n\n<a id=\"CMD-0001\"></a>\n### CMD-0001: Place order\n\n- **Intent**: Customer checks out a cart\n- **Domain**: Orders (DOM-0001)\n- **Aggregate**: Order\n- **Payload**:\n  - `cart_id` (uuid, required) — cart to check out\n- **Invariants**: Cart is not empty\n- **Emits**: EVT-0001 (Order placed)\n- **Error codes**: `ORDER.EMPTY_CART`\n",
    );
    write(
        root,
        "specs/domain/events.md",
        "# Events\n\n<a id=\"EVT-0001\"></a>\n### EVT-0001: Order placed\n\n- **Fact**: An order was accepted\n- **Domain**: Orders (DOM-0001)\n- **Aggregate**: Order\n- **Triggered by**: CMD-0001 (Place order)\n- **Payload**:\n  - `order_id` (uuid) — new order\n- **Consumers**: Billing\n",
    );
}

pub fn write_registries(root: &Path) {
    write(root, "specs/registry/workspace-registry.yaml", "repos:\n  - id: shell-app\n  - id: orders-svc\n");
    write(root, "specs/architecture/domain/domains.yaml", "domains:\n  - DOM-0001\n");
    write(
        root,
        "specs/architecture/domain/DOM-0001.yaml",
        "id: DOM-0001\nname: Orders\ndescription: Order intake and lifecycle\nrepoId: orders-svc\nentrypoints:\n  core: entry.orders.core\n  container: entry.orders.container\n",
    );
    write(root, "specs/architecture/middleware/README.md", "# Middleware registry\n");
    write(
        root,
        "specs/architecture/middleware/auth.md",
        "# Auth\n\n**Middleware ID:** `mw.auth`\n**Category:** mandatory\n**Pipeline Position:** 1\n**Implementation Ref:** `shell-app :: entry.middleware.auth`\n",
    );
}

/// Answers each `complete` call with the next canned reply and records the
/// user prompts it was sent.
#[derive(Default)]
pub struct ScriptedClient {
    replies: RefCell<VecDeque<String>>,
    pub prompts: RefCell<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl ChatClient for ScriptedClient {
    fn complete(&self, _system: &str, user: &str) -> llm_client::Result<String> {
        self.prompts.borrow_mut().push(user.to_string());
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| LlmError::MalformedResponse("no scripted reply left".to_string()))
    }
}
