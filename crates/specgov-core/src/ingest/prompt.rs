use super::plan::IngestionPlan;
use super::state::{SpecState, ID_PREFIXES};
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::types::{LinkType, SpecKind};
use serde_json::{json, Map, Value};
use std::path::Path;

fn label(prefix: &str) -> &'static str {
    match prefix {
        "BV" => "Business Values",
        "CAP" => "Capabilities",
        "BR" => "Business Rules",
        "NFR" => "NFRs",
        "CMD" => "Commands",
        "EVT" => "Events",
        _ => "Domains",
    }
}

fn schema_text(root: &Path, kind: SpecKind) -> Result<String> {
    let path = paths::schema_path(root, kind);
    if !path.is_file() {
        return Ok("{}".to_string());
    }
    Ok(serde_json::to_string_pretty(&io::load_json(&path)?)?)
}

/// Governance rules, current IDs, next free IDs, domains, schemas and the
/// expected answer format.
pub fn system_prompt(root: &Path, state: &SpecState) -> Result<String> {
    let mut next_ids = Map::new();
    for prefix in ["BV", "CAP", "BR", "NFR", "CMD", "EVT"] {
        next_ids.insert(prefix.to_string(), Value::String(state.next_id(prefix)));
    }
    let next_bv = state.next_id("BV");

    let mut existing = Vec::new();
    for &prefix in ID_PREFIXES {
        let ids: Vec<&str> = state.ids(prefix).map(String::as_str).collect();
        if !ids.is_empty() {
            existing.push(format!("  {}: {}", label(prefix), ids.join(", ")));
        }
    }
    if existing.is_empty() {
        existing.push("  (none)".to_string());
    }

    let links: Vec<String> = state
        .existing_links
        .iter()
        .map(|l| format!("  {} --[{}]--> {}", l.from, l.link_type, l.to))
        .collect();
    let links = if links.is_empty() {
        "  (none)".to_string()
    } else {
        links.join("\n")
    };

    let domains = if state.domain_summary.is_empty() {
        "  (none)".to_string()
    } else {
        state
            .domain_summary
            .iter()
            .map(|l| format!("  {l}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let link_types: Vec<&str> = LinkType::all().iter().map(|t| t.as_str()).collect();

    Ok(format!(
        r#"You are a requirements engineer for a spec-driven specification repository.
Your task is to decompose user requirements into specification artifacts that pass the repository validator.

## Governance Rules

- Every governed artifact (BV, CAP, BR, NFR) MUST conform to its JSON schema.
- Every CAP MUST be linked to at least one BV via a "realizes" trace link.
- Every BR MUST be linked to at least one CAP via a "satisfies" trace link.
- New artifacts MUST use status "proposed".
- Commands (CMD) and Events (EVT) are defined in markdown files with anchor IDs.
- Each CMD SHOULD emit a corresponding EVT.
- Trace link types: {link_types}.

## Existing IDs in the Repository

{existing}

## Existing Trace Links

{links}

## Next Available IDs

{next_ids}

## Registered Domains

{domains}

## JSON Schemas

### BV (Business Value)
```json
{bv}
```

### CAP (Capability)
```json
{cap}
```

### BR (Business Rule)
```json
{br}
```

### NFR (Non-Functional Requirement)
```json
{nfr}
```

## Output Format

Respond with a single JSON object (no markdown fences) with this structure:
```
{{
  "artifacts": [
    {{
      "kind": "BV" | "CAP" | "BR" | "NFR" | "CMD" | "EVT",
      "data": {{ ... fields matching the schema for this kind ... }}
    }}
  ],
  "trace_links": [
    {{
      "from": "<source_id>",
      "to": "<target_id>",
      "type": "realizes" | "satisfies" | "verifies" | "traces_to" | "implements",
      "rationale": "<why this link exists>"
    }}
  ],
  "delta_title": "<concise title for the delta>",
  "delta_rationale": "<why these changes are needed>"
}}
```

### For CMD artifacts, use this structure in "data":
```
{{
  "id": "CMD-XXXX",
  "name": "<Command Name>",
  "intent": "<what this command does>",
  "domain": "<Domain Name> (<DOM-XXXX>)",
  "aggregate": "<Aggregate Root>",
  "payload": [
    {{ "name": "<field>", "type": "<type>", "required": true, "description": "<desc>" }}
  ],
  "invariants": "<business rules / preconditions>",
  "emits": "EVT-XXXX (<Event Name>)",
  "error_codes": ["<ERROR.CODE.1>", "<ERROR.CODE.2>"]
}}
```

### For EVT artifacts, use this structure in "data":
```
{{
  "id": "EVT-XXXX",
  "name": "<Event Name>",
  "fact": "<what happened>",
  "domain": "<Domain Name> (<DOM-XXXX>)",
  "aggregate": "<Aggregate Root>",
  "triggered_by": "CMD-XXXX (<Command Name>)",
  "payload": [
    {{ "name": "<field>", "type": "<type>", "description": "<desc>" }}
  ],
  "consumers": "<who consumes this event>"
}}
```

## Rules for Decomposition

1. One requirement may produce multiple artifacts (e.g., a BV + CAP + BR + CMD + EVT).
2. DO NOT duplicate existing artifacts. If a requirement extends an existing capability, reference it.
3. Use the next available IDs sequentially: if you create 2 BVs, use {next_bv} and the one after.
4. Every new CAP MUST have at least one acceptance_criteria entry.
5. Every new BR MUST have a statement and at least one acceptance_criteria entry.
6. For NFRs: category, statement, metric, target, and scope are required.
7. CMD/EVT artifacts SHOULD be assigned to an existing domain. If no domain fits, note it.
8. Trace links MUST connect new artifacts into the existing graph.
9. The delta_title should be descriptive and concise.
"#,
        link_types = link_types.join(", "),
        existing = existing.join("\n"),
        next_ids = serde_json::to_string_pretty(&Value::Object(next_ids))?,
        bv = schema_text(root, SpecKind::Bv)?,
        cap = schema_text(root, SpecKind::Cap)?,
        br = schema_text(root, SpecKind::Br)?,
        nfr = schema_text(root, SpecKind::Nfr)?,
    ))
}

pub fn user_prompt(requirement: &str) -> String {
    format!(
        "Decompose the following requirement(s) into specification artifacts.\n\
         Create all necessary BV, CAP, BR, NFR, CMD, and EVT artifacts with proper IDs,\n\
         trace links, and a delta summary.\n\n\
         REQUIREMENT:\n{requirement}\n"
    )
}

/// Ask for a corrected plan, showing the validator's message and what was
/// placed last time.
pub fn repair_prompt(validation_error: &str, plan: &IngestionPlan) -> Result<String> {
    let artifacts: Vec<Value> = plan
        .artifacts
        .iter()
        .map(|a| json!({"kind": a.kind.as_str(), "id": a.id, "data": a.data}))
        .collect();
    Ok(format!(
        "The previous artifact placement failed validation. Fix the issues and return\n\
         a corrected JSON response in the same output format.\n\n\
         VALIDATION ERRORS:\n{validation_error}\n\n\
         PREVIOUSLY GENERATED ARTIFACTS:\n{}\n\n\
         PREVIOUSLY GENERATED TRACE LINKS:\n{}\n\n\
         Fix only the fields that caused validation errors. Keep IDs the same unless\n\
         the ID format itself is wrong.\n",
        serde_json::to_string_pretty(&artifacts)?,
        serde_json::to_string_pretty(&plan.trace_links)?,
    ))
}
