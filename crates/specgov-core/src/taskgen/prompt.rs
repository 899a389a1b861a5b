use super::impact::ImpactEntry;
use crate::config::RepoManifest;
use crate::delta::Delta;
use crate::error::Result;
use crate::io;
use crate::middleware::middleware_summary;
use crate::paths;
use crate::types::SpecKind;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

fn domain_infos(root: &Path, impacts: &[ImpactEntry]) -> Result<Map<String, Value>> {
    let ids: BTreeSet<&str> = impacts.iter().filter_map(|i| i.domain.as_deref()).collect();
    let mut infos = Map::new();
    for id in ids {
        let path = paths::domain_file(root, id);
        let info = if path.is_file() {
            io::load_yaml_value(&path)?
        } else {
            Value::Object(Map::new())
        };
        infos.insert(id.to_string(), info);
    }
    Ok(infos)
}

/// Architecture context, middleware registry, affected domains, quality
/// gates, task rules and the answer format.
pub fn system_prompt(root: &Path, impacts: &[ImpactEntry]) -> Result<String> {
    let middleware = serde_json::to_string_pretty(&middleware_summary(root)?)?;
    let domains = serde_json::to_string_pretty(&Value::Object(domain_infos(root, impacts)?))?;
    let gates = RepoManifest::load(root)?.quality_gates;
    let gate_list = serde_json::to_string_pretty(&gates)?;

    Ok(format!(
        r#"You are a software architect generating implementation tasks from a specification delta.
Your output will be consumed by LLM coding agents that implement each task independently.

## Architecture Context

### Shell composition
- **Shell App**: host application composing domain containers and the middleware pipeline.
- **Domain core**: business logic, framework-agnostic. Domain cores MUST NOT depend on
  frameworks, persistence, messaging, or web libraries.
- **Domain container**: integration layer (routes, handlers, wiring).
- **Middleware**: cross-cutting pipeline stages (auth, trace, error, messaging, audit, cache).

### Hexagonal layers
- **Domain layer**: aggregates, value objects, domain events, domain services, ports.
- **Application layer**: use cases / command handlers, DTOs, application services.
- **Adapter layer (in)**: REST controllers, message consumers, CLI handlers.
- **Adapter layer (out)**: persistence, external service clients, event publishers.

### Middleware Pipeline
{middleware}

### Registered Domains
{domains}

### Quality Gates
{gate_list}

## Task Generation Rules

1. **One task = one unit of work** that can be implemented and tested independently.
2. **Layer assignment**: each task targets exactly one layer:
   `domain-core`, `application`, `adapter-in`, `adapter-out`, `middleware`, `test`.
3. **Dependency ordering**: domain-core tasks come first, then application, then adapters and tests.
   Use `depends_on` to express task dependencies.
4. **Acceptance criteria** come from BR and CAP acceptance_criteria. Each task MUST have at least one.
5. **Error codes**: list all error codes the task must handle.
6. **Target files** follow hexagonal conventions:
   `<domain>/core/model/`, `<domain>/core/port/in/`, `<domain>/core/port/out/`, `<domain>/core/event/`,
   `<domain>/app/usecase/`, `<domain>/adapter/in/rest/`, `<domain>/adapter/in/messaging/`,
   `<domain>/adapter/out/persistence/`, `<domain>/adapter/out/event/`.
7. **Contracts**: reference relevant spec artifacts (middleware contracts, error codes, payload schemas).
8. **Quality gates**: list applicable gate IDs from: {gates}.
9. **Test tasks**: for each domain-core or application task, generate a corresponding test task.
10. **Status-only changes** (e.g. "Status proposed → approved") do NOT generate tasks.
11. Task IDs MUST be sequential: TASK-001, TASK-002, etc.

## Output Format

Respond with a single JSON object (no markdown fences):
{{
  "tasks": [
    {{
      "task_id": "TASK-001",
      "title": "<concise title>",
      "layer": "domain-core" | "application" | "adapter-in" | "adapter-out" | "middleware" | "test",
      "domain": "<domain name>",
      "description": "<detailed implementation instructions>",
      "acceptance_criteria": ["<criterion>"],
      "source_artifacts": ["CAP-0002", "BR-0003", "CMD-0005"],
      "target_files": ["<path>"],
      "contracts": ["<contract reference>"],
      "error_codes": ["<ERROR.CODE>"],
      "depends_on": [],
      "priority": "high" | "medium" | "low",
      "quality_gates": ["<gate id>"]
    }}
  ],
  "skipped_changes": [
    {{ "target": "BV-0001", "reason": "<why no code impact>" }}
  ],
  "summary": "<brief summary of what the task set covers>"
}}
"#,
        gates = gates.join(", "),
    ))
}

fn artifact_context(impact: &ImpactEntry) -> Option<Value> {
    let art = impact.artifact.as_ref()?;
    let get = |key: &str| art.data.get(key).cloned().unwrap_or(Value::String(String::new()));
    let criteria = || art.data.get("acceptance_criteria").cloned().unwrap_or(json!([]));

    let mut ctx = Map::new();
    ctx.insert("kind".into(), json!(art.kind.as_str()));
    ctx.insert("title".into(), get("title"));
    ctx.insert("status".into(), get("status"));
    ctx.insert("description".into(), get("description"));
    match art.kind {
        SpecKind::Cap => {
            ctx.insert("acceptance_criteria".into(), criteria());
        }
        SpecKind::Br => {
            ctx.insert("statement".into(), get("statement"));
            ctx.insert("acceptance_criteria".into(), criteria());
        }
        SpecKind::Nfr => {
            ctx.insert("metric".into(), get("metric"));
            ctx.insert("target".into(), get("target"));
        }
        _ => {}
    }
    Some(Value::Object(ctx))
}

/// The delta and the resolved context of each code-impacting change.
pub fn user_prompt(delta: &Delta, impacts: &[ImpactEntry]) -> Result<String> {
    let mut changes = Vec::new();
    for imp in impacts.iter().filter(|i| !i.status_only) {
        let mut entry = Map::new();
        entry.insert("change_type".into(), json!(imp.change.change_type));
        entry.insert("target".into(), json!(imp.change.target));
        entry.insert("description".into(), json!(imp.change.description));
        if let Some(ctx) = artifact_context(imp) {
            entry.insert("artifact_data".into(), ctx);
        }
        if let Some(domain) = &imp.domain {
            entry.insert("domain".into(), json!(domain));
        }
        if !imp.cmd_specs.is_empty() {
            entry.insert("commands".into(), serde_json::to_value(&imp.cmd_specs)?);
        }
        if !imp.evt_specs.is_empty() {
            entry.insert("events".into(), serde_json::to_value(&imp.evt_specs)?);
        }
        if !imp.br_specs.is_empty() {
            entry.insert("related_business_rules".into(), serde_json::to_value(&imp.br_specs)?);
        }
        if !imp.middleware.is_empty() {
            entry.insert("affected_middleware".into(), json!(imp.middleware));
        }
        changes.push(Value::Object(entry));
    }

    Ok(format!(
        "Generate implementation tasks for the following delta:\n\n\
         **Delta**: {}\n\
         **Title**: {}\n\
         **Status**: {}\n\n\
         **Changes with full context**:\n{}\n\n\
         Decompose these changes into implementation tasks. Focus on changes that require\n\
         actual code creation or modification: new business rules, new capabilities,\n\
         new commands/events, amended capabilities with new trace links.\n",
        delta.id,
        delta.title,
        delta.status,
        serde_json::to_string_pretty(&changes)?,
    ))
}
