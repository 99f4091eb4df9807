//! aegis_context
//!
//! Packs a system prompt, optional recalled-memory block, and recent
//! messages into a token-budgeted sequence. Pure and synchronous: nothing
//! here does I/O or holds a clock.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembleRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub memories: Vec<String>,
    pub tool_definitions: serde_json::Value,
    pub max_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub messages: Vec<Message>,
    pub token_estimate: u64,
    pub truncated: bool,
}

/// `ceil(len(json)/4)` token estimator, consistent across the whole crate
/// family so budget math agrees between the gate, the assembler, and model
/// audit reports.
pub fn estimate_tokens_str(s: &str) -> u64 {
    ((s.len() as u64) + 3) / 4
}

pub fn estimate_tokens_json(v: &serde_json::Value) -> u64 {
    estimate_tokens_str(&v.to_string())
}

const MEMORY_HEADER: &str = "## RECALLED MEMORIES";

pub fn assemble(req: AssembleRequest) -> AssembledContext {
    let system_msg = Message { role: "system".to_string(), content: req.system_prompt.clone() };
    let tool_overhead = estimate_tokens_json(&req.tool_definitions);
    let system_tokens = estimate_tokens_str(&req.system_prompt) + tool_overhead;

    if system_tokens > req.max_tokens {
        return AssembledContext { messages: vec![system_msg], token_estimate: system_tokens, truncated: true };
    }

    let mut budget = req.max_tokens - system_tokens;
    let mut truncated = false;

    // Walk newest-first, stop at the first message that doesn't fit; keep
    // chronological order in the final list.
    let mut kept_reversed: Vec<&Message> = Vec::new();
    for msg in req.messages.iter().rev() {
        let cost = estimate_tokens_str(&msg.content);
        if cost > budget {
            truncated = true;
            break;
        }
        budget -= cost;
        kept_reversed.push(msg);
    }
    if kept_reversed.len() < req.messages.len() {
        truncated = true;
    }
    let kept: Vec<Message> = kept_reversed.into_iter().rev().cloned().collect();

    let mut memory_msg = None;
    if !req.memories.is_empty() {
        let mut block = String::from(MEMORY_HEADER);
        let mut used = 0usize;
        for mem in &req.memories {
            let candidate = format!("{block}\n- {mem}");
            let cost = estimate_tokens_str(&candidate) - estimate_tokens_str(&block);
            if cost as u64 > budget {
                truncated = true;
                break;
            }
            block = candidate;
            budget -= cost as u64;
            used += 1;
        }
        if used > 0 {
            memory_msg = Some(Message { role: "system".to_string(), content: block });
        } else if !req.memories.is_empty() {
            truncated = true;
        }
    }

    let mut out_messages = vec![system_msg];
    if let Some(mem) = memory_msg {
        out_messages.push(mem);
    }
    out_messages.extend(kept);

    let token_estimate: u64 = out_messages.iter().map(|m| estimate_tokens_str(&m.content)).sum::<u64>() + tool_overhead;

    AssembledContext { messages: out_messages, token_estimate, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> Message {
        Message { role: "user".to_string(), content: content.to_string() }
    }

    #[test]
    fn system_prompt_always_first() {
        let out = assemble(AssembleRequest {
            system_prompt: "you are helpful".into(),
            messages: vec![msg("hi"), msg("there")],
            memories: vec![],
            tool_definitions: serde_json::json!([]),
            max_tokens: 1000,
        });
        assert_eq!(out.messages[0].role, "system");
        assert_eq!(out.messages[0].content, "you are helpful");
        assert!(!out.truncated);
    }

    #[test]
    fn oversized_system_prompt_truncates_to_itself() {
        let out = assemble(AssembleRequest {
            system_prompt: "x".repeat(1000),
            messages: vec![msg("hi")],
            memories: vec![],
            tool_definitions: serde_json::json!([]),
            max_tokens: 10,
        });
        assert_eq!(out.messages.len(), 1);
        assert!(out.truncated);
    }

    #[test]
    fn memory_block_is_second_message_when_present() {
        let out = assemble(AssembleRequest {
            system_prompt: "sys".into(),
            messages: vec![msg("hi")],
            memories: vec!["likes rust".into()],
            tool_definitions: serde_json::json!([]),
            max_tokens: 1000,
        });
        assert_eq!(out.messages[1].role, "system");
        assert!(out.messages[1].content.contains("RECALLED MEMORIES"));
    }

    #[test]
    fn stays_within_budget_unless_system_prompt_alone_exceeds_it() {
        let out = assemble(AssembleRequest {
            system_prompt: "sys".into(),
            messages: (0..50).map(|i| msg(&format!("message number {i}"))).collect(),
            memories: vec![],
            tool_definitions: serde_json::json!([]),
            max_tokens: 50,
        });
        assert!(out.token_estimate <= 50);
        assert!(out.truncated);
    }
}
