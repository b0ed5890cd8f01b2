// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job payload shapes and per-recipient template rendering.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use wagate_core::GateError;
use wagate_core::types::OutboundContent;

/// Payload for `single` and `scheduled` jobs: one recipient, one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendPayload {
    pub to: String,
    pub content: OutboundContent,
}

/// One bulk recipient with optional template variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkRecipient {
    pub to: String,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Payload for `bulk` jobs: a recipient list fanned out against one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkPayload {
    pub recipients: Vec<BulkRecipient>,
    pub content: OutboundContent,
}

impl SendPayload {
    pub fn parse(json: &str) -> Result<Self, GateError> {
        let payload: SendPayload = serde_json::from_str(json)
            .map_err(|e| GateError::InvalidInput(format!("invalid send payload: {e}")))?;
        if payload.to.trim().is_empty() {
            return Err(GateError::InvalidInput("recipient is required".into()));
        }
        Ok(payload)
    }
}

impl BulkPayload {
    pub fn parse(json: &str) -> Result<Self, GateError> {
        let payload: BulkPayload = serde_json::from_str(json)
            .map_err(|e| GateError::InvalidInput(format!("invalid bulk payload: {e}")))?;
        if payload.recipients.is_empty() {
            return Err(GateError::InvalidInput(
                "bulk job needs at least one recipient".into(),
            ));
        }
        if payload.recipients.iter().any(|r| r.to.trim().is_empty()) {
            return Err(GateError::InvalidInput("recipient is required".into()));
        }
        Ok(payload)
    }
}

/// Substitute `{{key}}` placeholders in text bodies and attachment captions
/// with the recipient's variables. Unknown placeholders pass through.
pub fn render(content: &OutboundContent, variables: &HashMap<String, String>) -> OutboundContent {
    if variables.is_empty() {
        return content.clone();
    }
    match content {
        OutboundContent::Text { body } => OutboundContent::Text {
            body: substitute(body, variables),
        },
        OutboundContent::Attachment(attachment) => {
            let mut attachment = attachment.clone();
            attachment.caption = attachment
                .caption
                .as_ref()
                .map(|c| substitute(c, variables));
            OutboundContent::Attachment(attachment)
        }
        OutboundContent::Location(_) => content.clone(),
    }
}

fn substitute(text: &str, variables: &HashMap<String, String>) -> String {
    let mut out = text.to_string();
    for (key, value) in variables {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}
