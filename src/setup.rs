//! Provision the three assistants: instructions from the prompt files, tool
//! schemas from the registry.

use crate::assistant::{AssistantAdmin, AssistantDefinition};
use crate::config::AssistantIds;
use crate::error::{ConfigError, Result};
use crate::prompts::{AssistantKind, PromptStore};
use crate::tools::ToolRegistry;
use crate::tools::builtin::tools_for;

pub fn model_for(kind: AssistantKind) -> &'static str {
    match kind {
        AssistantKind::HandleInbox => "gpt-4o-mini",
        AssistantKind::DailyReport | AssistantKind::Chat => "gpt-4o",
    }
}

/// What setup did for one assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedAssistant {
    pub kind: AssistantKind,
    pub assistant_id: String,
    pub created: bool,
}

/// Build the remote definition of `kind`.
pub async fn definition_for(
    kind: AssistantKind,
    registry: &ToolRegistry,
    prompts: &PromptStore,
) -> Result<AssistantDefinition> {
    let instructions = prompts.read(kind).await.map_err(ConfigError::Io)?;
    let wanted = tools_for(kind);
    let tools = registry.tool_specs_for(wanted).await;
    if tools.len() < wanted.len() {
        tracing::warn!(
            assistant = kind.display_name(),
            registered = tools.len(),
            expected = wanted.len(),
            "Some tools are not registered and will be left off the assistant"
        );
    }
    Ok(AssistantDefinition {
        name: kind.display_name().to_string(),
        instructions,
        model: model_for(kind).to_string(),
        tools,
    })
}

/// Update every assistant that already has an id, create the rest.
pub async fn setup_assistants(
    admin: &dyn AssistantAdmin,
    registry: &ToolRegistry,
    prompts: &PromptStore,
    ids: &AssistantIds,
) -> Result<Vec<ProvisionedAssistant>> {
    let mut provisioned = Vec::with_capacity(AssistantKind::ALL.len());
    for kind in AssistantKind::ALL {
        let definition = definition_for(kind, registry, prompts).await?;
        let (assistant, created) = match ids.get(kind) {
            Some(id) => (admin.update_assistant(id, &definition).await?, false),
            None => (admin.create_assistant(&definition).await?, true),
        };

        if created {
            tracing::info!(
                assistant = kind.display_name(),
                id = %assistant.id,
                "Created assistant, set {}={}",
                kind.id_env_key(),
                assistant.id
            );
        } else {
            tracing::info!(assistant = kind.display_name(), id = %assistant.id, "Updated assistant");
        }
        provisioned.push(ProvisionedAssistant {
            kind,
            assistant_id: assistant.id,
            created,
        });
    }
    Ok(provisioned)
}
