//! File-backed system prompts, one markdown file per assistant.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::PromptConfig;

/// The three assistants this service drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssistantKind {
    HandleInbox,
    DailyReport,
    Chat,
}

impl AssistantKind {
    pub const ALL: [AssistantKind; 3] = [
        AssistantKind::HandleInbox,
        AssistantKind::DailyReport,
        AssistantKind::Chat,
    ];

    /// Accepts the short and long names, case-insensitively.
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.to_lowercase().as_str() {
            "hi" | "handle-inbox" => Some(Self::HandleInbox),
            "dare" | "daily-report" => Some(Self::DailyReport),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }

    pub fn prompt_file(&self) -> &'static str {
        match self {
            Self::HandleInbox => "hi.md",
            Self::DailyReport => "dare.md",
            Self::Chat => "chat.md",
        }
    }

    /// Environment variable holding the provisioned assistant's id.
    pub fn id_env_key(&self) -> &'static str {
        match self {
            Self::HandleInbox => "HI_OPENAI_ASSISTANT_ID",
            Self::DailyReport => "DARE_OPENAI_ASSISTANT_ID",
            Self::Chat => "CHAT_OPENAI_ASSISTANT_ID",
        }
    }

    /// Display name used when provisioning the assistant.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::HandleInbox => "Handle-Inbox",
            Self::DailyReport => "Daily-Report",
            Self::Chat => "Chat",
        }
    }
}

/// An edit requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptUpdate {
    /// `append`, `replace` or `full`. Anything else replaces the whole prompt.
    pub mode: String,
    #[serde(default)]
    pub search: Option<String>,
    pub content: String,
}

/// Apply an update to prompt text. `replace` touches only the first match
/// and acts like `full` when no search text is given.
pub fn apply_update(current: &str, update: &PromptUpdate) -> String {
    match (update.mode.as_str(), update.search.as_deref()) {
        ("append", _) => format!("{current}\n\n{}", update.content),
        ("replace", Some(search)) if !search.is_empty() => {
            current.replacen(search, &update.content, 1)
        }
        _ => update.content.clone(),
    }
}

pub struct PromptStore {
    dir: PathBuf,
}

impl PromptStore {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            dir: config.dir.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: AssistantKind) -> PathBuf {
        self.dir.join(kind.prompt_file())
    }

    pub async fn read(&self, kind: AssistantKind) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.path(kind)).await
    }

    /// Read, apply and write back. The prompt file must already exist.
    pub async fn update(&self, kind: AssistantKind, update: &PromptUpdate) -> std::io::Result<()> {
        let path = self.path(kind);
        let current = tokio::fs::read_to_string(&path).await?;
        let updated = apply_update(&current, update);
        tokio::fs::write(&path, updated).await?;
        tracing::info!(path = %path.display(), mode = %update.mode, "Updated system prompt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(mode: &str, search: Option<&str>, content: &str) -> PromptUpdate {
        PromptUpdate {
            mode: mode.into(),
            search: search.map(str::to_string),
            content: content.into(),
        }
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(AssistantKind::from_alias("hi"), Some(AssistantKind::HandleInbox));
        assert_eq!(
            AssistantKind::from_alias("Handle-Inbox"),
            Some(AssistantKind::HandleInbox)
        );
        assert_eq!(AssistantKind::from_alias("dare"), Some(AssistantKind::DailyReport));
        assert_eq!(
            AssistantKind::from_alias("daily-report"),
            Some(AssistantKind::DailyReport)
        );
        assert_eq!(AssistantKind::from_alias("chat"), Some(AssistantKind::Chat));
        assert_eq!(AssistantKind::from_alias("bookkeeper"), None);
    }

    #[test]
    fn append_adds_blank_line() {
        assert_eq!(apply_update("a", &update("append", None, "b")), "a\n\nb");
    }

    #[test]
    fn replace_only_first_occurrence() {
        let result = apply_update("x y x", &update("replace", Some("x"), "z"));
        assert_eq!(result, "z y x");
    }

    #[test]
    fn replace_without_search_is_full() {
        assert_eq!(apply_update("old", &update("replace", None, "new")), "new");
    }

    #[test]
    fn unknown_mode_is_full() {
        assert_eq!(apply_update("old", &update("full", None, "new")), "new");
        assert_eq!(apply_update("old", &update("rewrite", None, "new")), "new");
    }

    #[tokio::test]
    async fn update_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(&PromptConfig {
            dir: dir.path().to_path_buf(),
        });
        tokio::fs::write(store.path(AssistantKind::Chat), "Be brief.")
            .await
            .unwrap();

        store
            .update(AssistantKind::Chat, &update("append", None, "Use Dutch."))
            .await
            .unwrap();

        assert_eq!(
            store.read(AssistantKind::Chat).await.unwrap(),
            "Be brief.\n\nUse Dutch."
        );
    }

    #[tokio::test]
    async fn update_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = PromptStore::new(&PromptConfig {
            dir: dir.path().to_path_buf(),
        });
        let result = store
            .update(AssistantKind::HandleInbox, &update("full", None, "x"))
            .await;
        assert!(result.is_err());
        assert!(!store.path(AssistantKind::HandleInbox).exists());
    }
}
