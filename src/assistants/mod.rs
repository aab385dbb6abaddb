// Assistant management
// Assistants created by this tool carry an ownership tag in their metadata

#[cfg(test)]
mod tests;

use anyhow::Context;
use tracing::info;

use crate::config::Settings;
use crate::provider::{Assistant, AssistantApi, AssistantSpec};
use crate::{CopilotError, Result};

/// Assistants carrying the ownership tag
#[inline]
pub fn list_owned(api: &dyn AssistantApi) -> Result<Vec<Assistant>> {
    Ok(api
        .list_assistants()?
        .into_iter()
        .filter(Assistant::is_owned)
        .collect())
}

/// Assistant with this name, preferring ones carrying the ownership tag
#[inline]
pub fn find_by_name(api: &dyn AssistantApi, name: &str) -> Result<Option<Assistant>> {
    let named: Vec<Assistant> = api
        .list_assistants()?
        .into_iter()
        .filter(|a| a.has_name(name))
        .collect();

    let owned = named.iter().find(|a| a.is_owned()).cloned();
    Ok(owned.or_else(|| named.into_iter().next()))
}

/// Create a tagged assistant unless one with the same name is already owned
#[inline]
pub fn create(api: &dyn AssistantApi, spec: &AssistantSpec) -> Result<Assistant> {
    if list_owned(api)?.iter().any(|a| a.has_name(&spec.name)) {
        return Err(CopilotError::Config(format!(
            "Assistant '{}' already exists",
            spec.name
        )));
    }

    let assistant = api.create_assistant(spec)?;
    info!("Created assistant {} ({})", spec.name, assistant.id);
    Ok(assistant)
}

/// Delete an owned assistant by name
///
/// Assistants without the ownership tag are never deleted.
#[inline]
pub fn remove(api: &dyn AssistantApi, name: &str) -> Result<Assistant> {
    let assistant = list_owned(api)?
        .into_iter()
        .find(|a| a.has_name(name))
        .ok_or_else(|| CopilotError::AssistantNotFound(name.to_string()))?;

    api.delete_assistant(&assistant.id)?;
    info!("Removed assistant {} ({})", name, assistant.id);
    Ok(assistant)
}

/// Record `name` as the default assistant after checking it exists
#[inline]
pub fn set_default(api: &dyn AssistantApi, settings: &mut Settings, name: &str) -> Result<Assistant> {
    let assistant =
        find_by_name(api, name)?.ok_or_else(|| CopilotError::AssistantNotFound(name.to_string()))?;

    settings.assistant.default_assistant = Some(name.to_string());
    settings
        .save()
        .context("Failed to save default assistant")?;
    info!("Default assistant set to {}", name);
    Ok(assistant)
}
