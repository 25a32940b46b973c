//! Registration surface consumed by the command layer.

use serde::Serialize;

use crate::continuation::CONTINUATION_PREFIX;

pub const SEARCH_COMMAND: &str = "searchmedia";
pub const IGNORE_COMMAND: &str = "ignoremedia";
pub const IMPORT_COMMAND: &str = "starthistoryimport";

/// Event that routes to a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Trigger {
    /// `/name` command.
    Command(&'static str),
    /// Any photo or video message.
    Media,
    /// Inline control payload starting with the prefix.
    Callback(&'static str),
}

/// One feature offered to the command layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureRegistration {
    pub name: &'static str,
    /// Shown in the platform's command menu; `None` keeps the command hidden.
    pub description: Option<&'static str>,
    pub triggers: Vec<Trigger>,
}

/// Every feature the media engine handles.
pub fn features() -> Vec<FeatureRegistration> {
    vec![
        FeatureRegistration {
            name: "media_tracker",
            description: None,
            triggers: vec![Trigger::Media],
        },
        FeatureRegistration {
            name: SEARCH_COMMAND,
            description: Some("[text] 🖼 Пошук медіа за описом"),
            triggers: vec![
                Trigger::Command(SEARCH_COMMAND),
                Trigger::Callback(CONTINUATION_PREFIX),
            ],
        },
        FeatureRegistration {
            name: IGNORE_COMMAND,
            description: Some("🙈 Ігнорувати медіа (reply на фото/відео)"),
            triggers: vec![Trigger::Command(IGNORE_COMMAND)],
        },
        FeatureRegistration {
            name: IMPORT_COMMAND,
            description: None,
            triggers: vec![Trigger::Command(IMPORT_COMMAND)],
        },
    ]
}
