use std::sync::Arc;

use derive_more::{From, TryInto};
use engine::{GenerationOutcome, JobUpdate};

use crate::StringError;

#[derive(Debug, Clone, From)]
pub enum Message {
    Ui(UiMessage),
    Context(ContextMessage),
}

/// Messages produced by the widgets of the active state
#[derive(Debug, Clone, From, TryInto)]
pub enum UiMessage {
    Form(ui_messages::Form),
    MessageDialog(ui_messages::MessageDialog),
}

/// Messages of the running job, handled by the context regardless of the active state
#[derive(Debug, Clone)]
pub enum ContextMessage {
    Progress(JobUpdate),
    Finished(Result<Arc<GenerationOutcome>, StringError>),
}

pub mod ui_messages {
    use engine::{AspectRatio, OutputFormat};
    use iced::widget::text_editor;

    #[derive(Debug, Clone)]
    pub enum Form {
        KeyIdChanged(String),
        KeySecretChanged(String),
        SafetyCheckerToggled(bool),
        SafetyToleranceChanged(u8),
        OutputFormatSelected(OutputFormat),
        AspectRatioSelected(AspectRatio),
        RawToggled(bool),
        UseSeedToggled(bool),
        SeedChanged(String),
        PromptEdit(text_editor::Action),
        Generate,
        SaveImage,
        ShowRawResult,
        ShowTips,
    }

    #[derive(Debug, Clone)]
    pub enum MessageDialog {
        Confirm,
        EditAction(text_editor::Action),
    }
}
