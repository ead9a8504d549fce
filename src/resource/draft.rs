use crate::error::{ConsoleError, ConsoleResult};
use crate::transport::{Attachment, RequestBody};
use std::fmt;

/// Whether a draft creates a new item or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftMode {
    Create,
    Update(String),
}

/// Form-side representation of one item.
pub trait DraftFields: Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// Client-side required-field checks, run before any request.
    fn validate(&self) -> ConsoleResult<()>;

    /// Request body for create/update.
    fn encode(&self, attachments: &[Attachment]) -> ConsoleResult<RequestBody>;
}

/// Draft type of resources without a create/update surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOnly;

impl DraftFields for ReadOnly {
    fn validate(&self) -> ConsoleResult<()> {
        Err(ConsoleError::validation("this resource cannot be edited"))
    }

    fn encode(&self, _attachments: &[Attachment]) -> ConsoleResult<RequestBody> {
        Err(ConsoleError::validation("this resource cannot be edited"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Draft<D> {
    pub mode: DraftMode,
    pub fields: D,
    pub attachments: Vec<Attachment>,
}

impl<D: DraftFields> Draft<D> {
    /// Empty skeleton for a create form.
    pub fn create() -> Self {
        Self {
            mode: DraftMode::Create,
            fields: D::default(),
            attachments: Vec::new(),
        }
    }

    pub fn create_with(fields: D) -> Self {
        Self {
            mode: DraftMode::Create,
            fields,
            attachments: Vec::new(),
        }
    }

    pub fn update(id: impl Into<String>, fields: D) -> Self {
        Self {
            mode: DraftMode::Update(id.into()),
            fields,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, DraftMode::Update(_))
    }

    pub fn target_id(&self) -> Option<&str> {
        match &self.mode {
            DraftMode::Update(id) => Some(id),
            DraftMode::Create => None,
        }
    }

    pub fn encode(&self) -> ConsoleResult<RequestBody> {
        self.fields.validate()?;
        self.fields.encode(&self.attachments)
    }
}
