pub mod telegram;

/// Kind of an annotated span inside a message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    /// Plain text that the platform rendered as a link
    Url,
    /// Hyperlink with an explicit target URL
    TextLink,
    /// Any other formatting (bold, mention, code, ...)
    Other,
}

/// A substring of the message text marked by the platform.
///
/// `offset` and `length` are measured in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub kind: SpanKind,
    pub offset: usize,
    pub length: usize,
    pub url: Option<String>,
}

impl TextSpan {
    pub fn url(offset: usize, length: usize) -> Self {
        Self {
            kind: SpanKind::Url,
            offset,
            length,
            url: None,
        }
    }

    pub fn text_link(offset: usize, length: usize, url: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::TextLink,
            offset,
            length,
            url: Some(url.into()),
        }
    }
}

/// Link preview attached to a message by the platform
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkPreview {
    pub url: Option<String>,
    pub is_disabled: bool,
}

/// A message received from any platform
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    /// Platform-specific chat/channel ID as string
    pub chat_id: String,
    /// Sender's username, if the platform user has one
    pub username: Option<String>,
    /// The message text
    pub text: String,
    /// Annotated spans in the order the platform reported them
    pub spans: Vec<TextSpan>,
    pub link_preview: Option<LinkPreview>,
}
