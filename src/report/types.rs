/// Colour class of a state or status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// open, success
    Good,
    /// closed, failed
    Bad,
    Merged,
    /// running, pending
    Waiting,
    Neutral,
}

/// Short uppercase marker shown in front of a line, e.g. `[MERGED]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub label: String,
    pub tone: Tone,
}

impl Badge {
    pub fn new(label: impl std::fmt::Display, tone: Tone) -> Self {
        Self {
            label: label.to_string().to_uppercase(),
            tone,
        }
    }
}

impl std::fmt::Display for Badge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

/// One line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub badge: Option<Badge>,
    /// Main text (title, path, name)
    pub text: String,
    /// Secondary text, printed dimmed
    pub detail: Option<String>,
}

/// A rendered view of one command's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub title: String,
    /// Metadata line under the title
    pub summary: Option<String>,
    pub items: Vec<Item>,
    /// Free text (descriptions, file content, logs), printed verbatim
    pub body: Option<String>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: None,
            items: Vec::new(),
            body: None,
        }
    }
}
