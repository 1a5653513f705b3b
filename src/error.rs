//! Fatal compile errors. Any of these aborts the whole run.

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    // ----- ingestion / declarations -----
    #[error("Unexpected line outside <parser> tag")]
    OutsideParserSection,
    #[error("Unexpected line before Packet / Fragment declaration")]
    NoCurrentDeclaration,
    #[error("Malformed Fragment declaration")]
    MalformedFragmentHeader,
    #[error("Malformed Packet declaration")]
    MalformedPacketHeader,
    #[error("Duplicated Fragment[{0}]")]
    DuplicateFragment(String),
    #[error("Duplicated Packet header [{0}]")]
    DuplicatePacket(String),
    #[error("Duplicated line number {0} within one declaration")]
    DuplicateLine(usize),
    #[error("Fragment[{0}] referenced but never declared")]
    UndeclaredFragment(String),
    #[error("Packet[{0}] was never declared")]
    UndeclaredPacket(String),
    #[error("Fragment[{0}] references itself (cycle: {1})")]
    FragmentCycle(String, String),

    // ----- grammar -----
    #[error("Invalid signature token [{0}]")]
    InvalidToken(String),
    #[error("Invalid padding size [{0}] (integer up to 4096 expected)")]
    InvalidPadding(String),
    #[error("Invalid code for {0}")]
    InvalidCode(&'static str),

    // ----- sub-categories -----
    #[error("Only one \"+ SubCate\" is allowed per packet")]
    MultipleSubcatePlaceholders,
    #[error("\"+ SubCate\" cannot appear after the packet body ended (no sub-category within a sub-category)")]
    SubcatePlaceholderAfterBody,
    #[error("Invalid SubCate declaration (needs a description or a discriminator byte)")]
    MalformedSubcate,
    #[error("Non-hex discriminator byte [{0}] for SubCate")]
    NonHexDiscriminator(String),
    #[error("Duplicated SubCate description [{0}] within the same packet")]
    DuplicateSubcateDescription(String),
    #[error("Duplicated SubCate discriminator byte [{0}] within the same packet")]
    DuplicateSubcateDiscriminator(String),
    #[error("Two SubCate branches compile to the same signature [{0}]")]
    DuplicateBranchSignature(String),

    // ----- repeatable groups -----
    #[error("Cannot use \"+ REP\" before the previous repeatable start tag ends")]
    NestedRepeat,
    #[error("Cannot use \"- REP\" before \"+ REP\"")]
    UnopenedRepeat,
    #[error("Repeatable tag used outside Packet/SubCate body")]
    RepeatOutsideBody,
    #[error("\"+ REP\" is never closed by \"- REP\"")]
    UnclosedRepeat,
}

/// A fatal error tied to the source line that caused it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} [@Line:{line}] Raw: {raw}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub line: usize,
    pub raw: String,
}

impl CompileError {
    pub fn new(kind: ErrorKind, line: usize, raw: impl Into<String>) -> Self {
        CompileError {
            kind,
            line,
            raw: raw.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
