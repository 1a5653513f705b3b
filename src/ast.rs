//! Data model for the packet layout DSL: signature tokens, field descriptors, and compiled
//! signature sets.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Fixed composite placeholders understood by the downstream decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    /// `64$4`
    Int64Pair,
    /// `73$4$gbk`
    LengthPrefixedGbk,
    /// `$gbk`
    Gbk,
    /// `param`
    Param,
}

impl Composite {
    pub fn as_str(self) -> &'static str {
        match self {
            Composite::Int64Pair => "64$4",
            Composite::LengthPrefixedGbk => "73$4$gbk",
            Composite::Gbk => "$gbk",
            Composite::Param => "param",
        }
    }
}

/// One unit of a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal hex bytes, kept as written.
    Hex(String),
    /// `pad-N`: N zero bytes rendered as a single token.
    Padding(usize),
    /// `$1`, `$2` or `$4`.
    Size(u8),
    Composite(Composite),
    /// `[REPS]`
    RepeatStart,
    /// `[REPE]`
    RepeatEnd,
    /// `{SUBCATE}`: replaced by each branch when a packet is expanded.
    SubCategory,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Hex(h) => f.write_str(h),
            Token::Padding(n) => {
                for _ in 0..*n {
                    f.write_str("00")?;
                }
                Ok(())
            }
            Token::Size(n) => write!(f, "${}", n),
            Token::Composite(c) => f.write_str(c.as_str()),
            Token::RepeatStart => f.write_str("[REPS]"),
            Token::RepeatEnd => f.write_str("[REPE]"),
            Token::SubCategory => f.write_str("{SUBCATE}"),
        }
    }
}

impl Token {
    /// True when the token renders to no text (`pad-0`, empty literal).
    pub fn is_empty(&self) -> bool {
        match self {
            Token::Hex(h) => h.is_empty(),
            Token::Padding(n) => *n == 0,
            _ => false,
        }
    }
}

/// Ordered token sequence. Rendered space-separated at the output boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature(pub Vec<Token>);

impl Signature {
    pub fn new() -> Self {
        Signature(Vec::new())
    }

    pub fn push(&mut self, token: Token) {
        self.0.push(token);
    }

    pub fn extend(&mut self, other: &Signature) {
        self.0.extend(other.0.iter().cloned());
    }

    /// True when rendering would produce an empty string.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(Token::is_empty)
    }

    /// Replace every `{SUBCATE}` token with the tokens of `branch`.
    pub fn expand_subcategory(&self, branch: &Signature) -> Signature {
        let mut out = Vec::with_capacity(self.0.len() + branch.0.len());
        for t in &self.0 {
            if *t == Token::SubCategory {
                out.extend(branch.0.iter().cloned());
            } else {
                out.push(t.clone());
            }
        }
        Signature(out)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for t in self.0.iter().filter(|t| !t.is_empty()) {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{}", t)?;
            first = false;
        }
        Ok(())
    }
}

/// Decode type forced by a `T[...]` annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedType {
    Byte,
    Short,
    UShort,
    Int,
    UInt,
}

impl ForcedType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "byte" => Some(ForcedType::Byte),
            "short" => Some(ForcedType::Short),
            "ushort" => Some(ForcedType::UShort),
            "int" => Some(ForcedType::Int),
            "uint" => Some(ForcedType::UInt),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ForcedType::Byte => "byte",
            ForcedType::Short => "short",
            ForcedType::UShort => "ushort",
            ForcedType::Int => "int",
            ForcedType::UInt => "uint",
        }
    }
}

impl Serialize for ForcedType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Lookup databases an `R[...]` annotation may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceDb {
    Skill,
    Npc,
    Map,
    FormatString,
    Item,
}

impl ReferenceDb {
    /// Case-insensitive lookup of the symbolic database name.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim().to_ascii_uppercase().as_str() {
            "SKILL" => Some(ReferenceDb::Skill),
            "NPC" => Some(ReferenceDb::Npc),
            "MAP" => Some(ReferenceDb::Map),
            "FS" => Some(ReferenceDb::FormatString),
            "ITEM" => Some(ReferenceDb::Item),
            _ => None,
        }
    }

    /// Canonical identifier written into the output table.
    pub fn identifier(self) -> &'static str {
        match self {
            ReferenceDb::Skill => "db_Skill",
            ReferenceDb::Npc => "db_NPC",
            ReferenceDb::Map => "db_Map",
            ReferenceDb::FormatString => "db_FormatString",
            ReferenceDb::Item => "db_Item",
        }
    }
}

/// Metadata for one decoded value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub forced_type: Option<ForcedType>,
    /// `R[...]` (canonical database first) or `Fn[...]` (raw) argument list.
    #[serde(rename = "func", skip_serializing_if = "Option::is_none")]
    pub function_ref: Option<Vec<String>>,
    #[serde(rename = "param", skip_serializing_if = "Option::is_none")]
    pub param_alias: Option<String>,
}

impl FieldDescriptor {
    pub const PADDING: &'static str = "Padding";
    pub const PLACEHOLDER: &'static str = "-";
    pub const SUBCATE_DISCRIMINATOR: &'static str = "- SubCate -";

    pub fn named(name: impl Into<String>) -> Self {
        FieldDescriptor {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn padding() -> Self {
        Self::named(Self::PADDING)
    }

    /// Structural placeholder used for repeat markers.
    pub fn placeholder() -> Self {
        Self::named(Self::PLACEHOLDER)
    }

    pub fn subcate_discriminator() -> Self {
        Self::named(Self::SUBCATE_DISCRIMINATOR)
    }
}

/// One compiled signature: optional branch description plus the ordered field list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignatureEntry {
    #[serde(rename = "desc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub params: Vec<FieldDescriptor>,
}

/// Rendered signature → entry, in branch declaration order.
pub type SignatureSet = IndexMap<String, SignatureEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_renders_space_separated_and_skips_empty_tokens() {
        let sig = Signature(vec![
            Token::Size(2),
            Token::Padding(0),
            Token::Hex("0A0B".to_string()),
            Token::RepeatStart,
            Token::Composite(Composite::LengthPrefixedGbk),
            Token::RepeatEnd,
        ]);
        assert_eq!(sig.to_string(), "$2 0A0B [REPS] 73$4$gbk [REPE]");
    }

    #[test]
    fn padding_renders_zero_bytes() {
        assert_eq!(Token::Padding(3).to_string(), "000000");
    }

    #[test]
    fn expand_subcategory_splices_branch() {
        let main = Signature(vec![Token::Size(1), Token::SubCategory, Token::Size(4)]);
        let branch = Signature(vec![Token::Hex("01".to_string()), Token::Size(2)]);
        assert_eq!(main.expand_subcategory(&branch).to_string(), "$1 01 $2 $4");
    }

    #[test]
    fn field_descriptor_omits_absent_members() {
        let f = FieldDescriptor {
            name: "Id".to_string(),
            forced_type: Some(ForcedType::UShort),
            ..Default::default()
        };
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, r#"{"name":"Id","type":"ushort"}"#);
    }

    #[test]
    fn reference_db_is_case_insensitive() {
        assert_eq!(ReferenceDb::from_symbol("npc"), Some(ReferenceDb::Npc));
        assert_eq!(ReferenceDb::from_symbol("Fs").map(ReferenceDb::identifier), Some("db_FormatString"));
        assert_eq!(ReferenceDb::from_symbol("quest"), None);
    }
}
