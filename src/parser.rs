//! Parse single DSL lines using PEST: signature field lines, control lines, sub-category
//! declarations and declaration headers.

use crate::ast::*;
use crate::diag::Diagnostics;
use crate::error::{CompileError, ErrorKind, Result};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct LineParser;

/// Largest accepted `pad-N`, in bytes.
pub const MAX_PADDING: usize = 4096;

/// A `SubCate[...]` branch declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcateDecl {
    /// Empty when only a discriminator was given.
    pub description: String,
    /// Fixed discriminator byte(s), validated hex.
    pub discriminator: Option<String>,
}

/// Classification of one body line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyLine {
    Field { token: Token, field: FieldDescriptor },
    /// `+ Fragment[name]`
    FragmentRef(String),
    /// `+ SubCate`
    SubcatePlaceholder,
    /// `SubCate[desc:hex]`
    Subcate(SubcateDecl),
    /// `+ REP`
    RepeatStart,
    /// `- REP`
    RepeatEnd,
    /// `pack`
    Pack,
    /// Not a field and not a known control form.
    Unrecognized,
}

/// Classify a sanitized body line. Field lines take priority over control forms.
pub fn parse_body_line(text: &str, line: usize, diag: &mut Diagnostics) -> Result<BodyLine> {
    if let Some((token, field)) = parse_field_line(text, line, diag)? {
        return Ok(BodyLine::Field { token, field });
    }
    if text.starts_with("SubCate[") {
        return parse_subcate_decl(text, line).map(BodyLine::Subcate);
    }
    Ok(parse_control_line(text).unwrap_or(BodyLine::Unrecognized))
}

/// Parse a field line into `(token, descriptor)`.
///
/// Returns `Ok(None)` for lines that are not field lines (sub-category headers and anything
/// without a `:`); the caller treats those structurally.
pub fn parse_field_line(
    text: &str,
    line: usize,
    diag: &mut Diagnostics,
) -> Result<Option<(Token, FieldDescriptor)>> {
    if let Some(count) = text.strip_prefix("pad-") {
        let count = count.trim();
        let n = count
            .parse::<usize>()
            .ok()
            .filter(|n| *n <= MAX_PADDING)
            .ok_or_else(|| CompileError::new(ErrorKind::InvalidPadding(count.to_string()), line, text))?;
        return Ok(Some((Token::Padding(n), FieldDescriptor::padding())));
    }

    if text.starts_with("SubCate[") || !text.contains(':') {
        return Ok(None);
    }

    let segments: Vec<&str> = text.split(':').collect();
    let mut field = FieldDescriptor::named(segments[0].trim());

    let raw_token = segments[1].trim();
    let token = parse_signature_token(raw_token)
        .ok_or_else(|| CompileError::new(ErrorKind::InvalidToken(raw_token.to_string()), line, text))?;

    for segment in &segments[2..] {
        let annotation = segment.split("//").next().unwrap_or("").trim();
        apply_annotation(&mut field, annotation, line, diag);
    }

    Ok(Some((token, field)))
}

/// Match a whole string against the signature token grammar.
pub fn parse_signature_token(s: &str) -> Option<Token> {
    let pair = LineParser::parse(Rule::signature_token, s).ok()?.next()?;
    let inner = pair.into_inner().next()?;
    match inner.as_rule() {
        Rule::composite => Some(Token::Composite(match inner.as_str() {
            "64$4" => Composite::Int64Pair,
            "73$4$gbk" => Composite::LengthPrefixedGbk,
            "$gbk" => Composite::Gbk,
            _ => Composite::Param,
        })),
        Rule::size_placeholder => inner.as_str()[1..].parse().ok().map(Token::Size),
        Rule::hex_literal => Some(Token::Hex(inner.as_str().to_string())),
        _ => None,
    }
}

/// Apply one optional annotation to `field`. Problems are warnings; the annotation is dropped.
fn apply_annotation(field: &mut FieldDescriptor, annotation: &str, line: usize, diag: &mut Diagnostics) {
    let parsed = LineParser::parse(Rule::annotation, annotation)
        .ok()
        .and_then(|mut pairs| pairs.next())
        .and_then(|p| p.into_inner().next());

    let pair = match parsed {
        Some(p) => p,
        None => {
            let message = if annotation.starts_with('T') {
                "Failed to parse \"T\" option".to_string()
            } else if annotation.starts_with('P') {
                "Failed to parse \"P\" option".to_string()
            } else if annotation.starts_with("R[") {
                "Failed to parse \"R\" option".to_string()
            } else if annotation.starts_with("Fn[") {
                "Failed to parse \"Fn\" option".to_string()
            } else {
                format!("Skipped unknown info [{}]", annotation)
            };
            diag.warn(line, message, Some(annotation));
            return;
        }
    };

    match pair.as_rule() {
        Rule::reference_annotation => {
            let args = split_args(&pair);
            match ReferenceDb::from_symbol(&args[0]) {
                Some(db) => {
                    let mut func = Vec::with_capacity(args.len());
                    func.push(db.identifier().to_string());
                    func.extend(args.into_iter().skip(1));
                    field.function_ref = Some(func);
                }
                None => diag.warn(
                    line,
                    format!("Failed to parse \"R\" option - Unknown Reference Database: [{}]", args[0]),
                    Some(annotation),
                ),
            }
        }
        Rule::function_annotation => field.function_ref = Some(split_args(&pair)),
        Rule::type_annotation => {
            field.forced_type = first_inner_str(&pair).and_then(ForcedType::from_name);
        }
        Rule::param_annotation => {
            field.param_alias = first_inner_str(&pair).map(str::to_string);
        }
        _ => diag.warn(line, format!("Skipped unknown info [{}]", annotation), Some(annotation)),
    }
}

fn first_inner_str<'a>(pair: &Pair<'a, Rule>) -> Option<&'a str> {
    pair.clone().into_inner().next().map(|p| p.as_str())
}

/// Comma-split the bracketed argument list of `R[...]` / `Fn[...]`. Always at least one element.
fn split_args(pair: &Pair<Rule>) -> Vec<String> {
    first_inner_str(pair)
        .unwrap_or("")
        .split(',')
        .map(str::to_string)
        .collect()
}

/// Recognize `+ Fragment[..]`, `+ SubCate`, `+ REP`, `- REP` and `pack`.
pub fn parse_control_line(text: &str) -> Option<BodyLine> {
    let pair = LineParser::parse(Rule::control_line, text).ok()?.next()?;
    let inner = pair.into_inner().next()?;
    match inner.as_rule() {
        Rule::fragment_ref => first_inner_str(&inner).map(|n| BodyLine::FragmentRef(n.to_string())),
        Rule::subcate_placeholder => Some(BodyLine::SubcatePlaceholder),
        Rule::repeat_start => Some(BodyLine::RepeatStart),
        Rule::repeat_end => Some(BodyLine::RepeatEnd),
        Rule::pack => Some(BodyLine::Pack),
        _ => None,
    }
}

/// Parse `SubCate[desc]`, `SubCate[desc:HEX]`, `SubCate[:HEX]` or `SubCate[desc]:HEX`.
pub fn parse_subcate_decl(text: &str, line: usize) -> Result<SubcateDecl> {
    let malformed = || CompileError::new(ErrorKind::MalformedSubcate, line, text);
    let pair = LineParser::parse(Rule::subcate_decl, text)
        .map_err(|_| malformed())?
        .next()
        .ok_or_else(malformed)?;

    let mut description = String::new();
    let mut discriminator = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::subcate_desc => description = inner.as_str().trim().to_string(),
            Rule::discriminator | Rule::trailing_discriminator => {
                let hex = inner.as_str().trim();
                if !hex.is_empty() {
                    discriminator = Some(hex.to_string());
                }
            }
            _ => {}
        }
    }

    if description.is_empty() && discriminator.is_none() {
        return Err(malformed());
    }
    if let Some(hex) = &discriminator {
        if !is_hex_bytes(hex) {
            return Err(CompileError::new(ErrorKind::NonHexDiscriminator(hex.clone()), line, text));
        }
    }
    Ok(SubcateDecl {
        description,
        discriminator,
    })
}

fn is_hex_bytes(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `Fragment[name]` (or `+ Fragment[name]`) header → name.
pub fn parse_fragment_header(text: &str) -> Option<String> {
    let pair = LineParser::parse(Rule::fragment_decl, text).ok()?.next()?;
    first_inner_str(&pair).map(str::to_string)
}

/// `Packet[desc]:HEX` header → (description, upper-cased header).
pub fn parse_packet_header(text: &str) -> Option<(String, String)> {
    let pair = LineParser::parse(Rule::packet_decl, text).ok()?.next()?;
    let mut desc = None;
    let mut header = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::packet_desc => desc = Some(inner.as_str().to_string()),
            Rule::packet_header => header = Some(inner.as_str().to_ascii_uppercase()),
            _ => {}
        }
    }
    Some((desc?, header?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(text: &str) -> (Token, FieldDescriptor, Diagnostics) {
        let mut d = Diagnostics::new();
        let (t, f) = parse_field_line(text, 1, &mut d).expect("parse").expect("field line");
        (t, f, d)
    }

    #[test]
    fn tokens_accept_grammar_and_reject_partial_matches() {
        assert_eq!(parse_signature_token("$4"), Some(Token::Size(4)));
        assert_eq!(parse_signature_token("64$4"), Some(Token::Composite(Composite::Int64Pair)));
        assert_eq!(parse_signature_token("0aFF"), Some(Token::Hex("0aFF".to_string())));
        assert_eq!(parse_signature_token("param"), Some(Token::Composite(Composite::Param)));
        assert_eq!(parse_signature_token("$3"), None);
        assert_eq!(parse_signature_token("ABC"), None);
        assert_eq!(parse_signature_token("$2x"), None);
        assert_eq!(parse_signature_token(""), None);
    }

    #[test]
    fn padding_line() {
        let (t, f, _) = field("pad-3");
        assert_eq!(t.to_string(), "000000");
        assert_eq!(f.name, "Padding");
    }

    #[test]
    fn padding_must_be_integer() {
        let mut d = Diagnostics::new();
        let err = parse_field_line("pad-x", 4, &mut d).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPadding("x".to_string()));
        assert_eq!(err.line, 4);
    }

    #[test]
    fn padding_is_capped() {
        let mut d = Diagnostics::new();
        let (t, _) = parse_field_line("pad-4096", 1, &mut d).unwrap().unwrap();
        assert_eq!(t, Token::Padding(MAX_PADDING));
        let err = parse_field_line("pad-4000000000", 6, &mut d).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidPadding("4000000000".to_string()));
        assert_eq!(err.raw, "pad-4000000000");
        assert_eq!(err.line, 6);
    }

    #[test]
    fn non_field_lines() {
        let mut d = Diagnostics::new();
        assert!(parse_field_line("SubCate[A:01]", 1, &mut d).unwrap().is_none());
        assert!(parse_field_line("+ REP", 1, &mut d).unwrap().is_none());
    }

    #[test]
    fn invalid_token_quotes_token() {
        let mut d = Diagnostics::new();
        let err = parse_field_line("X:$3", 2, &mut d).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidToken("$3".to_string()));
        assert_eq!(err.raw, "X:$3");
    }

    #[test]
    fn all_annotations_apply_to_one_field() {
        let (_, f, d) = field("Target:$4:R[npc,1]:T[uint]:P[@target] // comment");
        assert_eq!(f.function_ref, Some(vec!["db_NPC".to_string(), "1".to_string()]));
        assert_eq!(f.forced_type, Some(ForcedType::UInt));
        assert_eq!(f.param_alias.as_deref(), Some("@target"));
        assert_eq!(d.warning_count(), 0);
    }

    #[test]
    fn fn_annotation_is_raw() {
        let (_, f, _) = field("Effect:$2:Fn[eHeroEffect,x]");
        assert_eq!(f.function_ref, Some(vec!["eHeroEffect".to_string(), "x".to_string()]));
    }

    #[test]
    fn bad_annotations_warn_and_are_dropped() {
        let (_, f, d) = field("X:$1:R[Quest]:T[long]:P[name]:Q[1]");
        assert_eq!(f, FieldDescriptor::named("X"));
        assert_eq!(d.warning_count(), 4);
    }

    #[test]
    fn control_lines() {
        assert_eq!(parse_control_line("+ Fragment[Pos]"), Some(BodyLine::FragmentRef("Pos".to_string())));
        assert_eq!(parse_control_line("+ SubCate"), Some(BodyLine::SubcatePlaceholder));
        assert_eq!(parse_control_line("+ REP"), Some(BodyLine::RepeatStart));
        assert_eq!(parse_control_line("- REP"), Some(BodyLine::RepeatEnd));
        assert_eq!(parse_control_line("pack"), Some(BodyLine::Pack));
        assert_eq!(parse_control_line("packet"), None);
    }

    #[test]
    fn subcate_forms() {
        let d = parse_subcate_decl("SubCate[A:01]", 1).unwrap();
        assert_eq!((d.description.as_str(), d.discriminator.as_deref()), ("A", Some("01")));
        let d = parse_subcate_decl("SubCate[Move]:0A", 1).unwrap();
        assert_eq!((d.description.as_str(), d.discriminator.as_deref()), ("Move", Some("0A")));
        let d = parse_subcate_decl("SubCate[Only desc]", 1).unwrap();
        assert_eq!(d.discriminator, None);
        let d = parse_subcate_decl("SubCate[:FF]", 1).unwrap();
        assert_eq!(d.description, "");
        assert_eq!(parse_subcate_decl("SubCate[]", 1).unwrap_err().kind, ErrorKind::MalformedSubcate);
        assert_eq!(
            parse_subcate_decl("SubCate[A:0G]", 1).unwrap_err().kind,
            ErrorKind::NonHexDiscriminator("0G".to_string())
        );
    }

    #[test]
    fn headers() {
        assert_eq!(parse_fragment_header("Fragment[Pos]").as_deref(), Some("Pos"));
        assert_eq!(parse_fragment_header("Fragment[]"), None);
        assert_eq!(
            parse_packet_header("Packet[Hero Effect]:6f"),
            Some(("Hero Effect".to_string(), "6F".to_string()))
        );
        assert_eq!(parse_packet_header("Packet[X]:6"), None);
    }
}
