// Declaration extraction
//
// Scans include-expanded shader text and pulls out struct declarations,
// uniform blocks and free uniforms. Function bodies and any other top-level
// brace groups are skipped without being parsed.
//
// The scanner works on a comment-free copy of the source (comments are
// blanked, so line numbers survive) and a flat token stream. Preprocessor
// lines are not tokenized; `#define NAME N` lines feed the constant table
// used to resolve symbolic array lengths.

use std::collections::HashMap;
use std::fmt;

use super::declaration::{
    Attribute, DeclarationKind, FieldDeclaration, FieldQualifiers, Packing, SourceLocation,
    TypeDeclaration, UniformDeclaration,
};
use crate::error::CompileError;

/// Qualifiers that may precede a member or uniform type and carry no
/// layout meaning for us.
const SKIPPED_QUALIFIERS: &[&str] = &[
    "highp",
    "mediump",
    "lowp",
    "row_major",
    "column_major",
    "precise",
    "invariant",
    "flat",
    "smooth",
    "noperspective",
    "readonly",
    "writeonly",
    "coherent",
    "volatile",
    "restrict",
];

/// Bound on `const` reference chains, so self-referencing constants stop.
const MAX_CONSTANT_DEPTH: usize = 16;

/// Everything found in one source file.
#[derive(Debug, Clone, Default)]
pub struct ExtractedUnit {
    pub source_key: String,
    /// Structs and named uniform blocks, in source order.
    pub declarations: Vec<TypeDeclaration>,
    /// Free-standing uniforms, in source order.
    pub uniforms: Vec<UniformDeclaration>,
    /// Blocks with neither a block name nor an instance name.
    pub anonymous_blocks: Vec<AnonymousBlock>,
    pub warnings: Vec<ExtractWarning>,
}

/// A uniform block that cannot become a nameable host type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymousBlock {
    pub source: SourceLocation,
    pub fields: Vec<FieldDeclaration>,
}

/// Recoverable findings. Each one is also logged when it is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractWarning {
    AnonymousBlock { source: SourceLocation },
    UnsupportedPacking { block: String, packing: Packing, source: SourceLocation },
    InstanceArrayIgnored { block: String, source: SourceLocation },
}

impl fmt::Display for ExtractWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractWarning::AnonymousBlock { source } => {
                write!(f, "{}: uniform block has no name and no instance name, skipped", source)
            }
            ExtractWarning::UnsupportedPacking {
                block,
                packing,
                source,
            } => write!(
                f,
                "{}: block `{}` requests {} packing, laid out as std140",
                source,
                block,
                packing.as_str()
            ),
            ExtractWarning::InstanceArrayIgnored { block, source } => write!(
                f,
                "{}: instance array of block `{}` is treated as a single instance",
                source, block
            ),
        }
    }
}

/// Extract every declaration in `source`. `source_key` is the stable path
/// key recorded in each declaration's location.
pub fn extract(source_key: &str, source: &str) -> Result<ExtractedUnit, CompileError> {
    let cleaned = strip_comments(source);
    let lexed = lex(&cleaned);
    let constants = collect_constants(&lexed);

    let mut parser = Parser {
        tokens: &lexed.tokens,
        source: &cleaned,
        pos: 0,
        file: source_key,
        constants: &constants,
        default_packing: None,
        unit: ExtractedUnit {
            source_key: source_key.to_string(),
            ..ExtractedUnit::default()
        },
    };
    parser.parse_top_level()?;

    let unit = parser.unit;
    log::debug!(
        "Extracted {} declarations and {} free uniforms from {}",
        unit.declarations.len(),
        unit.uniforms.len(),
        source_key
    );
    Ok(unit)
}

/// Extract only the `struct` declarations of an auxiliary type file.
pub fn extract_types(source_key: &str, source: &str) -> Result<Vec<TypeDeclaration>, CompileError> {
    let unit = extract(source_key, source)?;
    let (structs, rest): (Vec<_>, Vec<_>) = unit
        .declarations
        .into_iter()
        .partition(|decl| decl.kind == DeclarationKind::Struct);
    if !rest.is_empty() || !unit.uniforms.is_empty() {
        log::warn!(
            "{}: shared type file declares uniforms, only structs are used",
            source_key
        );
    }
    Ok(structs)
}

// =============================================================================
// LEXING
// =============================================================================

/// Blank out `//` and `/* */` comments, keeping every newline.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
                out.push(' ');
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if previous == '*' && next == '/' {
                        break;
                    }
                    previous = next;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Number,
    Punct(char),
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind,
    text: &'a str,
    line: u32,
    column: u32,
    start: usize,
    end: usize,
}

struct Lexed<'a> {
    tokens: Vec<Token<'a>>,
    /// Preprocessor lines as `(line, text)`, `#` included.
    directives: Vec<(u32, &'a str)>,
}

fn lex(source: &str) -> Lexed<'_> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut directives = Vec::new();
    let mut line = 1u32;
    let mut line_start = 0usize;
    let mut at_line_start = true;
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\n' {
            line += 1;
            i += 1;
            line_start = i;
            at_line_start = true;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == b'#' && at_line_start {
            let end = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
            directives.push((line, source[i..end].trim_end()));
            i = end;
            continue;
        }
        at_line_start = false;

        let start = i;
        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            TokenKind::Ident
        } else if c.is_ascii_digit() {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
            TokenKind::Number
        } else {
            let ch = source[i..].chars().next().unwrap_or('\0');
            i += ch.len_utf8().max(1);
            TokenKind::Punct(ch)
        };
        tokens.push(Token {
            kind,
            text: &source[start..i],
            line,
            column: (start - line_start) as u32 + 1,
            start,
            end: i,
        });
    }

    Lexed { tokens, directives }
}

/// `#define NAME value` and `const int|uint NAME = value;` definitions.
fn collect_constants(lexed: &Lexed<'_>) -> HashMap<String, String> {
    let mut constants = HashMap::new();

    for (_, directive) in &lexed.directives {
        let mut parts = directive.trim_start_matches('#').split_whitespace();
        if parts.next() != Some("define") {
            continue;
        }
        if let (Some(name), Some(value)) = (parts.next(), parts.next()) {
            constants.insert(name.to_string(), value.to_string());
        }
    }

    for window in lexed.tokens.windows(6) {
        let is_const = window[0].text == "const"
            && matches!(window[1].text, "int" | "uint")
            && window[2].kind == TokenKind::Ident
            && window[3].kind == TokenKind::Punct('=')
            && matches!(window[4].kind, TokenKind::Ident | TokenKind::Number)
            && window[5].kind == TokenKind::Punct(';');
        if is_const {
            constants
                .entry(window[2].text.to_string())
                .or_insert_with(|| window[4].text.to_string());
        }
    }

    constants
}

/// Decimal or hex integer literal with an optional `u` suffix.
fn parse_int_literal(text: &str) -> Option<u32> {
    let digits = text.strip_suffix(['u', 'U']).unwrap_or(text);
    match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => digits.parse().ok(),
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Debug, Default)]
struct LayoutQualifiers {
    packing: Option<Packing>,
    binding: Option<u32>,
    location: Option<u32>,
}

struct Parser<'p, 'a> {
    tokens: &'p [Token<'a>],
    source: &'a str,
    pos: usize,
    file: &'p str,
    constants: &'p HashMap<String, String>,
    /// Set by a `layout(...) uniform;` default-qualifier statement.
    default_packing: Option<Packing>,
    unit: ExtractedUnit,
}

impl<'p, 'a> Parser<'p, 'a> {
    fn parse_top_level(&mut self) -> Result<(), CompileError> {
        let mut attributes = Vec::new();

        while let Some(token) = self.peek() {
            match (token.kind, token.text) {
                (TokenKind::Punct('['), _) => {
                    if let Some(attribute) = self.try_parse_attribute() {
                        attributes.push(attribute);
                    } else {
                        self.pos += 1;
                    }
                }
                (TokenKind::Ident, "struct")
                    if self.kind_at(1) == Some(TokenKind::Ident)
                        && self.kind_at(2) == Some(TokenKind::Punct('{')) =>
                {
                    let name = self.tokens[self.pos + 1];
                    self.pos += 3;
                    let declaration = self.parse_struct(token, name.text, std::mem::take(&mut attributes))?;
                    self.unit.declarations.push(declaration);
                }
                (TokenKind::Ident, "layout") | (TokenKind::Ident, "uniform") => {
                    self.parse_uniform(token, std::mem::take(&mut attributes))?;
                }
                (TokenKind::Punct('{'), _) => {
                    self.skip_group();
                    attributes.clear();
                }
                (TokenKind::Punct(';'), _) => {
                    self.pos += 1;
                    attributes.clear();
                }
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // token helpers
    // -------------------------------------------------------------------------

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|token| token.kind)
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat_punct(&mut self, punct: char) -> bool {
        if self.kind_at(0) == Some(TokenKind::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn location(&self, token: &Token<'_>) -> SourceLocation {
        SourceLocation {
            file: self.file.to_string(),
            line: token.line,
            column: token.column,
        }
    }

    fn malformed(&self, declaration: &str, reason: impl Into<String>) -> CompileError {
        let line = self
            .tokens
            .get(self.pos.saturating_sub(1))
            .map_or(0, |token| token.line);
        CompileError::MalformedDeclaration {
            file: self.file.to_string(),
            line,
            declaration: declaration.to_string(),
            reason: reason.into(),
        }
    }

    /// Skip a balanced `{ ... }` group starting at the current `{`.
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip to just past the next `;` at the current nesting level.
    fn skip_statement(&mut self) {
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Punct(';') => {
                    self.pos += 1;
                    return;
                }
                TokenKind::Punct('{') => self.skip_group(),
                _ => self.pos += 1,
            }
        }
    }

    fn skip_qualifiers(&mut self) {
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Ident && SKIPPED_QUALIFIERS.contains(&token.text) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    // -------------------------------------------------------------------------
    // constants and array lengths
    // -------------------------------------------------------------------------

    fn resolve_constant(&self, text: &str) -> Option<u32> {
        let mut current = text;
        for _ in 0..MAX_CONSTANT_DEPTH {
            if let Some(value) = parse_int_literal(current) {
                return Some(value);
            }
            current = self.constants.get(current)?;
        }
        None
    }

    /// Parse `[N]` after a declarator name, if present.
    fn parse_array_length(&mut self, declaration: &str, field: &str) -> Result<Option<u32>, CompileError> {
        if !self.eat_punct('[') {
            return Ok(None);
        }
        let Some(token) = self.next() else {
            return Err(self.malformed(declaration, format!("unterminated array length on `{}`", field)));
        };
        let length = match token.kind {
            TokenKind::Punct(']') => {
                return Err(self.malformed(
                    declaration,
                    format!("`{}` has no array length, runtime-sized arrays are not supported", field),
                ));
            }
            TokenKind::Number | TokenKind::Ident => self.resolve_constant(token.text).ok_or_else(|| {
                self.malformed(
                    declaration,
                    format!("array length `{}` of `{}` is not numeric", token.text, field),
                )
            })?,
            TokenKind::Punct(_) => {
                return Err(self.malformed(
                    declaration,
                    format!("array length of `{}` must be a literal", field),
                ));
            }
        };
        if !self.eat_punct(']') {
            return Err(self.malformed(
                declaration,
                format!("array length of `{}` must be a single literal", field),
            ));
        }
        if length == 0 {
            return Err(self.malformed(declaration, format!("`{}` has zero array length", field)));
        }
        if self.kind_at(0) == Some(TokenKind::Punct('[')) {
            return Err(self.malformed(
                declaration,
                format!("`{}` is a multi-dimensional array", field),
            ));
        }
        Ok(Some(length))
    }

    // -------------------------------------------------------------------------
    // attributes and layout qualifiers
    // -------------------------------------------------------------------------

    /// `[name:value]`; leaves the position untouched when the bracket does
    /// not hold an attribute.
    fn try_parse_attribute(&mut self) -> Option<Attribute> {
        let name = self.tokens.get(self.pos + 1)?;
        let colon = self.tokens.get(self.pos + 2)?;
        if name.kind != TokenKind::Ident || colon.kind != TokenKind::Punct(':') {
            return None;
        }
        let close = self.tokens[self.pos + 3..]
            .iter()
            .position(|token| token.kind == TokenKind::Punct(']'))?
            + self.pos
            + 3;
        let value = self.source[colon.end..self.tokens[close].start].trim();
        let attribute = Attribute {
            name: name.text.to_string(),
            value: value.to_string(),
        };
        self.pos = close + 1;
        Some(attribute)
    }

    fn parse_layout(&mut self, context: &str) -> Result<LayoutQualifiers, CompileError> {
        let mut qualifiers = LayoutQualifiers::default();
        self.pos += 1; // `layout`
        if !self.eat_punct('(') {
            return Err(self.malformed(context, "expected `(` after `layout`"));
        }
        loop {
            let Some(token) = self.next() else {
                return Err(self.malformed(context, "unterminated layout qualifier"));
            };
            match token.kind {
                TokenKind::Punct(')') => break,
                TokenKind::Punct(',') => continue,
                TokenKind::Ident => {
                    let value = if self.eat_punct('=') {
                        let value = self
                            .next()
                            .and_then(|value| self.resolve_constant(value.text))
                            .ok_or_else(|| {
                                self.malformed(context, format!("layout `{}` needs a numeric value", token.text))
                            })?;
                        Some(value)
                    } else {
                        None
                    };
                    match (token.text, value) {
                        ("binding", Some(value)) => qualifiers.binding = Some(value),
                        ("location", Some(value)) => qualifiers.location = Some(value),
                        (name, None) if Packing::parse(name).is_some() => {
                            qualifiers.packing = Packing::parse(name);
                        }
                        (other, _) => log::debug!("{}: ignoring layout qualifier `{}`", self.file, other),
                    }
                }
                _ => return Err(self.malformed(context, "unexpected token in layout qualifier")),
            }
        }
        Ok(qualifiers)
    }

    // -------------------------------------------------------------------------
    // declarations
    // -------------------------------------------------------------------------

    /// Called with the position just past `struct Name {`.
    fn parse_struct(
        &mut self,
        keyword: Token<'a>,
        name: &str,
        attributes: Vec<Attribute>,
    ) -> Result<TypeDeclaration, CompileError> {
        let name = name.to_string();
        let fields = self.parse_fields(&name)?;
        self.eat_punct(';');

        Ok(TypeDeclaration {
            name,
            kind: DeclarationKind::Struct,
            fields,
            attributes,
            source: self.location(&keyword),
        })
    }

    /// Member declarations up to and including the closing `}`.
    fn parse_fields(&mut self, declaration: &str) -> Result<Vec<FieldDeclaration>, CompileError> {
        let mut fields = Vec::new();
        loop {
            self.skip_qualifiers();
            if self.peek().is_some_and(|token| token.text == "layout") {
                self.parse_layout(declaration)?;
                log::warn!(
                    "{}: member layout qualifier in `{}` ignored, std140 offsets are used",
                    self.file,
                    declaration
                );
                self.skip_qualifiers();
            }
            let Some(type_token) = self.next() else {
                return Err(self.malformed(declaration, "missing closing `}`"));
            };
            match type_token.kind {
                TokenKind::Punct('}') => return Ok(fields),
                TokenKind::Ident if type_token.text == "struct" => {
                    return Err(self.malformed(declaration, "nested struct definitions are not supported"));
                }
                TokenKind::Ident => {}
                _ => {
                    return Err(self.malformed(
                        declaration,
                        format!("field type name is empty (found `{}`)", type_token.text),
                    ));
                }
            }
            loop {
                let name_token = match self.next() {
                    Some(token) if token.kind == TokenKind::Ident => token,
                    _ => {
                        return Err(self.malformed(
                            declaration,
                            format!("field of type `{}` has no name", type_token.text),
                        ));
                    }
                };
                let array_length = self.parse_array_length(declaration, name_token.text)?;
                fields.push(FieldDeclaration {
                    type_name: type_token.text.to_string(),
                    field_name: name_token.text.to_string(),
                    array_length,
                    qualifiers: FieldQualifiers::default(),
                    source: self.location(&name_token),
                });
                if self.eat_punct(',') {
                    continue;
                }
                if self.eat_punct(';') {
                    break;
                }
                return Err(self.malformed(
                    declaration,
                    format!("expected `;` after field `{}`", name_token.text),
                ));
            }
        }
    }

    fn parse_uniform(&mut self, start: Token<'a>, attributes: Vec<Attribute>) -> Result<(), CompileError> {
        let layout = if start.text == "layout" {
            self.parse_layout("layout")?
        } else {
            LayoutQualifiers::default()
        };

        if !self.peek().is_some_and(|token| token.text == "uniform") {
            // `layout(location = 0) in vec3 position;` and friends.
            self.skip_statement();
            return Ok(());
        }
        self.pos += 1;
        self.skip_qualifiers();

        match (self.kind_at(0), self.kind_at(1)) {
            (Some(TokenKind::Punct(';')), _) => {
                // `layout(std140) uniform;` sets the default for later blocks
                self.pos += 1;
                if let Some(packing) = layout.packing {
                    log::debug!("{}: default uniform block packing is {}", self.file, packing.as_str());
                    self.default_packing = Some(packing);
                }
                Ok(())
            }
            (Some(TokenKind::Punct('{')), _) => {
                self.pos += 1;
                self.parse_block(None, layout, attributes, start)
            }
            (Some(TokenKind::Ident), Some(TokenKind::Punct('{'))) => {
                let name = self.next().map(|token| token.text.to_string());
                self.pos += 1;
                self.parse_block(name, layout, attributes, start)
            }
            (Some(TokenKind::Ident), Some(TokenKind::Ident)) => {
                let type_token = self.tokens[self.pos];
                self.pos += 1;
                self.parse_free_uniforms(type_token, layout, attributes)
            }
            _ => Err(self.malformed("uniform", "expected a block or a typed uniform")),
        }
    }

    fn parse_block(
        &mut self,
        block_name: Option<String>,
        layout: LayoutQualifiers,
        attributes: Vec<Attribute>,
        start: Token<'a>,
    ) -> Result<(), CompileError> {
        let context = block_name.clone().unwrap_or_else(|| "uniform block".to_string());
        let fields = self.parse_fields(&context)?;
        let source = self.location(&start);

        let instance_name = match self.peek() {
            Some(token) if token.kind == TokenKind::Ident => {
                self.pos += 1;
                Some(token.text.to_string())
            }
            _ => None,
        };
        let instance_array = self.parse_array_length(&context, instance_name.as_deref().unwrap_or(&context))?;
        if !self.eat_punct(';') {
            return Err(self.malformed(&context, "expected `;` after uniform block"));
        }

        let Some(name) = block_name.or_else(|| instance_name.clone()) else {
            let warning = ExtractWarning::AnonymousBlock { source: source.clone() };
            log::warn!("{}", warning);
            self.unit.warnings.push(warning);
            self.unit.anonymous_blocks.push(AnonymousBlock { source, fields });
            return Ok(());
        };

        if instance_array.is_some() {
            self.warn(ExtractWarning::InstanceArrayIgnored {
                block: name.clone(),
                source: source.clone(),
            });
        }
        let packing = layout.packing.or(self.default_packing).unwrap_or_default();
        if packing != Packing::Std140 {
            self.warn(ExtractWarning::UnsupportedPacking {
                block: name.clone(),
                packing,
                source: source.clone(),
            });
        }

        self.unit.declarations.push(TypeDeclaration {
            name,
            kind: DeclarationKind::UniformBlock {
                binding_slot: layout.binding,
                instance_name,
                packing,
            },
            fields,
            attributes,
            source,
        });
        Ok(())
    }

    fn parse_free_uniforms(
        &mut self,
        type_token: Token<'a>,
        layout: LayoutQualifiers,
        attributes: Vec<Attribute>,
    ) -> Result<(), CompileError> {
        loop {
            let name_token = match self.next() {
                Some(token) if token.kind == TokenKind::Ident => token,
                _ => {
                    return Err(self.malformed(
                        type_token.text,
                        format!("uniform of type `{}` has no name", type_token.text),
                    ));
                }
            };
            let array_length = self.parse_array_length(name_token.text, name_token.text)?;
            // Initialisers (`uniform float x = 1.0;`) carry no layout meaning.
            if self.eat_punct('=') {
                while let Some(token) = self.peek() {
                    if matches!(token.kind, TokenKind::Punct(',') | TokenKind::Punct(';')) {
                        break;
                    }
                    self.pos += 1;
                }
            }
            self.unit.uniforms.push(UniformDeclaration {
                type_name: type_token.text.to_string(),
                name: name_token.text.to_string(),
                array_length,
                qualifiers: FieldQualifiers {
                    binding: layout.binding,
                    location: layout.location,
                },
                attributes: attributes.clone(),
                source: self.location(&name_token),
            });
            if self.eat_punct(',') {
                continue;
            }
            if self.eat_punct(';') {
                return Ok(());
            }
            return Err(self.malformed(
                name_token.text,
                format!("expected `;` after uniform `{}`", name_token.text),
            ));
        }
    }

    fn warn(&mut self, warning: ExtractWarning) {
        log::warn!("{}", warning);
        self.unit.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
#version 330 core
#define MAX_LIGHTS 4
const int CASCADES = 3;
const uint SPLITS = CASCADES;

// a light source
struct PointLight {
    vec3 position; // world space
    float radius;
    /* colour and
       intensity */
    vec4 color;
};

[Material:Default]
[Order: 2 ]
layout(std140, binding = 2) uniform Lights {
    PointLight lights[MAX_LIGHTS];
    int count;
} lightData;

uniform mat4 model;
layout(binding = 1) uniform sampler2D albedo, normalMap;
uniform highp float cascades[SPLITS];

void main() {
    struct Local { float x; };
    gl_Position = model * vec4(1.0);
}
"#;

    #[test]
    fn test_extracts_structs_blocks_and_uniforms() {
        let unit = extract("scene.glsl", SCENE).unwrap();
        let names: Vec<_> = unit.declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["PointLight", "Lights"]);

        let light = &unit.declarations[0];
        let fields: Vec<_> = light
            .fields
            .iter()
            .map(|f| (f.type_name.as_str(), f.field_name.as_str()))
            .collect();
        assert_eq!(fields, [("vec3", "position"), ("float", "radius"), ("vec4", "color")]);
        assert_eq!(light.source.line, 8);

        let uniforms: Vec<_> = unit.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(uniforms, ["model", "albedo", "normalMap", "cascades"]);
        assert!(unit.warnings.is_empty());
    }

    #[test]
    fn test_block_qualifiers_and_attributes() {
        let unit = extract("scene.glsl", SCENE).unwrap();
        let block = &unit.declarations[1];
        assert_eq!(
            block.kind,
            DeclarationKind::UniformBlock {
                binding_slot: Some(2),
                instance_name: Some("lightData".to_string()),
                packing: Packing::Std140,
            }
        );
        assert_eq!(block.fields[0].array_length, Some(4));
        assert_eq!(
            block.attributes,
            vec![
                Attribute { name: "Material".into(), value: "Default".into() },
                Attribute { name: "Order".into(), value: "2".into() },
            ]
        );
    }

    #[test]
    fn test_symbolic_array_lengths_follow_const_chains() {
        let unit = extract("scene.glsl", SCENE).unwrap();
        let cascades = unit.uniforms.iter().find(|u| u.name == "cascades").unwrap();
        assert_eq!(cascades.array_length, Some(3));
        let albedo = unit.uniforms.iter().find(|u| u.name == "albedo").unwrap();
        assert_eq!(albedo.qualifiers.binding, Some(1));
    }

    #[test]
    fn test_non_numeric_array_length_is_malformed() {
        let err = extract("bad.glsl", "struct S { float v[COUNT]; };").unwrap_err();
        match err {
            CompileError::MalformedDeclaration { declaration, file, .. } => {
                assert_eq!(declaration, "S");
                assert_eq!(file, "bad.glsl");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unsized_and_zero_arrays_are_malformed() {
        assert!(matches!(
            extract("a.glsl", "struct S { float v[]; };"),
            Err(CompileError::MalformedDeclaration { .. })
        ));
        assert!(matches!(
            extract("a.glsl", "struct S { float v[0]; };"),
            Err(CompileError::MalformedDeclaration { .. })
        ));
        assert!(matches!(
            extract("a.glsl", "struct S { float v[2][2]; };"),
            Err(CompileError::MalformedDeclaration { .. })
        ));
    }

    #[test]
    fn test_missing_type_name_is_malformed() {
        let err = extract("a.glsl", "struct S {\n  vec3 a;\n  ;\n};").unwrap_err();
        assert!(matches!(err, CompileError::MalformedDeclaration { line: 3, .. }), "{err:?}");
    }

    #[test]
    fn test_anonymous_block_is_skipped_with_warning() {
        let unit = extract("a.glsl", "uniform { vec4 tint; float gain; };").unwrap();
        assert!(unit.declarations.is_empty());
        assert_eq!(unit.anonymous_blocks.len(), 1);
        assert_eq!(unit.anonymous_blocks[0].fields.len(), 2);
        assert!(matches!(unit.warnings[0], ExtractWarning::AnonymousBlock { .. }));
    }

    #[test]
    fn test_instance_name_names_unnamed_block() {
        let unit = extract("a.glsl", "layout(std430) uniform { float t; } frame;").unwrap();
        assert_eq!(unit.declarations[0].name, "frame");
        assert!(matches!(
            unit.warnings[0],
            ExtractWarning::UnsupportedPacking { packing: Packing::Std430, .. }
        ));
    }

    #[test]
    fn test_default_qualifier_statement_sets_block_packing() {
        let unit = extract("p.glsl", "layout(std140) uniform;\nuniform Light { vec4 c; };").unwrap();
        assert_eq!(unit.declarations.len(), 1);
        assert!(unit.warnings.is_empty());

        let unit = extract(
            "p.glsl",
            "layout(shared, row_major) uniform;\nuniform A { vec4 c; };\nlayout(std140) uniform B { vec4 c; };",
        )
        .unwrap();
        let packings: Vec<_> = unit
            .declarations
            .iter()
            .map(|declaration| match &declaration.kind {
                DeclarationKind::UniformBlock { packing, .. } => *packing,
                other => panic!("unexpected kind {other:?}"),
            })
            .collect();
        assert_eq!(packings, [Packing::Shared, Packing::Std140]);
        assert!(matches!(
            unit.warnings[..],
            [ExtractWarning::UnsupportedPacking { packing: Packing::Shared, .. }]
        ));
    }

    #[test]
    fn test_vertex_inputs_are_not_uniforms() {
        let source = "layout(location = 0) in vec3 aPos;\nlayout(location = 2) uniform vec3 tint;";
        let unit = extract("a.glsl", source).unwrap();
        assert_eq!(unit.uniforms.len(), 1);
        assert_eq!(unit.uniforms[0].qualifiers.location, Some(2));
    }

    #[test]
    fn test_multiple_declarators_share_a_type() {
        let unit = extract("a.glsl", "struct S { float a, b[2]; vec2 c; };").unwrap();
        let fields = &unit.declarations[0].fields;
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1].type_name, "float");
        assert_eq!(fields[1].array_length, Some(2));
    }

    #[test]
    fn test_extract_types_keeps_only_structs() {
        let source = "struct A { float x; };\nuniform B { A a; };";
        let types = extract_types("shared.glsl", source).unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "A");
    }

    #[test]
    fn test_int_literals() {
        assert_eq!(parse_int_literal("16"), Some(16));
        assert_eq!(parse_int_literal("4u"), Some(4));
        assert_eq!(parse_int_literal("0x10"), Some(16));
        assert_eq!(parse_int_literal("1.5"), None);
    }
}
