//! Uniform reflection for the annotated effect dialect.
//!
//! Only top-level `uniform` declarations are interpreted:
//!
//! ```text
//! uniform float speed<
//!     string type = "slider";
//!     float min = 0.0;
//!     float max = 10.0;
//! > = 1.0;
//! ```
//!
//! Everything else in the file (samplers, functions, techniques) is skipped
//! apart from brace matching.

use crate::error::CompileError;
use crate::host::{CompiledProgram, ShaderCompiler};

use super::program::EffectProgram;
use super::types::{ParamDescriptor, ParamType};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Lexed {
    tok: Tok,
    line: usize,
    column: usize,
}

fn syntax(line: usize, column: usize, message: impl Into<String>) -> CompileError {
    CompileError::Syntax {
        line,
        column,
        message: message.into(),
    }
}

fn lex(source: &str) -> Result<Vec<Lexed>, CompileError> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = Vec::new();
    let (mut i, mut line, mut column) = (0usize, 1usize, 1usize);

    let advance = |i: &mut usize, line: &mut usize, column: &mut usize, c: char| {
        *i += 1;
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    };

    while i < chars.len() {
        let c = chars[i];
        let (start_line, start_column) = (line, column);

        if c.is_whitespace() {
            advance(&mut i, &mut line, &mut column, c);
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                let ch = chars[i];
                advance(&mut i, &mut line, &mut column, ch);
            }
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            advance(&mut i, &mut line, &mut column, '/');
            advance(&mut i, &mut line, &mut column, '*');
            loop {
                if i >= chars.len() {
                    return Err(syntax(start_line, start_column, "unterminated comment"));
                }
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    advance(&mut i, &mut line, &mut column, '*');
                    advance(&mut i, &mut line, &mut column, '/');
                    break;
                }
                let ch = chars[i];
                advance(&mut i, &mut line, &mut column, ch);
            }
            continue;
        }

        if c == '"' {
            advance(&mut i, &mut line, &mut column, c);
            let mut text = String::new();
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(syntax(start_line, start_column, "unterminated string"));
                };
                advance(&mut i, &mut line, &mut column, ch);
                match ch {
                    '"' => break,
                    '\\' => {
                        let Some(&escaped) = chars.get(i) else {
                            return Err(syntax(start_line, start_column, "unterminated string"));
                        };
                        advance(&mut i, &mut line, &mut column, escaped);
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                    '\n' => {
                        return Err(syntax(start_line, start_column, "unterminated string"));
                    }
                    other => text.push(other),
                }
            }
            out.push(Lexed {
                tok: Tok::Str(text),
                line: start_line,
                column: start_column,
            });
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let mut text = String::new();
            while let Some(&ch) = chars.get(i) {
                let exponent_sign = (ch == '+' || ch == '-')
                    && text.ends_with(['e', 'E'])
                    && !text.is_empty();
                if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exponent_sign {
                    text.push(ch);
                    advance(&mut i, &mut line, &mut column, ch);
                } else {
                    break;
                }
            }
            if matches!(chars.get(i), Some('f' | 'F')) {
                advance(&mut i, &mut line, &mut column, 'f');
            }
            let value = text
                .parse::<f64>()
                .map_err(|_| syntax(start_line, start_column, format!("invalid number '{text}'")))?;
            out.push(Lexed {
                tok: Tok::Number(value),
                line: start_line,
                column: start_column,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut text = String::new();
            while let Some(&ch) = chars.get(i) {
                if ch.is_alphanumeric() || ch == '_' {
                    text.push(ch);
                    advance(&mut i, &mut line, &mut column, ch);
                } else {
                    break;
                }
            }
            out.push(Lexed {
                tok: Tok::Ident(text),
                line: start_line,
                column: start_column,
            });
            continue;
        }

        advance(&mut i, &mut line, &mut column, c);
        out.push(Lexed {
            tok: Tok::Punct(c),
            line: start_line,
            column: start_column,
        });
    }

    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Number(f64),
    Bool(bool),
    Str(String),
    List(Vec<Literal>),
}

fn flatten(literal: &Literal, out: &mut Vec<f64>) -> Result<(), String> {
    match literal {
        Literal::Number(v) => out.push(*v),
        Literal::Bool(b) => out.push(if *b { 1.0 } else { 0.0 }),
        Literal::List(items) => {
            for item in items {
                flatten(item, out)?;
            }
        }
        Literal::Str(_) => return Err("expected a number, found a string".into()),
    }
    Ok(())
}

/// Encode a literal as the raw default bytes of `ty`.
fn encode(ty: ParamType, literal: &Literal) -> Result<Vec<u8>, String> {
    match ty {
        ParamType::String => match literal {
            Literal::Str(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                Ok(bytes)
            }
            _ => Err("expected a string literal".into()),
        },
        ParamType::Texture | ParamType::Unknown => Ok(Vec::new()),
        _ => {
            let mut values = Vec::new();
            flatten(literal, &mut values)?;
            let n = ty.component_count();
            if values.len() == 1 && n > 1 {
                values = vec![values[0]; n];
            }
            if values.len() != n {
                return Err(format!("expected {n} value(s), found {}", values.len()));
            }
            let bytes = if ty.is_float() {
                values
                    .iter()
                    .flat_map(|&v| (v as f32).to_ne_bytes())
                    .collect()
            } else {
                values
                    .iter()
                    .flat_map(|&v| (v as i32).to_ne_bytes())
                    .collect()
            };
            Ok(bytes)
        }
    }
}

struct Reflector {
    toks: Vec<Lexed>,
    pos: usize,
    end: (usize, usize),
}

impl Reflector {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|t| &t.tok)
    }

    fn position(&self) -> (usize, usize) {
        self.toks
            .get(self.pos)
            .map_or(self.end, |t| (t.line, t.column))
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let (line, column) = self.position();
        syntax(line, column, message)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).map(|t| t.tok.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(&Tok::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), CompileError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, CompileError> {
        match self.peek() {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn parse(&mut self) -> Result<Vec<ParamDescriptor>, CompileError> {
        let mut params = Vec::new();
        let mut depth = 0usize;

        while let Some(tok) = self.peek().cloned() {
            match tok {
                Tok::Punct('{') => {
                    depth += 1;
                    self.pos += 1;
                }
                Tok::Punct('}') => {
                    if depth == 0 {
                        return Err(self.error("unmatched '}'"));
                    }
                    depth -= 1;
                    self.pos += 1;
                }
                Tok::Ident(ref kw) if kw == "uniform" && depth == 0 => {
                    self.pos += 1;
                    params.push(self.uniform()?);
                }
                _ => self.pos += 1,
            }
        }

        if depth > 0 {
            return Err(self.error("unterminated block"));
        }
        Ok(params)
    }

    fn uniform(&mut self) -> Result<ParamDescriptor, CompileError> {
        let keyword = self.ident("a type name")?;
        let param_type = ParamType::from_keyword(&keyword);
        let name = self.ident("a uniform name")?;
        if self.peek() == Some(&Tok::Punct('[')) {
            return Err(self.error("array uniforms are not supported"));
        }

        let mut annotations = Vec::new();
        if self.eat('<') {
            while !self.eat('>') {
                if self.peek().is_none() {
                    return Err(self.error("unterminated annotation list"));
                }
                annotations.push(self.annotation()?);
            }
        }

        let mut default = Vec::new();
        if self.eat('=') {
            let at = self.position();
            let literal = self.literal()?;
            default = encode(param_type, &literal).map_err(|m| syntax(at.0, at.1, m))?;
        }
        self.expect(';')?;

        log::trace!("reflected uniform {keyword} {name} ({} annotations)", annotations.len());
        Ok(ParamDescriptor {
            name,
            param_type,
            default,
            annotations,
        })
    }

    fn annotation(&mut self) -> Result<ParamDescriptor, CompileError> {
        let keyword = self.ident("an annotation type")?;
        let param_type = ParamType::from_keyword(&keyword);
        let name = self.ident("an annotation name")?;
        self.expect('=')?;
        let at = self.position();
        let literal = self.literal()?;
        let default = encode(param_type, &literal).map_err(|m| syntax(at.0, at.1, m))?;
        self.expect(';')?;
        Ok(ParamDescriptor {
            name,
            param_type,
            default,
            annotations: Vec::new(),
        })
    }

    fn literal(&mut self) -> Result<Literal, CompileError> {
        let at = self.position();
        match self.next() {
            Some(Tok::Number(v)) => Ok(Literal::Number(v)),
            Some(Tok::Str(s)) => Ok(Literal::Str(s)),
            Some(Tok::Punct(sign @ ('-' | '+'))) => match self.next() {
                Some(Tok::Number(v)) => Ok(Literal::Number(if sign == '-' { -v } else { v })),
                _ => Err(syntax(at.0, at.1, "expected a number after sign")),
            },
            Some(Tok::Ident(word)) if word == "true" => Ok(Literal::Bool(true)),
            Some(Tok::Ident(word)) if word == "false" => Ok(Literal::Bool(false)),
            Some(Tok::Punct('{')) => self.list('}'),
            // Constructor form, e.g. `float2(1, 2)`.
            Some(Tok::Ident(_)) => {
                if self.eat('(') {
                    self.list(')')
                } else {
                    Err(syntax(at.0, at.1, "expected a value"))
                }
            }
            _ => Err(syntax(at.0, at.1, "expected a value")),
        }
    }

    fn list(&mut self, close: char) -> Result<Literal, CompileError> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                break;
            }
            items.push(self.literal()?);
            if self.eat(close) {
                break;
            }
            if !self.eat(',') {
                return Err(self.error(format!("expected ',' or '{close}'")));
            }
        }
        Ok(Literal::List(items))
    }
}

/// Extract the uniform table from effect source text.
pub fn reflect(source: &str) -> Result<Vec<ParamDescriptor>, CompileError> {
    let toks = lex(source)?;
    let end = source
        .lines()
        .enumerate()
        .last()
        .map_or((1, 1), |(i, l)| (i + 1, l.chars().count() + 1));
    Reflector { toks, pos: 0, end }.parse()
}

/// [`ShaderCompiler`] for effect files, producing an [`EffectProgram`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectCompiler;

impl ShaderCompiler for EffectCompiler {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledProgram>, CompileError> {
        let params = reflect(source)?;
        log::debug!("effect reflected {} uniforms", params.len());
        Ok(Box::new(EffectProgram::new(params)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::ValueBox;

    const EFFECT: &str = r#"
// Built-ins supplied by the filter.
uniform float4x4 ViewProj;
uniform texture2d image;
uniform float elapsed_time;

/* A slider with an expression. */
uniform float speed<
    string type = "slider";
    float min = -1.5;
    float max = 10;
    string expr = "sin(elapsed_time)";
> = 1.0f;
uniform float4 tint = {1.0, 0.5, 0.0, 1.0};
uniform int2 offset = int2(3, -4);
uniform bool flag<bool is_slider = false;> = true;
uniform string note = "a \"quoted\" note";
uniform float3 fill = 0.25;

sampler_state textureSampler {
    Filter = Linear;
};

float4 mainImage(VertData v_in) : TARGET
{
    return image.Sample(textureSampler, v_in.uv) * tint;
}

technique Draw
{
    pass
    {
        vertex_shader = mainTransform(v_in);
        pixel_shader = mainImage(v_in);
    }
}
"#;

    fn value(p: &ParamDescriptor) -> ValueBox {
        ValueBox::new(p.param_type, p.default.clone())
    }

    #[test]
    fn reflects_uniforms_in_declaration_order() {
        let params = reflect(EFFECT).unwrap();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            ["ViewProj", "image", "elapsed_time", "speed", "tint", "offset", "flag", "note", "fill"]
        );
        assert_eq!(params[0].param_type, ParamType::Matrix4x4);
        assert_eq!(params[1].param_type, ParamType::Texture);
        assert!(params[0].default.is_empty());
    }

    #[test]
    fn reflects_defaults() {
        let params = reflect(EFFECT).unwrap();
        assert_eq!(value(&params[3]).to_floats(), vec![1.0]);
        assert_eq!(value(&params[4]).to_floats(), vec![1.0, 0.5, 0.0, 1.0]);
        assert_eq!(value(&params[5]).to_ints(), vec![3, -4]);
        assert_eq!(value(&params[6]).to_bools(), vec![true]);
        assert_eq!(value(&params[7]).to_text(), "a \"quoted\" note");
        assert_eq!(value(&params[8]).to_floats(), vec![0.25, 0.25, 0.25]);
    }

    #[test]
    fn reflects_annotations() {
        let params = reflect(EFFECT).unwrap();
        let speed = &params[3];
        assert_eq!(speed.annotations.len(), 4);
        assert_eq!(value(&speed.annotations[0]).to_text(), "slider");
        assert_eq!(value(&speed.annotations[1]).to_floats(), vec![-1.5]);
        assert_eq!(value(&speed.annotations[2]).to_floats(), vec![10.0]);
        assert_eq!(value(&speed.annotations[3]).to_text(), "sin(elapsed_time)");
        assert_eq!(value(&params[6].annotations[0]).to_bools(), vec![false]);
    }

    #[test]
    fn reports_position_of_errors() {
        let err = reflect("uniform float x = 1.0\nuniform float y;").unwrap_err();
        assert_eq!(
            err,
            CompileError::Syntax {
                line: 2,
                column: 1,
                message: "expected ';'".into()
            }
        );

        let err = reflect("uniform float2 x = {1, 2, 3};").unwrap_err();
        assert!(err.to_string().contains("expected 2 value(s), found 3"));

        let err = reflect("uniform float x = \"text\";").unwrap_err();
        assert!(err.to_string().contains("expected a number"));

        assert!(reflect("technique Draw {").is_err());
        assert!(reflect("}").is_err());
        assert!(reflect("/* open").is_err());
        assert!(reflect("uniform float x[4];").is_err());
    }

    #[test]
    fn uniforms_inside_blocks_are_ignored() {
        let params = reflect("struct S { uniform float hidden; };\nuniform int shown;").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "shown");
    }

    #[test]
    fn compiler_builds_program_with_table() {
        let program = EffectCompiler.compile(EFFECT).unwrap();
        assert_eq!(program.params().len(), 9);
    }
}
