//! The recursive-descent pass over the token stream.

use arcstr::ArcStr;

use crate::lexer::Token;
use crate::{Entity, Error, Property, Result, WorldFile};

struct Macro {
    name: String,
    /// Index of the entity-name token the macro expands to.
    start_item: usize,
    line: usize,
}

struct Parser<'a> {
    tokens: &'a [Token],
    entities: Vec<Entity>,
    properties: Vec<Property>,
    macros: Vec<Macro>,
    line: usize,
}

/// Builds the entity/property tables from a token stream.
pub(crate) fn parse(tokens: &[Token]) -> Result<WorldFile> {
    let mut parser = Parser {
        tokens,
        entities: vec![Entity {
            parent: None,
            kind: ArcStr::new(),
        }],
        properties: Vec::new(),
        macros: Vec::new(),
        line: 1,
    };
    parser.run()?;
    Ok(WorldFile {
        entities: parser.entities,
        properties: parser.properties,
    })
}

impl<'a> Parser<'a> {
    fn run(&mut self) -> Result<()> {
        let tokens = self.tokens;
        let mut i = 0usize;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w.eq_ignore_ascii_case("include") => {
                    self.parse_include(&mut i)?;
                }
                Token::Word(w) if w.eq_ignore_ascii_case("define") => {
                    self.parse_define(&mut i)?;
                }
                Token::Word(_) => self.parse_word(0, &mut i)?,
                Token::Comment(_) | Token::Space => {}
                Token::Eol => self.line += 1,
                t => return Err(self.unexpected(t)),
            }
            i += 1;
        }
        Ok(())
    }

    /// Skips an already-spliced `include` line.
    fn parse_include(&mut self, index: &mut usize) -> Result<()> {
        let tokens = self.tokens;
        let mut i = *index + 1;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Str(_) | Token::Space => {}
                Token::Eol => {
                    *index = i;
                    self.line += 1;
                    return Ok(());
                }
                t => return Err(self.unexpected(t)),
            }
            i += 1;
        }
        Err(self.unexpected_eof())
    }

    /// Records a `define name entity ( … )` macro without expanding it.
    fn parse_define(&mut self, index: &mut usize) -> Result<()> {
        let tokens = self.tokens;
        let mut count = 0i32;
        let mut macro_name: Option<&str> = None;
        let mut start_item: Option<usize> = None;
        let define_line = self.line;

        let mut i = *index + 1;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if count == 0 => {
                    if macro_name.is_none() {
                        macro_name = Some(w);
                    } else if start_item.is_none() {
                        start_item = Some(i);
                    } else {
                        return Err(self.unexpected(&tokens[i]));
                    }
                }
                Token::OpenEntity => count += 1,
                Token::CloseEntity => {
                    count -= 1;
                    if count == 0 {
                        let (Some(name), Some(start)) = (macro_name, start_item) else {
                            return Err(self.unexpected(&tokens[i]));
                        };
                        self.macros.push(Macro {
                            name: name.to_owned(),
                            start_item: start,
                            line: define_line,
                        });
                        *index = i;
                        return Ok(());
                    }
                    if count < 0 {
                        return Err(self.unexpected(&tokens[i]));
                    }
                }
                Token::Eol => self.line += 1,
                _ => {}
            }
            i += 1;
        }
        Err(self.unexpected_eof())
    }

    /// Something starting with a word: an entity or a property.
    fn parse_word(&mut self, entity: usize, index: &mut usize) -> Result<()> {
        let tokens = self.tokens;
        let mut i = *index + 1;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Comment(_) | Token::Space => {}
                Token::Eol => self.line += 1,
                Token::OpenEntity => return self.parse_entity(entity, index),
                Token::Num(_) | Token::Str(_) | Token::OpenTuple => {
                    return self.parse_property(entity, index)
                }
                t => return Err(self.unexpected(t)),
            }
            i += 1;
        }
        Err(self.unexpected_eof())
    }

    fn parse_entity(&mut self, parent: usize, index: &mut usize) -> Result<()> {
        let tokens = self.tokens;
        let name_idx = *index;
        let name = self.word_at(name_idx)?.to_owned();

        let macro_idx = self
            .macros
            .iter()
            .position(|m| m.name.eq_ignore_ascii_case(&name));

        let mut entity = parent;
        if let Some(m) = macro_idx {
            // Expand the macro body first, then parse the call-site body
            // into the entity it created.
            let new_entity = self.entities.len();
            let (mut mindex, mline) = (self.macros[m].start_item, self.macros[m].line);
            let saved_line = std::mem::replace(&mut self.line, mline);
            self.parse_entity(parent, &mut mindex)?;
            self.line = saved_line;
            entity = new_entity;

            let mut i = *index + 1;
            while i < tokens.len() {
                match &tokens[i] {
                    Token::OpenEntity | Token::Comment(_) | Token::Space => {}
                    Token::Word(_) => self.parse_word(entity, &mut i)?,
                    Token::CloseEntity => {
                        *index = i;
                        return Ok(());
                    }
                    Token::Eol => self.line += 1,
                    t => return Err(self.unexpected(t)),
                }
                i += 1;
            }
        } else {
            let mut i = *index + 1;
            while i < tokens.len() {
                match &tokens[i] {
                    Token::OpenEntity => {
                        entity = self.push_entity(parent, &name);
                    }
                    Token::Word(_) => self.parse_word(entity, &mut i)?,
                    Token::CloseEntity => {
                        *index = i;
                        return Ok(());
                    }
                    Token::Comment(_) | Token::Space => {}
                    Token::Eol => self.line += 1,
                    t => return Err(self.unexpected(t)),
                }
                i += 1;
            }
        }
        Err(self.unexpected_eof())
    }

    fn parse_property(&mut self, entity: usize, index: &mut usize) -> Result<()> {
        let tokens = self.tokens;
        let name = self.word_at(*index)?.to_owned();
        let mut i = *index + 1;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Num(v) | Token::Str(v) => {
                    self.push_property(entity, &name, vec![v.clone()]);
                    *index = i;
                    return Ok(());
                }
                Token::OpenTuple => {
                    let values = self.parse_tuple(&mut i)?;
                    self.push_property(entity, &name, values);
                    *index = i;
                    return Ok(());
                }
                Token::Space => {}
                t => return Err(self.unexpected(t)),
            }
            i += 1;
        }
        Err(self.unexpected_eof())
    }

    fn parse_tuple(&mut self, index: &mut usize) -> Result<Vec<String>> {
        let tokens = self.tokens;
        let mut values = Vec::new();
        let mut i = *index + 1;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Num(v) | Token::Str(v) => values.push(v.clone()),
                Token::CloseTuple => {
                    *index = i;
                    return Ok(values);
                }
                Token::Space => {}
                t => return Err(self.unexpected(t)),
            }
            i += 1;
        }
        Err(self.unexpected_eof())
    }

    fn word_at(&self, index: usize) -> Result<&'a str> {
        let tokens = self.tokens;
        match &tokens[index] {
            Token::Word(w) => Ok(w.as_str()),
            t => Err(self.unexpected(t)),
        }
    }

    fn push_entity(&mut self, parent: usize, kind: &str) -> usize {
        self.entities.push(Entity {
            parent: Some(parent),
            kind: ArcStr::from(kind),
        });
        self.entities.len() - 1
    }

    fn push_property(&mut self, entity: usize, name: &str, values: Vec<String>) {
        self.properties.push(Property {
            entity,
            name: ArcStr::from(name),
            values,
        });
    }

    fn unexpected(&self, token: &Token) -> Error {
        Error::Syntax {
            line: self.line,
            token: token.describe(),
        }
    }

    fn unexpected_eof(&self) -> Error {
        Error::Syntax {
            line: self.line,
            token: "<eof>".into(),
        }
    }
}
