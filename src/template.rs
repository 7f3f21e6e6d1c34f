//! Placeholder substitution for asset fields and image tags.
//!
//! `{name}` is replaced by the value of fact `name`; `{{` and `}}` are
//! literal braces. Nothing else is interpreted.

use thiserror::Error;

use crate::factset::Factset;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Undefined fact \"{fact}\" in \"{template}\"")]
    UndefinedFact { fact: String, template: String },

    #[error("Malformed template \"{template}\" at byte {position}")]
    Malformed { template: String, position: usize },
}

enum Piece<'a> {
    Text(&'a str),
    Fact(&'a str),
}

fn parse(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let malformed = |position| TemplateError::Malformed {
        template: template.to_string(),
        position,
    };

    let bytes = template.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                pieces.push(Piece::Text(&template[start..=i]));
                i += 2;
                start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                pieces.push(Piece::Text(&template[start..=i]));
                i += 2;
                start = i;
            }
            b'{' => {
                let close = template[i + 1..]
                    .find(['{', '}'])
                    .map(|offset| i + 1 + offset)
                    .filter(|&close| bytes[close] == b'}')
                    .ok_or_else(|| malformed(i))?;
                let name = template[i + 1..close].trim();
                if name.is_empty() {
                    return Err(malformed(i));
                }
                pieces.push(Piece::Text(&template[start..i]));
                pieces.push(Piece::Fact(name));
                i = close + 1;
                start = i;
            }
            b'}' => return Err(malformed(i)),
            _ => i += 1,
        }
    }
    pieces.push(Piece::Text(&template[start..]));

    Ok(pieces)
}

/// Substitute every placeholder in `template` from `facts`.
pub fn expand(template: &str, facts: &Factset) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for piece in parse(template)? {
        match piece {
            Piece::Text(text) => out.push_str(text),
            Piece::Fact(name) => {
                let value = facts.get(name).ok_or_else(|| TemplateError::UndefinedFact {
                    fact: name.to_string(),
                    template: template.to_string(),
                })?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

/// Fact names referenced by `template`, in order of appearance.
pub fn placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|piece| match piece {
            Piece::Fact(name) => Some(name.to_string()),
            Piece::Text(_) => None,
        })
        .collect())
}
