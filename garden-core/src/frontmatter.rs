use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("frontmatter must be a mapping")]
    NotAMapping,
}

/// Split a leading `---` delimited block off a note.
///
/// Returns `(yaml, body)`. Without frontmatter the whole text is the body.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    (None, content)
}

/// Parse the frontmatter of a note into a mapping and return the body.
pub fn parse_frontmatter(content: &str) -> Result<(Mapping, &str), FrontmatterError> {
    let (yaml, body) = split_frontmatter(content);
    let Some(yaml) = yaml else {
        return Ok((Mapping::new(), body));
    };

    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(mapping) => Ok((mapping, body)),
        Value::Null => Ok((Mapping::new(), body)),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

pub fn title(metadata: &Mapping) -> Option<&str> {
    metadata
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
