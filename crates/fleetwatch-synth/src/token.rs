//! Deploy-time values.
//!
//! Tokens are values that are determined by the deployment engine after it
//! creates a resource, like an ARN or a generated id. Declarations hold them
//! in place of the concrete value, and they serialize to CloudFormation
//! intrinsic functions.
use crate::{Dependencies, HasDependencies};

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// A value known at synthesis time.
    Literal(String),
    /// `{"Ref": "<depends_on>"}`
    Ref { depends_on: String },
    /// `{"Fn::GetAtt": ["<depends_on>", "<attribute>"]}`
    GetAtt {
        depends_on: String,
        attribute: String,
    },
    /// `{"Fn::Join": ["<delimiter>", [...parts]]}`
    Join {
        delimiter: String,
        parts: Vec<Token>,
    },
}

impl Token {
    pub fn literal(value: impl Into<String>) -> Self {
        Token::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Token::Ref {
            depends_on: logical_id.into(),
        }
    }

    pub fn attribute(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Token::GetAtt {
            depends_on: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    pub fn join(delimiter: impl Into<String>, parts: impl IntoIterator<Item = Token>) -> Self {
        Token::Join {
            delimiter: delimiter.into(),
            parts: parts.into_iter().collect(),
        }
    }

    /// Joins the parts with no delimiter.
    pub fn concat(parts: impl IntoIterator<Item = Token>) -> Self {
        Self::join("", parts)
    }

    /// Returns the literal value, if this token is fully known at synthesis time.
    pub fn as_literal(&self) -> Option<String> {
        match self {
            Token::Literal(s) => Some(s.clone()),
            Token::Ref { .. } | Token::GetAtt { .. } => None,
            Token::Join { delimiter, parts } => parts
                .iter()
                .map(Token::as_literal)
                .collect::<Option<Vec<_>>>()
                .map(|parts| parts.join(delimiter)),
        }
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token::Literal(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Token::Literal(value)
    }
}

impl From<&String> for Token {
    fn from(value: &String) -> Self {
        Token::Literal(value.clone())
    }
}

impl From<&Token> for Token {
    fn from(value: &Token) -> Self {
        value.clone()
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Literal(s) => f.write_str(s),
            Token::Ref { depends_on } => write!(f, "${{{depends_on}}}"),
            Token::GetAtt {
                depends_on,
                attribute,
            } => write!(f, "${{{depends_on}.{attribute}}}"),
            Token::Join { delimiter, parts } => f.write_str(
                &parts
                    .iter()
                    .map(|part| part.to_string())
                    .collect::<Vec<_>>()
                    .join(delimiter),
            ),
        }
    }
}

impl serde::Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        if let Some(literal) = self.as_literal() {
            return serializer.serialize_str(&literal);
        }
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Token::Literal(s) => map.serialize_entry("Fn::Join", &("", [s]))?,
            Token::Ref { depends_on } => map.serialize_entry("Ref", depends_on)?,
            Token::GetAtt {
                depends_on,
                attribute,
            } => map.serialize_entry("Fn::GetAtt", &[depends_on, attribute])?,
            Token::Join { delimiter, parts } => {
                map.serialize_entry("Fn::Join", &(delimiter, parts))?
            }
        }
        map.end()
    }
}

impl HasDependencies for Token {
    fn dependencies(&self) -> Dependencies {
        match self {
            Token::Literal(_) => Dependencies::default(),
            Token::Ref { depends_on } | Token::GetAtt { depends_on, .. } => {
                Dependencies::from_iter([depends_on.clone()])
            }
            Token::Join { parts, .. } => parts.dependencies(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literal_join_collapses() {
        let token = Token::join(":", ["arn".into(), "aws".into(), "iot".into()]);
        let s = serde_json::to_string(&token).unwrap();
        assert_eq!(r#""arn:aws:iot""#, s);
        assert!(token.dependencies().into_iter().next().is_none());
    }

    #[test]
    fn intrinsics() {
        let token = Token::concat([
            "https://".into(),
            Token::attribute("Distribution", "DomainName"),
        ]);
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(
            serde_json::json!({
                "Fn::Join": ["", ["https://", {"Fn::GetAtt": ["Distribution", "DomainName"]}]]
            }),
            value
        );
        assert_eq!(
            vec!["Distribution".to_owned()],
            token.dependencies().into_iter().collect::<Vec<_>>()
        );
        assert_eq!("https://${Distribution.DomainName}", token.to_string());
    }
}
