//! WAFv2 web ACLs.
use crate::{HasDependencies, Resource, Token};

/// Where a web ACL can be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, HasDependencies)]
pub enum Scope {
    #[serde(rename = "CLOUDFRONT")]
    CloudFront,
    #[serde(rename = "REGIONAL")]
    Regional,
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Scope::CloudFront => "CLOUDFRONT",
            Scope::Regional => "REGIONAL",
        })
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLOUDFRONT" => Ok(Scope::CloudFront),
            "REGIONAL" => Ok(Scope::Regional),
            other => Err(format!(
                "unknown scope '{other}', expected CLOUDFRONT or REGIONAL"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct VisibilityConfig {
    pub cloud_watch_metrics_enabled: bool,
    pub metric_name: String,
    pub sampled_requests_enabled: bool,
}

impl VisibilityConfig {
    pub fn enabled(metric_name: impl Into<String>) -> Self {
        VisibilityConfig {
            cloud_watch_metrics_enabled: true,
            metric_name: metric_name.into(),
            sampled_requests_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedRuleGroupStatement {
    pub vendor_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub managed_rule_group_statement: ManagedRuleGroupStatement,
}

/// Actions are serialized as `{"<Action>": {}}`.
#[derive(Debug, Clone, Copy, PartialEq, HasDependencies)]
pub enum RuleAction {
    Allow,
    Block,
    /// Only valid as a rule group override.
    None,
}

impl serde::Serialize for RuleAction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(1))?;
        let name = match self {
            RuleAction::Allow => "Allow",
            RuleAction::Block => "Block",
            RuleAction::None => "None",
        };
        map.serialize_entry(name, &serde_json::Map::new())?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct Rule {
    pub name: String,
    pub priority: u32,
    pub override_action: RuleAction,
    pub statement: Statement,
    pub visibility_config: VisibilityConfig,
}

impl Rule {
    /// Applies an AWS managed rule group without overriding its actions.
    pub fn managed(
        name: impl Into<String>,
        priority: u32,
        group: impl Into<String>,
        metric_name: impl Into<String>,
    ) -> Self {
        Rule {
            name: name.into(),
            priority,
            override_action: RuleAction::None,
            statement: Statement {
                managed_rule_group_statement: ManagedRuleGroupStatement {
                    vendor_name: "AWS".to_owned(),
                    name: group.into(),
                },
            },
            visibility_config: VisibilityConfig::enabled(metric_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
pub struct WebAcl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub scope: Scope,
    pub default_action: RuleAction,
    pub visibility_config: VisibilityConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

#[derive(Clone, Debug)]
pub struct WebAclOutput {
    pub arn: Token,
    pub id: Token,
}

impl Resource for WebAcl {
    type Output = WebAclOutput;

    fn resource_type(&self) -> &str {
        "AWS::WAFv2::WebACL"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        WebAclOutput {
            arn: Token::attribute(logical_id, "Arn"),
            id: Token::attribute(logical_id, "Id"),
        }
    }
}
