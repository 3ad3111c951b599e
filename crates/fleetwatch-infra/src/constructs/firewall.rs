//! A basic web ACL applying the AWS common rule set.
use snafu::prelude::*;
use synth::{
    aws::{
        ssm::Parameter,
        wafv2::{Rule, RuleAction, Scope, VisibilityConfig, WebAcl},
    },
    Stack, Token,
};

use crate::{config::WAF_REGION, Result, UnsupportedRegionSnafu};

pub const COMMON_RULE_SET: &str = "AWSManagedRulesCommonRuleSet";

#[derive(Clone, Debug)]
pub struct FirewallProps {
    pub scope: Scope,
    /// Region of the stack the ACL is declared in.
    pub region: String,
    /// Name of the SSM parameter the ACL ARN is published to.
    pub parameter_name: String,
}

#[derive(Clone, Debug)]
pub struct FirewallOutputs {
    pub arn: Token,
    pub id: Token,
    pub parameter_name: String,
}

/// Checks that an ACL of `scope` can be declared in `region`.
pub fn validate(scope: Scope, region: &str) -> Result<()> {
    ensure!(
        scope != Scope::CloudFront || region == WAF_REGION,
        UnsupportedRegionSnafu { region }
    );
    Ok(())
}

pub fn firewall(stack: &mut Stack, props: &FirewallProps) -> Result<FirewallOutputs> {
    validate(props.scope, &props.region)?;
    let acl = stack.resource(
        "WebAcl",
        WebAcl {
            name: None,
            description: Some("Basic waf".to_owned()),
            scope: props.scope,
            default_action: RuleAction::Allow,
            visibility_config: VisibilityConfig::enabled("WAFACLGlobal"),
            rules: vec![Rule::managed(
                "CRSRule",
                1,
                COMMON_RULE_SET,
                "CfWebACLMetric-CRS",
            )],
        },
    )?;
    stack.resource(
        "WafAclArnParameter",
        Parameter::string(&props.parameter_name, acl.output().arn.clone())
            .with_description("WAF ACL ARN"),
    )?;
    log::info!(
        "web ACL ARN published to SSM parameter '{}'",
        props.parameter_name
    );
    Ok(FirewallOutputs {
        arn: acl.output().arn.clone(),
        id: acl.output().id.clone(),
        parameter_name: props.parameter_name.clone(),
    })
}
