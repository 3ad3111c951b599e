use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use pretty_assertions::assert_eq;
use serde_json::json;
use synth::{aws::wafv2::Scope, Stack, Template};

use crate::{
    assets::{self, AssetCatalog, CUSTOM_RESOURCE_ASSET, PYTHON_LAYER_ASSET},
    config::{self, Config, ContextInputs, FileConfig},
    constructs::{
        self,
        firewall::{firewall, FirewallProps},
        identity::{identity_pool, IdentityPoolProps},
    },
    frontend::FrontendConfig,
    publish, stacks, Error,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn inputs(env: &[(&str, &str)]) -> ContextInputs {
    ContextInputs {
        account: Some("123456789012".to_owned()),
        region: Some("eu-west-1".to_owned()),
        env: env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        deployment_timestamp: "2026-01-01T00:00:00+00:00".to_owned(),
        ..Default::default()
    }
}

fn write(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// A project tree holding every asset and the schema.
fn project(dir: &Path) -> Config {
    let assets_dir = dir.join("backend");
    write(
        &assets_dir.join("lambda-layers/python/fleet_utils.py"),
        "def ok(data):\n    return {'data': data}\n",
    );
    for function in constructs::python_functions() {
        write(
            &assets_dir
                .join("lambda-functions/python")
                .join(function)
                .join("handler.py"),
            &format!("def lambda_handler(event, context):\n    return '{function}'\n"),
        );
    }
    write(&dir.join("bootstrap"), "#!/bin/sh\n");
    write(
        &dir.join("schema.graphql"),
        "type Query { listThings: [String] }\n",
    );
    let mut inputs = inputs(&[]);
    inputs.git_branch = Some("feature/shadows".to_owned());
    inputs.file = FileConfig {
        assets_dir: Some(assets_dir),
        schema_path: Some(dir.join("schema.graphql")),
        web_dist_dir: Some(dir.join("dist")),
        custom_resource_bootstrap: Some(dir.join("bootstrap")),
        ..Default::default()
    };
    Config::resolve(&inputs).unwrap()
}

#[test]
fn branch_names_the_stacks() {
    let mut git = inputs(&[]);
    git.git_branch = Some("feature/fleet_index v2".to_owned());
    let config = Config::resolve(&git).unwrap();
    assert_eq!("feature/fleet_index v2", config.branch);
    assert_eq!("FleetWatch-feature-fleet-index-v2", config.stack_name);
    assert_eq!("FleetWatch-feature-fleet-index-v2-waf", config.waf_stack_name);
    assert_eq!(
        "waf_acl_arn_FleetWatch-feature-fleet-index-v2-waf",
        config.waf_parameter_name()
    );

    let mut pr = inputs(&[(config::PR_SOURCE_BRANCH_VAR, "pr-branch")]);
    pr.git_branch = Some("other".to_owned());
    assert_eq!("FleetWatch-pr-branch", Config::resolve(&pr).unwrap().stack_name);

    // empty values are unset
    let mut empty = inputs(&[(config::PR_SOURCE_BRANCH_VAR, "")]);
    empty.git_branch = None;
    assert_eq!("FleetWatch-dev", Config::resolve(&empty).unwrap().stack_name);

    let mut overridden = inputs(&[]);
    overridden.stack_name = Some("demo".to_owned());
    overridden.git_branch = Some("other".to_owned());
    assert_eq!(
        "FleetWatch-demo",
        Config::resolve(&overridden).unwrap().stack_name
    );
}

#[test]
fn main_is_reserved_for_ci() {
    let mut local = inputs(&[]);
    local.git_branch = Some("main".to_owned());
    let err = Config::resolve(&local).unwrap_err();
    assert!(matches!(err, config::Error::ReservedStackName { .. }), "{err}");
    assert_eq!(
        "Stack name \"main\" is not allowed outside of GitHub Actions",
        err.to_string()
    );

    let mut ci = inputs(&[(config::GITHUB_ACTIONS_VAR, "true")]);
    ci.git_branch = Some("main".to_owned());
    assert_eq!("FleetWatch-main", Config::resolve(&ci).unwrap().stack_name);
}

#[test]
fn account_and_region_precedence() {
    let file = FileConfig {
        account: Some("file-account".to_owned()),
        region: Some("file-region".to_owned()),
        ..Default::default()
    };
    let mut inputs = ContextInputs {
        env: BTreeMap::from([
            (config::DEPLOY_ACCOUNT_VAR.to_owned(), "deploy-account".to_owned()),
            (config::DEFAULT_ACCOUNT_VAR.to_owned(), "default-account".to_owned()),
            (config::DEFAULT_REGION_VAR.to_owned(), "default-region".to_owned()),
        ]),
        file,
        ..Default::default()
    };
    let config = Config::resolve(&inputs).unwrap();
    assert_eq!("deploy-account", config.account);
    assert_eq!("default-region", config.region);
    assert_eq!(
        "fleetwatch-assets-deploy-account-default-region",
        config.asset_bucket
    );
    assert_eq!(config::WAF_REGION, config.waf_region);

    inputs.account = Some("cli-account".to_owned());
    assert_eq!("cli-account", Config::resolve(&inputs).unwrap().account);

    inputs.env.clear();
    inputs.account = None;
    let config = Config::resolve(&inputs).unwrap();
    assert_eq!("file-account", config.account);
    assert_eq!("file-region", config.region);

    inputs.file = FileConfig::default();
    let err = Config::resolve(&inputs).unwrap_err();
    assert!(
        matches!(err, config::Error::MissingContext { name: "account", .. }),
        "{err}"
    );
}

#[test]
fn config_file() {
    let path = Path::new(config::CONFIG_FILE);
    let file = FileConfig::parse(
        path,
        r#"
account = "123456789012"
asset-bucket = "my-assets"
web-dist-dir = "web/dist"
"#,
    )
    .unwrap();
    assert_eq!(Some("my-assets".to_owned()), file.asset_bucket);
    assert_eq!(Some(PathBuf::from("web/dist")), file.web_dist_dir);
    assert_eq!(None, file.region);

    let err = FileConfig::parse(path, "bucket = \"nope\"").unwrap_err();
    assert!(matches!(err, config::Error::ParseConfigFile { .. }), "{err}");

    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        FileConfig::default(),
        FileConfig::read(&dir.path().join("missing.toml")).unwrap()
    );
}

#[test]
fn git_head() {
    let dir = tempfile::tempdir().unwrap();
    let git = dir.path().join(".git");
    write(&git.join("HEAD"), "ref: refs/heads/feature/shadows\n");
    assert_eq!(
        Some("feature/shadows".to_owned()),
        config::git_head_branch(&git).unwrap()
    );
    let nested = dir.path().join("a/b");
    std::fs::create_dir_all(&nested).unwrap();
    assert_eq!(
        Some(dir.path().to_path_buf()),
        config::find_dir_up(&nested, ".git")
    );

    write(&git.join("HEAD"), "3f2a1c0d9e8b7a6f5e4d3c2b1a0f9e8d7c6b5a49\n");
    assert_eq!(None, config::git_head_branch(&git).unwrap());

    // worktrees point at their git dir
    let worktree = dir.path().join("worktree");
    write(&worktree.join(".git"), "gitdir: ../real-git\n");
    write(
        &dir.path().join("real-git/HEAD"),
        "ref: refs/heads/linked\n",
    );
    assert_eq!(
        Some("linked".to_owned()),
        config::git_head_branch(&worktree.join(".git")).unwrap()
    );
}

#[test]
fn cloudfront_firewall_needs_us_east_1() {
    init_logging();
    let mut stack = Stack::new("waf", "eu-west-1", "123456789012");
    let err = firewall(
        &mut stack,
        &FirewallProps {
            scope: Scope::CloudFront,
            region: "eu-west-1".to_owned(),
            parameter_name: "waf_acl_arn".to_owned(),
        },
    )
    .unwrap_err();
    assert_eq!(
        "Only supported region for WAFv2 scope when set to CLOUDFRONT is us-east-1",
        err.to_string()
    );
    assert_eq!(0, stack.len());

    let mut regional = Stack::new("waf", "eu-west-1", "123456789012");
    firewall(
        &mut regional,
        &FirewallProps {
            scope: Scope::Regional,
            region: "eu-west-1".to_owned(),
            parameter_name: "waf_acl_arn".to_owned(),
        },
    )
    .unwrap();
    assert_eq!(2, regional.len());
}

#[test]
fn identity_pool_needs_a_provider() {
    let mut stack = Stack::new("app", "eu-west-1", "123456789012");
    let err = identity_pool(&mut stack, &IdentityPoolProps { providers: vec![] }).unwrap_err();
    assert!(matches!(err, Error::MissingIdentityProvider), "{err}");
    assert_eq!(0, stack.len());
}

#[test]
fn tables() {
    let device_stats = serde_json::to_value(constructs::device_stats::device_stats_table()).unwrap();
    assert_eq!(
        json!({
            "KeySchema": [{"AttributeName": "recordTime", "KeyType": "HASH"}],
            "AttributeDefinitions": [
                {"AttributeName": "recordTime", "AttributeType": "S"},
                {"AttributeName": "status", "AttributeType": "S"},
            ],
            "BillingMode": "PAY_PER_REQUEST",
            "GlobalSecondaryIndexes": [{
                "IndexName": "LatestRecordIndex",
                "KeySchema": [
                    {"AttributeName": "status", "KeyType": "HASH"},
                    {"AttributeName": "recordTime", "KeyType": "RANGE"},
                ],
                "Projection": {"ProjectionType": "ALL"},
            }],
            "TimeToLiveSpecification": {"AttributeName": "ttl", "Enabled": true},
            "PointInTimeRecoverySpecification": {"PointInTimeRecoveryEnabled": true},
        }),
        device_stats
    );

    let preferences =
        serde_json::to_value(constructs::user_preferences::user_preferences_table()).unwrap();
    assert_eq!(
        json!([{"AttributeName": "userID", "KeyType": "HASH"}]),
        preferences["KeySchema"]
    );
    assert_eq!(json!("ttl"), preferences["TimeToLiveSpecification"]["AttributeName"]);
}

#[test]
fn fleet_functions_carry_their_permissions() {
    let config = Config::resolve(&inputs(&[])).unwrap();
    for function in constructs::fleet::FLEET_FUNCTIONS.iter() {
        let statements = (function.statements)(&config);
        assert!(!statements.is_empty(), "{} grants nothing", function.id);
    }

    let list_things = &constructs::fleet::FLEET_FUNCTIONS[0];
    assert_eq!("get_thing_list", list_things.asset);
    let statements = (list_things.statements)(&config);
    assert_eq!(vec!["iot:SearchIndex".to_owned()], statements[0].action);
    assert_eq!(
        json!(["arn:aws:iot:eu-west-1:123456789012:index/AWS_Things"]),
        serde_json::to_value(&statements[0].resource).unwrap()
    );
}

#[test]
fn only_missing_assets_are_uploaded() {
    use aws_sdk_s3::{
        error::{ErrorMetadata, SdkError},
        operation::head_object::HeadObjectError,
        types::error::NotFound,
    };

    let missing = SdkError::service_error(HeadObjectError::NotFound(NotFound::builder().build()), ());
    assert!(!assets::published_check(missing, "assets/a.zip").unwrap());

    let forbidden = SdkError::service_error(
        HeadObjectError::generic(ErrorMetadata::builder().code("Forbidden").build()),
        (),
    );
    let err = assets::published_check(forbidden, "assets/a.zip").unwrap_err();
    assert!(matches!(err, Error::Aws { .. }), "{err}");

    let timeout = SdkError::<HeadObjectError, ()>::timeout_error("slow");
    assert!(assets::published_check(timeout, "assets/a.zip").is_err());
}

#[test]
fn asset_catalog() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("layer/python/utils.py"), "X = 1\n");
    write(&dir.path().join("bootstrap"), "binary");

    let mut catalog = AssetCatalog::new("asset-bucket");
    let layer = catalog
        .register_dir(PYTHON_LAYER_ASSET, dir.path().join("layer"))
        .unwrap()
        .clone();
    assert_eq!(64, layer.hash.len());
    assert_eq!(format!("assets/{}.zip", layer.hash), layer.key());
    catalog
        .register_bootstrap(CUSTOM_RESOURCE_ASSET, dir.path().join("bootstrap"))
        .unwrap();

    let err = catalog
        .register_dir(PYTHON_LAYER_ASSET, dir.path().join("layer"))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateAsset { .. }), "{err}");
    let err = catalog
        .register_dir("get_device", dir.path().join("missing"))
        .unwrap_err();
    assert!(matches!(err, Error::MissingAsset { .. }), "{err}");
    let err = catalog.code("get_device").unwrap_err();
    assert!(matches!(err, Error::UnknownAsset { .. }), "{err}");

    let code = catalog.code(PYTHON_LAYER_ASSET).unwrap();
    assert_eq!("asset-bucket", code.s3_bucket);
    assert_eq!(layer.key(), code.s3_key);

    let out = dir.path().join("out");
    let first = catalog.package(&out).unwrap();
    assert_eq!(2, first.len());
    let bytes = std::fs::read(&first[0]).unwrap();
    // fixed timestamps make packaging reproducible
    catalog.package(&out).unwrap();
    assert_eq!(bytes, std::fs::read(&first[0]).unwrap());

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&first[0]).unwrap()).unwrap();
    assert_eq!("python/utils.py", archive.by_index(0).unwrap().name());
    let mut archive = zip::ZipArchive::new(std::fs::File::open(&first[1]).unwrap()).unwrap();
    let bootstrap = archive.by_name("bootstrap").unwrap();
    assert_eq!(Some(0o100755), bootstrap.unix_mode());
}

#[test]
fn frontend_config() {
    let outputs = BTreeMap::from(
        [
            (stacks::OUTPUT_USER_POOL_ID, "eu-west-1_pool"),
            (stacks::OUTPUT_WEB_CLIENT_ID, "client"),
            (stacks::OUTPUT_IDENTITY_POOL_ID, "eu-west-1:identity"),
            (stacks::OUTPUT_APPSYNC_URL, "https://api.example/graphql"),
            (stacks::OUTPUT_REGION, "eu-west-1"),
            (stacks::OUTPUT_ACCOUNT_ID, "123456789012"),
        ]
        .map(|(k, v)| (k.to_owned(), v.to_owned())),
    );
    let config = FrontendConfig::from_outputs("FleetWatch-dev", &outputs).unwrap();
    assert_eq!(
        json!({
            "userPoolId": "eu-west-1_pool",
            "userPoolClientId": "client",
            "identityPoolId": "eu-west-1:identity",
            "appSyncURL": "https://api.example/graphql",
            "region": "eu-west-1",
            "account": "123456789012",
        }),
        serde_json::from_str::<serde_json::Value>(&config.to_json().unwrap()).unwrap()
    );

    let mut missing = outputs.clone();
    missing.remove(stacks::OUTPUT_APPSYNC_URL);
    let err = FrontendConfig::from_outputs("FleetWatch-dev", &missing).unwrap_err();
    assert_eq!("Stack 'FleetWatch-dev' has no output 'AppSyncUrl'", err.to_string());
}

#[test]
fn site_files() {
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("index.html"), "<html></html>");
    write(&dir.path().join("assets/app.js"), "main()");
    let keys = publish::site_keys(dir.path())
        .unwrap()
        .into_iter()
        .map(|(key, file)| (key, publish::content_type(&file)))
        .collect::<Vec<_>>();
    assert_eq!(
        vec![
            ("assets/app.js".to_owned(), "text/javascript"),
            ("index.html".to_owned(), "text/html"),
        ],
        keys
    );
}

#[test]
fn app_stack_wiring() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());
    let assets = assets::catalog(&config).unwrap();
    let stack = stacks::app_stack(&config, &assets).unwrap();
    let template = stack.synth().unwrap();

    let resolvers = template
        .resources
        .iter()
        .filter(|(_, entry)| entry["Type"] == "AWS::AppSync::Resolver")
        .map(|(id, _)| id.as_str())
        .collect::<Vec<_>>();
    // 12 fleet fields, 2 device stats fields, 2 preferences fields
    assert_eq!(16, resolvers.len(), "{resolvers:#?}");

    let list_things = &template.resources["QueryListThingsResolver"];
    assert_eq!(json!(["DeviceApiSchema"]), list_things["DependsOn"]);
    assert_eq!(
        json!({"Fn::GetAtt": ["ListThingsDataSource", "Name"]}),
        list_things["Properties"]["DataSourceName"]
    );
    let executions = template
        .properties("QueryListJobExecutionsForThingResolver")
        .unwrap();
    assert_eq!(
        json!({"Fn::GetAtt": ["ListJobExecutionsDataSource", "Name"]}),
        executions["DataSourceName"]
    );

    let indexing = template.properties("FleetIndexing").unwrap();
    assert_eq!(
        Some("Custom::FleetIndexing"),
        template.resource_type("FleetIndexing")
    );
    assert_eq!(
        json!(["state", "$package", "schedule"]),
        indexing["NamedShadowNames"]
    );
    assert_eq!(
        json!(config.deployment_timestamp),
        indexing["DeploymentTimestamp"]
    );

    let reader = template.properties("WafAclArnReader").unwrap();
    assert_eq!(json!(config.waf_parameter_name()), reader["ParameterName"]);
    assert_eq!(json!("us-east-1"), reader["Region"]);
    let distribution = template.properties("SiteDistribution").unwrap();
    assert_eq!(
        json!({"Fn::GetAtt": ["WafAclArnReader", "Value"]}),
        distribution["DistributionConfig"]["WebACLId"]
    );

    for table in ["DeviceStatsTable", "UserPreferencesTable", "UserPool", "SiteBucket"] {
        assert_eq!(
            json!("Delete"),
            template.resources[table]["DeletionPolicy"],
            "{table}"
        );
    }

    let outputs = template.outputs.keys().cloned().collect::<Vec<_>>();
    for output in [
        "AwsAccountId",
        "AwsRegion",
        "AppSyncUrl",
        "UserPoolId",
        "IdentityPoolId",
        "WebClientId",
        "SiteBucket",
        "CloudFrontDistributionId",
        "DomainName",
        "Url",
    ] {
        assert!(outputs.contains(&output.to_owned()), "missing output {output}");
    }
    // the site bucket output shares its id with the bucket itself
    assert_eq!(Some("AWS::S3::Bucket"), template.resource_type("SiteBucket"));
    assert_eq!(
        json!({"Ref": "SiteBucket"}),
        template.outputs["SiteBucket"]["Value"]
    );
}

#[test]
fn site_bucket_policy() {
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());
    let assets = assets::catalog(&config).unwrap();
    let template = stacks::app_stack(&config, &assets).unwrap().synth().unwrap();
    let policy = &template.properties("SiteBucketPolicy").unwrap()["PolicyDocument"];
    let tls = &policy["Statement"][0];
    assert_eq!(json!("EnforceTLS"), tls["Sid"]);
    assert_eq!(json!("Deny"), tls["Effect"]);
    assert_eq!(json!({"Bool": {"aws:SecureTransport": "false"}}), tls["Condition"]);
    let read = &policy["Statement"][1];
    assert_eq!(json!({"Service": "cloudfront.amazonaws.com"}), read["Principal"]);
    assert_eq!(json!(["s3:GetObject"]), read["Action"]);
}

#[tokio::test]
async fn synth_app() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());
    let app = stacks::app(&config).unwrap();
    let out = dir.path().join("cdk.out");
    let manifest = app.synth(&out).await.unwrap();

    let names = manifest
        .stacks
        .iter()
        .map(|stack| stack.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        vec!["FleetWatch-feature-shadows-waf", "FleetWatch-feature-shadows"],
        names
    );
    let app_entry = manifest.stack("FleetWatch-feature-shadows").unwrap();
    assert_eq!(vec!["FleetWatch-feature-shadows-waf".to_owned()], app_entry.dependencies);
    assert_eq!("eu-west-1", app_entry.region);
    assert_eq!("us-east-1", manifest.stacks[0].region);

    let waf = Template::read(out.join(&manifest.stacks[0].template_file))
        .unwrap()
        .unwrap();
    assert_eq!(Some("AWS::WAFv2::WebACL"), waf.resource_type("WebAcl"));
    let parameter = waf.properties("WafAclArnParameter").unwrap();
    assert_eq!(json!(config.waf_parameter_name()), parameter["Name"]);
    assert_eq!(json!("WAF ACL ARN"), parameter["Description"]);

    // an unchanged app plans no changes against what it just wrote
    for plan in app.plan(&out).unwrap() {
        assert!(!plan.has_changes(), "{plan}");
    }
}

#[test]
fn missing_schema() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = project(dir.path());
    config.schema_path = dir.path().join("nope.graphql");
    let assets = assets::catalog(&config).unwrap();
    let Err(err) = stacks::app_stack(&config, &assets) else {
        panic!("the app stack needs its schema");
    };
    assert!(matches!(err, Error::ReadSchema { .. }), "{err}");
}

#[test]
fn custom_resource_handler() {
    let dir = tempfile::tempdir().unwrap();
    let config = project(dir.path());
    let assets = assets::catalog(&config).unwrap();
    let template = stacks::app_stack(&config, &assets).unwrap().synth().unwrap();
    let function = template.properties("CustomResourceHandlerFunction").unwrap();
    assert_eq!(json!("provided.al2023"), function["Runtime"]);
    assert_eq!(json!("bootstrap"), function["Handler"]);
    assert_eq!(
        json!(assets.get(CUSTOM_RESOURCE_ASSET).unwrap().key()),
        function["Code"]["S3Key"]
    );
    // custom resources never race the function for its log group
    assert_eq!(
        json!(["CustomResourceHandlerLogGroup"]),
        template.resources["FleetIndexing"]["DependsOn"]
    );
}
