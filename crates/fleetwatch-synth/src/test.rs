use pretty_assertions::assert_eq;

use crate::{
    aws::{dynamodb, iam, lambda},
    *,
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
struct LocalBucket {
    bucket_name: String,
}

#[derive(Clone, Debug)]
struct LocalBucketOutput {
    arn: Token,
}

impl Resource for LocalBucket {
    type Output = LocalBucketOutput;

    fn resource_type(&self) -> &str {
        "Test::Bucket"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        LocalBucketOutput {
            arn: Token::attribute(logical_id, "Arn"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, HasDependencies)]
#[serde(rename_all = "PascalCase")]
struct LocalService {
    bucket_arn: Token,
    #[synth(skip)]
    #[serde(skip)]
    notes: NotADependency,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct NotADependency;

impl Resource for LocalService {
    type Output = Token;

    fn resource_type(&self) -> &str {
        "Test::Service"
    }

    fn output(&self, logical_id: &str) -> Self::Output {
        Token::reference(logical_id)
    }
}

#[derive(Clone, Debug, PartialEq, HasDependencies)]
enum Mixed {
    Nothing,
    One(Token),
    Named { first: Token, second: Option<Token> },
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn declare(stack: &mut Stack, bucket_name: &str) -> Result<()> {
    let bucket = stack.resource(
        "Bucket",
        LocalBucket {
            bucket_name: bucket_name.to_owned(),
        },
    )?;
    let service = stack.resource(
        "Service",
        LocalService {
            bucket_arn: bucket.output().arn.clone(),
            notes: NotADependency,
        },
    )?;
    stack.output("ServiceId", service.output().clone(), Some("the service"))?;
    Ok(())
}

#[test]
fn derive_collects_dependencies() {
    let mixed = Mixed::Named {
        first: Token::reference("A"),
        second: Some(Token::concat([
            Token::attribute("B", "Arn"),
            Token::reference("A"),
        ])),
    };
    assert_eq!(
        vec!["A".to_owned(), "B".to_owned()],
        mixed.dependencies().into_iter().collect::<Vec<_>>()
    );
    assert!(Mixed::Nothing.dependencies().is_empty());
    assert!(Mixed::One(Token::reference("C")).dependencies().contains("C"));
}

#[test]
fn synth_orders_and_references() {
    init_logging();
    let mut stack = Stack::new("test", "eu-west-1", "123456789012").with_description("a test");
    declare(&mut stack, "my-bucket").unwrap();

    let template = stack.synth().unwrap();
    let value = serde_json::to_value(&template).unwrap();
    assert_eq!(
        serde_json::json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": "a test",
            "Resources": {
                "Bucket": {
                    "Type": "Test::Bucket",
                    "Properties": { "BucketName": "my-bucket" }
                },
                "Service": {
                    "Type": "Test::Service",
                    "Properties": { "BucketArn": { "Fn::GetAtt": ["Bucket", "Arn"] } }
                }
            },
            "Outputs": {
                "ServiceId": {
                    "Description": "the service",
                    "Value": { "Ref": "Service" }
                }
            }
        }),
        value
    );
    assert_eq!(
        vec!["Bucket", "Service"],
        template.resources.keys().collect::<Vec<_>>()
    );
    assert_eq!(
        "--- step 1\n  Bucket\n---\n--- step 2\n  Service\n---\n",
        stack.get_schedule_string().unwrap()
    );
}

#[test]
fn declarations_are_validated() {
    let mut stack = Stack::new("test", "eu-west-1", "123456789012");
    let bucket = LocalBucket {
        bucket_name: "b".to_owned(),
    };

    let err = stack.resource("not-valid", bucket.clone()).unwrap_err();
    assert!(matches!(err, Error::InvalidLogicalId { .. }), "{err}");

    stack.resource("Bucket", bucket.clone()).unwrap();
    let err = stack.resource("Bucket", bucket).unwrap_err();
    assert!(matches!(err, Error::Duplicate { .. }), "{err}");

    let err = stack
        .resource(
            "Service",
            LocalService {
                bucket_arn: Token::attribute("Missing", "Arn"),
                notes: NotADependency,
            },
        )
        .unwrap_err();
    match err {
        Error::MissingResource { name, dependent } => {
            assert_eq!("Missing", name);
            assert_eq!("Service", dependent);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(1, stack.len());

    let err = stack
        .output("Out", Token::reference("Nope"), None)
        .unwrap_err();
    assert!(matches!(err, Error::MissingResource { .. }), "{err}");

    // outputs live apart from resources
    stack
        .output("Bucket", Token::reference("Bucket"), None)
        .unwrap();
    assert!(stack.contains("Bucket"));
    assert!(stack.contains_output("Bucket"));
    let err = stack
        .output("Bucket", Token::reference("Bucket"), None)
        .unwrap_err();
    assert!(matches!(err, Error::Duplicate { .. }), "{err}");
    let template = stack.synth().unwrap();
    assert_eq!(
        serde_json::json!({"Ref": "Bucket"}),
        template.outputs["Bucket"]["Value"]
    );
}

#[test]
fn explicit_edges_and_policies() {
    let mut stack = Stack::new("test", "eu-west-1", "123456789012");
    let a = stack
        .resource(
            "A",
            LocalBucket {
                bucket_name: "a".to_owned(),
            },
        )
        .unwrap();
    let b = stack
        .resource(
            "B",
            LocalBucket {
                bucket_name: "b".to_owned(),
            },
        )
        .unwrap();
    a.depends_on(&mut stack, &b).unwrap();
    a.deletion_policy(&mut stack, DeletionPolicy::Delete).unwrap();

    let template = stack.synth().unwrap();
    assert_eq!(vec!["B", "A"], template.resources.keys().collect::<Vec<_>>());
    let entry = &template.resources["A"];
    assert_eq!(serde_json::json!(["B"]), entry["DependsOn"]);
    assert_eq!(serde_json::json!("Delete"), entry["DeletionPolicy"]);
    assert_eq!(serde_json::json!("Delete"), entry["UpdateReplacePolicy"]);

    b.depends_on(&mut stack, &a).unwrap();
    let err = stack.synth().unwrap_err();
    assert!(matches!(err, Error::Schedule { .. }), "{err}");
}

#[test]
fn plan_against_previous_template() {
    init_logging();
    let mut before = Stack::new("test", "eu-west-1", "123456789012");
    declare(&mut before, "first").unwrap();
    before
        .resource(
            "Leftover",
            LocalBucket {
                bucket_name: "old".to_owned(),
            },
        )
        .unwrap();
    let previous = before.synth().unwrap();

    let fresh = before.plan(None).unwrap();
    assert_eq!(3, fresh.count(Action::Create));

    let mut after = Stack::new("test", "eu-west-1", "123456789012");
    declare(&mut after, "second").unwrap();
    let plan = after.plan(Some(&previous)).unwrap();
    let summary = plan
        .actions
        .iter()
        .map(|a| (a.id.as_str(), a.action, a.is_orphan))
        .collect::<Vec<_>>();
    assert_eq!(
        vec![
            ("Bucket", Action::Update, false),
            ("Service", Action::Unchanged, false),
            ("Leftover", Action::Destroy, true),
        ],
        summary
    );
    assert_eq!(1, plan.changes.len());
    assert_eq!(
        "stack 'test':\n  \
         update 'Bucket' [Test::Bucket]\n  \
         destroy 'Leftover' [Test::Bucket] (orphan)\n",
        plan.to_string()
    );

    let same = before.plan(Some(&previous)).unwrap();
    assert!(!same.has_changes());
    assert_eq!("stack 'test':\n  No changes.\n", same.to_string());
}

#[test]
fn table_schema_derives_attribute_definitions() {
    let table = dynamodb::Table {
        global_secondary_indexes: vec![dynamodb::GlobalSecondaryIndex {
            index_name: "LatestRecordIndex".to_owned(),
            key_schema: vec![
                dynamodb::KeySchemaElement::partition_key(
                    "status",
                    dynamodb::AttributeType::String,
                ),
                dynamodb::KeySchemaElement::sort_key(
                    "recordTime",
                    dynamodb::AttributeType::String,
                ),
            ],
            projection: dynamodb::ProjectionType::All,
        }],
        time_to_live_attribute: Some("ttl".to_owned()),
        point_in_time_recovery: true,
        ..dynamodb::Table::new(dynamodb::KeySchemaElement::partition_key(
            "recordTime",
            dynamodb::AttributeType::String,
        ))
    };
    let value = serde_json::to_value(&table).unwrap();
    assert_eq!(
        serde_json::json!([
            { "AttributeName": "recordTime", "AttributeType": "S" },
            { "AttributeName": "status", "AttributeType": "S" },
        ]),
        value["AttributeDefinitions"]
    );
    assert_eq!(serde_json::json!("PAY_PER_REQUEST"), value["BillingMode"]);
    assert_eq!(
        serde_json::json!([
            { "AttributeName": "status", "KeyType": "HASH" },
            { "AttributeName": "recordTime", "KeyType": "RANGE" },
        ]),
        value["GlobalSecondaryIndexes"][0]["KeySchema"]
    );
    assert_eq!(
        serde_json::json!({ "AttributeName": "ttl", "Enabled": true }),
        value["TimeToLiveSpecification"]
    );
}

#[test]
fn role_and_function_wiring() {
    let mut stack = Stack::new("test", "eu-west-1", "123456789012");
    let role = stack
        .resource(
            "FnRole",
            iam::Role::assumed_by_service("lambda.amazonaws.com")
                .with_managed_policy("service-role/AWSLambdaBasicExecutionRole")
                .with_policy("Nothing", Vec::<iam::Statement>::new())
                .with_policy(
                    "Search",
                    [iam::Statement::allow(
                        ["iot:SearchIndex"],
                        ["arn:aws:iot:eu-west-1:123456789012:index/AWS_Things"],
                    )],
                ),
        )
        .unwrap();
    assert_eq!(1, role.policies.len());
    let function = stack
        .resource(
            "Fn",
            lambda::Function::new(
                lambda::Runtime::Python312,
                "handler.lambda_handler",
                lambda::Code {
                    s3_bucket: "assets".to_owned(),
                    s3_key: "assets/abc.zip".to_owned(),
                },
                role.output().arn.clone(),
            )
            .with_timeout(30)
            .with_env("PYTHONPATH", "/var/task:/opt/python"),
        )
        .unwrap();
    assert!(function.dependencies().contains("FnRole"));

    let template = stack.synth().unwrap();
    let props = template.properties("Fn").unwrap();
    assert_eq!(serde_json::json!("python3.12"), props["Runtime"]);
    assert_eq!(
        serde_json::json!({ "Fn::GetAtt": ["FnRole", "Arn"] }),
        props["Role"]
    );
    assert_eq!(
        serde_json::json!({ "S3Bucket": "assets", "S3Key": "assets/abc.zip" }),
        props["Code"]
    );
    let role_props = template.properties("FnRole").unwrap();
    assert_eq!(
        serde_json::json!({ "Service": "lambda.amazonaws.com" }),
        role_props["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]
    );
    assert_eq!(
        serde_json::json!([
            "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"
        ]),
        role_props["ManagedPolicyArns"]
    );
}

#[tokio::test]
async fn app_writes_templates_and_manifest() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();

    let mut waf = Stack::new("site-waf", "us-east-1", "123456789012");
    declare(&mut waf, "waf").unwrap();
    let mut site = Stack::new("site", "eu-west-1", "123456789012");
    declare(&mut site, "site").unwrap();

    let mut app = App::new();
    app.add_stack(site).unwrap();
    app.add_stack(waf).unwrap();
    app.stack_depends_on("site", "site-waf").unwrap();
    assert!(matches!(
        app.stack_depends_on("site", "nope"),
        Err(Error::MissingStack { .. })
    ));
    assert!(matches!(
        app.stack_depends_on("site", "site"),
        Err(Error::SelfDependency { .. })
    ));

    let manifest = app.synth(dir.path()).await.unwrap();
    assert_eq!(
        vec!["site-waf", "site"],
        manifest
            .stacks
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
    );
    assert_eq!(
        vec!["site-waf".to_owned()],
        manifest.stack("site").unwrap().dependencies
    );

    let written = Template::read(dir.path().join("site.template.json"))
        .unwrap()
        .unwrap();
    assert_eq!(app.stack("site").unwrap().synth().unwrap(), written);
    let manifest_contents = std::fs::read_to_string(dir.path().join("manifest.json")).unwrap();
    let read_back: Manifest = serde_json::from_str(&manifest_contents).unwrap();
    assert_eq!(manifest, read_back);

    let plans = app.plan(dir.path()).unwrap();
    assert_eq!(2, plans.len());
    assert!(plans.iter().all(|plan| !plan.has_changes()));
}

#[tokio::test]
async fn written_files_are_complete_once_written() {
    let dir = tempfile::tempdir().unwrap();
    let contents = "x".repeat(64 * 1024);
    for i in 0..16 {
        let path = dir.path().join(format!("nested/{i}.json"));
        crate::template::write_file(&path, contents.as_bytes())
            .await
            .unwrap();
        assert_eq!(contents, std::fs::read_to_string(&path).unwrap());
    }
}
