use super::*;

const BASE_API: &str = r#"
{
    "command": ["ls", "-la"],
    "environment": [
        {"name": "VARNAME1", "value": "VARVAL1"},
        {"name": "VARNAME2", "value": "VARVAL2"}
    ],
    "image": "busybox",
    "memory": 512,
    "mountPoints": [
        {"containerPath": "/tmp", "readOnly": false, "sourceVolume": "tmp"}
    ],
    "resourceRequirements": [],
    "ulimits": [
        {"hardLimit": 1024, "name": "nofile", "softLimit": 1024}
    ],
    "vcpus": 1,
    "volumes": [
        {"host": {"sourcePath": "/tmp"}, "name": "tmp"}
    ]
}
"#;

#[test]
fn test_both_empty_are_equivalent() {
    assert!(equivalent("", "").unwrap());
    assert!(equivalent("  \n", "{}").unwrap());
}

#[test]
fn test_identical_documents() {
    assert!(equivalent(BASE_API, BASE_API).unwrap());
}

#[test]
fn test_key_order_is_ignored() {
    let a = r#"{"image": "busybox", "memory": 512, "vcpus": 1}"#;
    let b = r#"{"vcpus": 1, "image": "busybox", "memory": 512}"#;
    assert!(equivalent(a, b).unwrap());
}

#[test]
fn test_empty_resource_requirements_equal_absent() {
    let config = r#"
    {
        "command": ["ls", "-la"],
        "environment": [
            {"name": "VARNAME1", "value": "VARVAL1"},
            {"name": "VARNAME2", "value": "VARVAL2"}
        ],
        "image": "busybox",
        "memory": 512,
        "mountPoints": [
            {"containerPath": "/tmp", "readOnly": false, "sourceVolume": "tmp"}
        ],
        "ulimits": [
            {"hardLimit": 1024, "name": "nofile", "softLimit": 1024}
        ],
        "vcpus": 1,
        "volumes": [
            {"host": {"sourcePath": "/tmp"}, "name": "tmp"}
        ]
    }
    "#;
    assert!(equivalent(config, BASE_API).unwrap());
}

#[test]
fn test_reordered_environment() {
    let api = r#"{"environment": [
        {"name": "VARNAME2", "value": "VARVAL2"},
        {"name": "VARNAME1", "value": "VARVAL1"}
    ]}"#;
    let config = r#"{"environment": [
        {"name": "VARNAME1", "value": "VARVAL1"},
        {"name": "VARNAME2", "value": "VARVAL2"}
    ]}"#;
    assert!(equivalent(config, api).unwrap());
}

#[test]
fn test_environment_is_a_multiset_not_a_set() {
    let twice = r#"{"environment": [{"name": "A", "value": "1"}, {"name": "A", "value": "1"}]}"#;
    let once = r#"{"environment": [{"name": "A", "value": "1"}]}"#;
    assert!(!equivalent(twice, once).unwrap());
}

#[test]
fn test_environment_value_change_is_drift() {
    let a = r#"{"environment": [{"name": "A", "value": "1"}, {"name": "B", "value": "2"}]}"#;
    let b = r#"{"environment": [{"name": "B", "value": "2"}, {"name": "A", "value": "9"}]}"#;
    assert!(!equivalent(a, b).unwrap());
}

#[test]
fn test_reordered_command_is_drift() {
    let api = r#"{"command": ["ls", "-la"]}"#;
    let config = r#"{"command": ["-la", "ls"]}"#;
    assert!(!equivalent(config, api).unwrap());
}

#[test]
fn test_empty_environment_mount_points_ulimits_volumes() {
    let api = r#"
    {
        "image": "example:image",
        "vcpus": 8,
        "memory": 2048,
        "command": ["start.py", "Ref::S3bucket", "Ref::S3key"],
        "jobRoleArn": "arn:aws:iam::123456789012:role/example",
        "volumes": [],
        "environment": [],
        "mountPoints": [],
        "ulimits": [],
        "resourceRequirements": []
    }
    "#;
    let config = r#"
    {
        "command": ["start.py", "Ref::S3bucket", "Ref::S3key"],
        "image": "example:image",
        "memory": 2048,
        "vcpus": 8,
        "jobRoleArn": "arn:aws:iam::123456789012:role/example"
    }
    "#;
    assert!(equivalent(config, api).unwrap());
}

#[test]
fn test_empty_command_and_secrets() {
    let api = r#"
    {
        "image": "123.dkr.ecr.us-east-1.amazonaws.com/my-app",
        "vcpus": 1,
        "memory": 4096,
        "command": [],
        "jobRoleArn": "arn:aws:iam::123:role/role-test",
        "volumes": [],
        "environment": [{"name": "ENVIRONMENT", "value": "test"}],
        "mountPoints": [],
        "ulimits": [],
        "resourceRequirements": [],
        "secrets": []
    }
    "#;
    let config = r#"
    {
        "image": "123.dkr.ecr.us-east-1.amazonaws.com/my-app",
        "memory": 4096,
        "vcpus": 1,
        "jobRoleArn": "arn:aws:iam::123:role/role-test",
        "environment": [{"name": "ENVIRONMENT", "value": "test"}]
    }
    "#;
    assert!(equivalent(config, api).unwrap());
}

#[test]
fn test_nested_empty_object_is_dropped() {
    let a = r#"{"volumes": [{"host": {}, "name": "tmp"}]}"#;
    let b = r#"{"volumes": [{"name": "tmp"}]}"#;
    assert!(equivalent(a, b).unwrap());
}

#[test]
fn test_scalar_difference_is_drift() {
    let a = r#"{"memory": 512}"#;
    let b = r#"{"memory": 1024}"#;
    assert!(!equivalent(a, b).unwrap());
}

#[test]
fn test_malformed_input_is_an_error() {
    let err = equivalent("{\"image\": ", "{}").unwrap_err();
    assert!(matches!(err, Error::Malformed { side: Side::Desired, .. }));

    let err = equivalent("{}", "[1,").unwrap_err();
    assert!(matches!(err, Error::Malformed { side: Side::Remote, .. }));
}

#[test]
fn test_custom_unordered_keys() {
    let comparator = Comparator::new(["privileges", "member_roles"]);
    let a = r#"{"privileges": ["SELECT", "INSERT"], "member_roles": []}"#;
    let b = r#"{"privileges": ["INSERT", "SELECT"]}"#;
    assert!(comparator.equivalent(a, b).unwrap());

    // "environment" is not designated here, so order matters.
    let a = r#"{"environment": ["x", "y"]}"#;
    let b = r#"{"environment": ["y", "x"]}"#;
    assert!(!comparator.equivalent(a, b).unwrap());
}

#[test]
fn test_canonical_ignores_key_order() {
    let a: Value = serde_json::from_str(r#"{"b": 1, "a": [true, null]}"#).unwrap();
    let b: Value = serde_json::from_str(r#"{"a": [true, null], "b": 1}"#).unwrap();
    assert_eq!(canonical(&a), canonical(&b));
}

#[test]
fn test_parse_document_blank_is_empty_object() {
    assert_eq!(parse_document(" \n\t", Side::Desired).unwrap(), serde_json::json!({}));

    let err = parse_document("[1,", Side::Remote).unwrap_err();
    assert!(matches!(err, Error::Malformed { side: Side::Remote, .. }));
}
